use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use chaptermark::{
    ChaptermarkError, DirectorySink, ExtractionConfig, FfmpegLogLevel, KeyframeRecord,
    KeyframeSink, ProgressCallback, ProgressInfo, VideoSource,
};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
#[cfg(feature = "rayon")]
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

const CLI_AFTER_HELP: &str = "Examples:\n  chaptermark extract talk.mp4 --out chapters\n  chaptermark extract talk.mp4 --out chapters --threshold 12 --unbounded --progress\n  chaptermark extract day1.mp4 day2.mp4 --out chapters --json\n  chaptermark probe talk.mp4 --json\n  chaptermark completions zsh > _chaptermark";

#[derive(Debug, Parser)]
#[command(
    name = "chaptermark",
    version,
    about = "Extract the frames where a video's picture changes, named by timestamp",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Show debug logging output.
    #[arg(long, global = true)]
    verbose: bool,

    /// Show a progress bar while scanning.
    #[arg(long, global = true)]
    progress: bool,

    /// Allow replacing image files that already exist in the output directory.
    #[arg(long, global = true)]
    overwrite: bool,

    /// FFmpeg log level (quiet, fatal, error, warning, info, debug).
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Extract keyframes as JPEG files named HH-MM-SS.jpg.
    #[command(
        about = "Extract keyframes",
        after_help = "Examples:\n  chaptermark extract talk.mp4 --out chapters\n  chaptermark extract talk.mp4 --out chapters --threshold 8 --max-keyframes 20"
    )]
    Extract {
        /// Input video paths. With several inputs, each gets its own
        /// subdirectory named after the file.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Output directory (created if missing).
        #[arg(long)]
        out: PathBuf,
        /// Mean pixel difference a frame must exceed to count as a keyframe.
        #[arg(long, default_value_t = chaptermark::DEFAULT_THRESHOLD)]
        threshold: f64,
        /// Stop after this many keyframes per video.
        #[arg(long, conflicts_with = "unbounded")]
        max_keyframes: Option<usize>,
        /// Extract every keyframe in the video.
        #[arg(long)]
        unbounded: bool,
        /// JPEG quality (1-100).
        #[arg(long, default_value_t = chaptermark::DEFAULT_JPEG_QUALITY)]
        quality: u8,
        /// Per-frame decode timeout in seconds; 0 disables it.
        #[arg(long, default_value_t = 30.0)]
        decode_timeout: f64,
        /// Print the extracted keyframes as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print stream information for a video.
    #[command(about = "Print video metadata", visible_alias = "info")]
    Probe {
        /// Input video path.
        input: PathBuf,
        /// Output metadata as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    #[command(about = "Generate shell completions")]
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("chaptermark=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn parse_decode_timeout(seconds: f64) -> Result<Option<Duration>, Box<dyn std::error::Error>> {
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(format!("invalid --decode-timeout: {seconds}").into());
    }
    if seconds == 0.0 {
        Ok(None)
    } else {
        Ok(Some(Duration::from_secs_f64(seconds)))
    }
}

/// Where the keyframes of `input` go. A lone input writes straight into
/// `out`; several inputs each get `out/<file stem>`.
fn output_directory(out: &Path, input: &Path, multiple_inputs: bool) -> PathBuf {
    if !multiple_inputs {
        return out.to_path_buf();
    }
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "video".to_string());
    out.join(stem)
}

fn apply_global_options(global: &GlobalOptions) -> Result<(), Box<dyn std::error::Error>> {
    init_logging(global.verbose);

    if let Some(level) = &global.log_level {
        let parsed =
            FfmpegLogLevel::parse(level).ok_or(format!("unsupported --log-level: {level}"))?;
        chaptermark::set_ffmpeg_log_level(parsed);
    }

    Ok(())
}

/// Mirrors extraction progress onto an indicatif bar.
struct TerminalProgress {
    bar: ProgressBar,
}

impl TerminalProgress {
    fn new(bars: &MultiProgress, label: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let bar = bars.add(ProgressBar::new(0));
        let style = ProgressStyle::with_template(
            "{spinner:.green} {prefix} {bar:40.cyan/blue} {pos}/{len} frames {msg}",
        )?;
        bar.set_style(style.progress_chars("##-"));
        bar.set_prefix(label.to_string());
        Ok(Self { bar })
    }
}

impl ProgressCallback for TerminalProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        if let Some(expected) = info.frames_expected {
            self.bar.set_length(expected.max(info.frames_scanned));
        }
        self.bar.set_position(info.frames_scanned);
        self.bar.set_message(format!("{} keyframes", info.keyframes));
    }
}

fn record_json(record: &KeyframeRecord, directory: &Path) -> Value {
    json!({
        "timestamp": record.timestamp_label,
        "timestamp_ms": record.timestamp_ms,
        "frame_index": record.frame_index,
        "score": record.score,
        "file": directory.join(record.filename()).display().to_string(),
    })
}

/// Write every record into `sink`, listing each written image in
/// `written`. Images written before an error stay on disk and in the list.
fn write_records(
    records: impl IntoIterator<Item = Result<KeyframeRecord, ChaptermarkError>>,
    sink: &mut DirectorySink,
    verbose: bool,
    written: &mut Vec<Value>,
) -> Result<(), ChaptermarkError> {
    for record in records {
        let record = record?;
        sink.write(&record)?;
        if verbose {
            eprintln!(
                "keyframe {} (frame {}, score {:.2}) -> {}",
                record.timestamp_label,
                record.frame_index,
                record.score,
                sink.directory().join(record.filename()).display()
            );
        }
        written.push(record_json(&record, sink.directory()));
    }
    sink.finish()
}

fn open_sink(
    directory: &Path,
    quality: u8,
    overwrite: bool,
) -> Result<DirectorySink, ChaptermarkError> {
    Ok(DirectorySink::create(directory)?
        .with_quality(quality)
        .overwrite_existing(overwrite))
}

fn file_label(input: &Path) -> String {
    input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Settings shared by every input of one `extract` command.
struct ExtractJob<'a> {
    out: &'a Path,
    config: &'a ExtractionConfig,
    quality: u8,
    overwrite: bool,
    verbose: bool,
    multiple_inputs: bool,
    progress: Option<MultiProgress>,
}

/// What happened to one input.
struct InputOutcome {
    input: PathBuf,
    directory: PathBuf,
    /// Every image written, including those written before a failure.
    keyframes: Vec<Value>,
    error: Option<String>,
}

impl ExtractJob<'_> {
    /// Run every input. Each input streams its keyframes to disk as they
    /// are found; a failing input does not stop the others.
    #[cfg(feature = "rayon")]
    fn run_all(&self, inputs: &[PathBuf]) -> Vec<InputOutcome> {
        inputs.par_iter().map(|input| self.run(input)).collect()
    }

    #[cfg(not(feature = "rayon"))]
    fn run_all(&self, inputs: &[PathBuf]) -> Vec<InputOutcome> {
        inputs.iter().map(|input| self.run(input)).collect()
    }

    fn run(&self, input: &Path) -> InputOutcome {
        let directory = output_directory(self.out, input, self.multiple_inputs);
        let mut keyframes = Vec::new();
        let error = self
            .extract_into(input, &directory, &mut keyframes)
            .err()
            .map(|error| error.to_string());
        InputOutcome {
            input: input.to_path_buf(),
            directory,
            keyframes,
            error,
        }
    }

    fn extract_into(
        &self,
        input: &Path,
        directory: &Path,
        keyframes: &mut Vec<Value>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let mut config = self.config.clone();
        let progress = match &self.progress {
            Some(bars) => {
                let progress = Arc::new(TerminalProgress::new(bars, &file_label(input))?);
                config = config.with_progress(progress.clone());
                Some(progress)
            }
            None => None,
        };

        let result = chaptermark::extract_keyframes(input, &config).and_then(|extractor| {
            let mut sink = open_sink(directory, self.quality, self.overwrite)?;
            write_records(extractor, &mut sink, self.verbose, keyframes)
        });

        if let Some(progress) = progress {
            progress
                .bar
                .finish_with_message(if result.is_ok() { "done" } else { "failed" });
        }
        result.map_err(Into::into)
    }
}

impl InputOutcome {
    fn to_json(&self) -> Value {
        json!({
            "input": self.input.display().to_string(),
            "directory": self.directory.display().to_string(),
            "keyframes": self.keyframes,
            "error": self.error,
        })
    }

    fn print(&self) {
        let Some(error) = &self.error else {
            println!(
                "{} {}",
                "success:".green().bold(),
                format!(
                    "Extracted {} keyframe(s) from {} to {}",
                    self.keyframes.len(),
                    self.input.display(),
                    self.directory.display()
                )
                .green()
            );
            return;
        };

        eprintln!("{} {}: {error}", "error:".red().bold(), self.input.display());
        if !self.keyframes.is_empty() {
            eprintln!(
                "{} {} keyframe(s) from {} were written to {} before the failure",
                "warning:".yellow().bold(),
                self.keyframes.len(),
                self.input.display(),
                self.directory.display()
            );
        }
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    apply_global_options(&cli.global)?;

    match cli.command {
        Commands::Extract {
            inputs,
            out,
            threshold,
            max_keyframes,
            unbounded,
            quality,
            decode_timeout,
            json,
        } => {
            let mut config = ExtractionConfig::new()
                .with_threshold(threshold)
                .with_decode_timeout(parse_decode_timeout(decode_timeout)?);
            config = match (unbounded, max_keyframes) {
                (true, _) => config.with_unbounded_keyframes(),
                (false, Some(max)) => config.with_max_keyframes(max),
                (false, None) => config,
            };
            config.validate()?;

            let job = ExtractJob {
                out: &out,
                config: &config,
                quality,
                overwrite: cli.global.overwrite,
                verbose: cli.global.verbose,
                multiple_inputs: inputs.len() > 1,
                progress: cli.global.progress.then(MultiProgress::new),
            };
            let outcomes = job.run_all(&inputs);

            if json {
                let summaries: Vec<Value> = outcomes.iter().map(InputOutcome::to_json).collect();
                println!("{}", serde_json::to_string_pretty(&summaries)?);
            } else {
                outcomes.iter().for_each(InputOutcome::print);
            }

            let failed = outcomes.iter().filter(|outcome| outcome.error.is_some()).count();
            if failed > 0 {
                return Err(format!("{failed} of {} input(s) failed", outcomes.len()).into());
            }
        }
        Commands::Probe { input, json } => {
            let source = VideoSource::open(&input)?;
            let metadata = source.metadata();
            if json {
                let payload = json!({
                    "format": metadata.format,
                    "codec": metadata.codec,
                    "width": metadata.width,
                    "height": metadata.height,
                    "frames_per_second": metadata.frames_per_second,
                    "frame_count": metadata.frame_count,
                    "duration_seconds": metadata.duration.as_secs_f64(),
                    "stream_index": metadata.stream_index,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("{}", input.display().to_string().bold());
                println!("  Format:   {}", metadata.format);
                println!("  Codec:    {}", metadata.codec);
                println!("  Size:     {}x{}", metadata.width, metadata.height);
                println!("  Rate:     {:.3} fps", metadata.frames_per_second);
                println!("  Frames:   ~{}", metadata.frame_count);
                println!(
                    "  Duration: {:.3}s ({})",
                    metadata.duration.as_secs_f64(),
                    chaptermark::format_timestamp(metadata.duration.as_secs_f64() * 1_000.0)?
                );
            }
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "chaptermark", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("{} {error}", "error:".red().bold());
        std::process::exit(1);
    }
}
