//! FFmpeg initialisation and console verbosity.
//!
//! FFmpeg prints its own warnings to stderr, separately from the Rust
//! [`log`](https://crates.io/crates/log) records this crate emits. A corrupt
//! frame in a long screencast can produce pages of decoder chatter, so the
//! binaries expose the level as `--log-level`.
//!
//! # Example
//!
//! ```no_run
//! use chaptermark::FfmpegLogLevel;
//!
//! chaptermark::set_ffmpeg_log_level(FfmpegLogLevel::Error);
//! ```

use ffmpeg_next::util::log::Level;

use crate::error::ChaptermarkError;

/// FFmpeg console verbosity, from silent to most verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FfmpegLogLevel {
    /// Print nothing.
    Quiet,
    /// Unrecoverable errors only.
    Fatal,
    /// Recoverable errors.
    Error,
    /// Warnings (FFmpeg's default).
    Warning,
    /// Informational messages.
    Info,
    /// Debugging output.
    Debug,
}

impl FfmpegLogLevel {
    /// Parse a level name as accepted on the command line.
    ///
    /// Matching is case-insensitive; `warn` is accepted for `warning`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "quiet" => Some(FfmpegLogLevel::Quiet),
            "fatal" => Some(FfmpegLogLevel::Fatal),
            "error" => Some(FfmpegLogLevel::Error),
            "warning" | "warn" => Some(FfmpegLogLevel::Warning),
            "info" => Some(FfmpegLogLevel::Info),
            "debug" => Some(FfmpegLogLevel::Debug),
            _ => None,
        }
    }

    fn to_ffmpeg_level(self) -> Level {
        match self {
            FfmpegLogLevel::Quiet => Level::Quiet,
            FfmpegLogLevel::Fatal => Level::Fatal,
            FfmpegLogLevel::Error => Level::Error,
            FfmpegLogLevel::Warning => Level::Warning,
            FfmpegLogLevel::Info => Level::Info,
            FfmpegLogLevel::Debug => Level::Debug,
        }
    }
}

/// Set FFmpeg's console verbosity. Does not affect `log` crate output.
pub fn set_ffmpeg_log_level(level: FfmpegLogLevel) {
    ffmpeg_next::util::log::set_level(level.to_ffmpeg_level());
}

/// Initialise the FFmpeg libraries. Safe to call repeatedly.
///
/// [`VideoSource::open`](crate::VideoSource::open) calls this itself.
pub fn initialize() -> Result<(), ChaptermarkError> {
    ffmpeg_next::init().map_err(ChaptermarkError::from)
}
