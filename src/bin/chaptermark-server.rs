use std::{
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{SystemTime, UNIX_EPOCH},
};

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Path as AxumPath, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chaptermark::{
    CancellationToken, ChaptermarkError, DirectorySink, ExtractionConfig, FfmpegLogLevel,
    KeyframeRecord, KeyframeSink,
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_stream::StreamExt;
use tracing_subscriber::EnvFilter;

/// Upload extensions accepted by `POST /extract`.
const SUPPORTED_EXTENSIONS: [&str; 3] = ["mp4", "avi", "mov"];

#[derive(Debug, Parser)]
#[command(
    name = "chaptermark-server",
    version,
    about = "HTTP front end: upload a video, get its keyframes back"
)]
struct ServerOptions {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:8080")]
    bind: String,

    /// Directory that keeps one subdirectory of JPEGs per extraction run.
    #[arg(long, default_value = "keyframes")]
    output_root: PathBuf,

    /// Largest accepted upload, in megabytes.
    #[arg(long, default_value_t = 512)]
    max_upload_mb: usize,

    /// Show debug logging output.
    #[arg(long)]
    verbose: bool,

    /// FFmpeg log level (quiet, fatal, error, warning, info, debug).
    #[arg(long)]
    log_level: Option<String>,
}

// ---------------------------------------------------------------------------
// App state
// ---------------------------------------------------------------------------

struct AppState {
    output_root: PathBuf,
    runs: AtomicU64,
}

impl AppState {
    fn next_run_id(&self) -> String {
        let seconds = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or_default();
        let sequence = self.runs.fetch_add(1, Ordering::Relaxed);
        format!("{seconds:x}-{sequence}")
    }
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ExtractQuery {
    /// Original name of the uploaded file; only its extension is used.
    filename: String,
    threshold: Option<f64>,
    max_keyframes: Option<usize>,
}

#[derive(Debug, Serialize)]
struct KeyframeEntry {
    timestamp: String,
    timestamp_ms: f64,
    frame_index: u64,
    score: f64,
    filename: String,
    url: String,
}

#[derive(Debug, Serialize)]
struct ExtractResponse {
    run_id: String,
    keyframes: Vec<KeyframeEntry>,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<ChaptermarkError> for ApiError {
    fn from(error: ChaptermarkError) -> Self {
        let status = match &error {
            ChaptermarkError::SourceUnavailable { .. }
            | ChaptermarkError::InvalidConfiguration(_) => StatusCode::BAD_REQUEST,
            ChaptermarkError::DecodeTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, error.to_string())
    }
}

impl From<std::io::Error> for ApiError {
    fn from(error: std::io::Error) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            log::error!("{}", self.message);
        }
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Lower-cased extension of `filename` if it is an accepted video type.
fn supported_extension(filename: &str) -> Option<String> {
    let (_, extension) = filename.rsplit_once('.')?;
    let extension = extension.to_ascii_lowercase();
    SUPPORTED_EXTENSIONS
        .contains(&extension.as_str())
        .then_some(extension)
}

/// `true` for a single plain path component (no separators, no leading dot).
fn is_safe_component(value: &str) -> bool {
    !value.is_empty()
        && !value.starts_with('.')
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Cancels its token when dropped. Axum drops the handler future when the
/// client disconnects, which stops that request's extraction at the next
/// frame instead of the next keyframe.
struct CancelOnDrop(CancellationToken);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

fn entry_for(run_id: &str, record: &KeyframeRecord) -> KeyframeEntry {
    let filename = record.filename();
    KeyframeEntry {
        timestamp: record.timestamp_label.clone(),
        timestamp_ms: record.timestamp_ms,
        frame_index: record.frame_index,
        score: record.score,
        url: format!("/runs/{run_id}/{filename}"),
        filename,
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn health() -> &'static str {
    "ok"
}

async fn extract(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ExtractQuery>,
    body: Bytes,
) -> Result<Json<ExtractResponse>, ApiError> {
    let extension = supported_extension(&query.filename).ok_or_else(|| {
        ApiError::new(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            format!(
                "unsupported video file {:?}; expected one of {}",
                query.filename,
                SUPPORTED_EXTENSIONS.join(", ")
            ),
        )
    })?;
    if body.is_empty() {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "empty upload"));
    }

    let mut config = ExtractionConfig::new();
    if let Some(threshold) = query.threshold {
        config = config.with_threshold(threshold);
    }
    if let Some(max) = query.max_keyframes {
        config = config.with_max_keyframes(max);
    }
    config.validate()?;

    let cancellation = CancellationToken::new();
    config = config.with_cancellation(cancellation.clone());
    let _cancel_on_drop = CancelOnDrop(cancellation);

    // Kept alive until the stream below has finished reading it.
    let upload = tempfile::Builder::new()
        .prefix("chaptermark-upload-")
        .suffix(&format!(".{extension}"))
        .tempfile()?;
    tokio::fs::write(upload.path(), &body).await?;

    let run_id = state.next_run_id();
    let run_directory = state.output_root.join(&run_id);
    log::info!(
        "Run {run_id}: {} ({} bytes, threshold={}, max_keyframes={:?})",
        query.filename,
        body.len(),
        config.threshold(),
        config.max_keyframes(),
    );

    let mut sink = DirectorySink::create(&run_directory)?;
    let mut keyframes = Vec::new();
    let mut stream = chaptermark::keyframe_stream(upload.path(), config);

    while let Some(record) = stream.next().await {
        let record = record?;
        keyframes.push(entry_for(&run_id, &record));
        sink = tokio::task::spawn_blocking(move || sink.write(&record).map(|()| sink))
            .await
            .map_err(|error| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, error.to_string()))??;
    }

    log::info!("Run {run_id}: {} keyframes", keyframes.len());
    Ok(Json(ExtractResponse { run_id, keyframes }))
}

async fn keyframe_image(
    State(state): State<Arc<AppState>>,
    AxumPath((run_id, filename)): AxumPath<(String, String)>,
) -> Result<Response, ApiError> {
    let not_found = || ApiError::new(StatusCode::NOT_FOUND, "no such keyframe");

    if !is_safe_component(&run_id) || !is_safe_component(&filename) || !filename.ends_with(".jpg") {
        return Err(not_found());
    }

    let path = state.output_root.join(&run_id).join(&filename);
    let bytes = tokio::fs::read(&path).await.map_err(|_| not_found())?;
    Ok(([(header::CONTENT_TYPE, "image/jpeg")], bytes).into_response())
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn router(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/extract", post(extract))
        .route("/runs/:run_id/:filename", get(keyframe_image))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let options = ServerOptions::parse();

    let filter = if options.verbose {
        EnvFilter::new("chaptermark=debug,chaptermark_server=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Some(level) = &options.log_level {
        let parsed =
            FfmpegLogLevel::parse(level).ok_or(format!("unsupported --log-level: {level}"))?;
        chaptermark::set_ffmpeg_log_level(parsed);
    }
    chaptermark::ffmpeg::initialize()?;

    tokio::fs::create_dir_all(&options.output_root).await?;
    let state = Arc::new(AppState {
        output_root: options.output_root.clone(),
        runs: AtomicU64::new(0),
    });

    let app = router(state, options.max_upload_mb.saturating_mul(1024 * 1024));
    let listener = tokio::net::TcpListener::bind(&options.bind).await?;
    log::info!(
        "Listening on {} (output root {})",
        options.bind,
        options.output_root.display()
    );
    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use axum::{http::StatusCode, response::IntoResponse};
    use chaptermark::{CancellationToken, ChaptermarkError};

    use super::{ApiError, CancelOnDrop, is_safe_component, supported_extension};

    #[test]
    fn abandoned_request_cancels_its_extraction() {
        let token = CancellationToken::new();
        let guard = CancelOnDrop(token.clone());
        assert!(!token.is_cancelled());
        drop(guard);
        assert!(token.is_cancelled());
    }

    #[test]
    fn accepts_known_video_extensions() {
        assert_eq!(supported_extension("talk.mp4").as_deref(), Some("mp4"));
        assert_eq!(supported_extension("TALK.MOV").as_deref(), Some("mov"));
        assert_eq!(supported_extension("a.b.avi").as_deref(), Some("avi"));
        assert_eq!(supported_extension("talk.mkv"), None);
        assert_eq!(supported_extension("mp4"), None);
    }

    #[test]
    fn rejects_path_traversal() {
        assert!(is_safe_component("00-01-02.jpg"));
        assert!(is_safe_component("65f0a1b2-3"));
        assert!(!is_safe_component(".."));
        assert!(!is_safe_component("../secret.jpg"));
        assert!(!is_safe_component("a/b.jpg"));
        assert!(!is_safe_component(""));
    }

    #[test]
    fn maps_errors_to_status_codes() {
        let unavailable = ApiError::from(ChaptermarkError::SourceUnavailable {
            path: PathBuf::from("upload.mp4"),
            reason: "Invalid data found when processing input".to_string(),
        });
        assert_eq!(unavailable.status, StatusCode::BAD_REQUEST);

        let timeout = ApiError::from(ChaptermarkError::DecodeTimeout {
            frame_index: 3,
            timeout: std::time::Duration::from_secs(1),
        });
        assert_eq!(timeout.status, StatusCode::GATEWAY_TIMEOUT);

        let decode = ApiError::from(ChaptermarkError::VideoDecodeError("bad".to_string()));
        assert_eq!(decode.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            decode.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
