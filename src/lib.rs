//! # chaptermark
//!
//! Find chapter boundaries in recorded videos.
//!
//! `chaptermark` decodes a video with FFmpeg (via the
//! [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next) crate), compares
//! every frame with the one before it, and reports the frames where the
//! picture changed significantly, each tagged with an `HH-MM-SS` timestamp.
//! On a slide-based screencast those frames are the slide changes, which makes
//! them a good first draft of a chapter list.
//!
//! ## Quick Start
//!
//! ```no_run
//! use chaptermark::{ChaptermarkError, DirectorySink, ExtractionConfig};
//!
//! let config = ExtractionConfig::new()
//!     .with_threshold(20.0)
//!     .with_max_keyframes(100);
//!
//! let records = chaptermark::extract_keyframes("screencast.mp4", &config)?;
//! let mut sink = DirectorySink::create("chapters")?;
//! chaptermark::drain_into(records, &mut sink)?;
//! # Ok::<(), ChaptermarkError>(())
//! ```
//!
//! ## How frames are compared
//!
//! Each frame is reduced to 8-bit luma ([`grayscale::reduce`]) and scored
//! against its predecessor as the mean absolute per-pixel difference
//! ([`score::change_score`]). A frame whose score is strictly greater than the
//! threshold becomes a [`KeyframeRecord`]. The first frame of a video is
//! never a keyframe.
//!
//! The extractor ([`KeyframeExtractor`]) is generic over any iterator of
//! decoded [`Frame`]s, so the detection logic runs the same on
//! [`VideoSource`] and on in-memory frame sequences.
//!
//! ### Optional Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `async` | [`KeyframeStream`] runs extraction on a blocking Tokio thread |
//! | `rayon` | `extract_keyframes_parallel()` processes several videos at once |
//! | `server` | the `chaptermark-server` HTTP front end (implies `async`) |
//! | `full` | Enables all of the above |
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed on your system.

pub mod configuration;
pub mod error;
pub mod extractor;
pub mod ffmpeg;
pub mod frame;
pub mod grayscale;
pub mod metadata;
#[cfg(feature = "rayon")]
pub mod parallel;
pub mod progress;
pub mod score;
pub mod sink;
pub mod source;
#[cfg(feature = "async")]
pub mod stream;
pub mod timestamp;
mod utilities;

pub use configuration::{
    DEFAULT_DECODE_TIMEOUT, DEFAULT_MAX_KEYFRAMES, DEFAULT_THRESHOLD, ExtractionConfig,
};
pub use error::ChaptermarkError;
pub use extractor::{ExtractionOutcome, KeyframeExtractor, KeyframeRecord, extract_keyframes};
pub use ffmpeg::{FfmpegLogLevel, set_ffmpeg_log_level};
pub use frame::Frame;
pub use grayscale::{GrayscaleBuffer, reduce};
pub use metadata::VideoMetadata;
#[cfg(feature = "rayon")]
pub use parallel::extract_keyframes_parallel;
pub use progress::{CancellationToken, OperationType, ProgressCallback, ProgressInfo};
pub use score::change_score;
pub use sink::{DEFAULT_JPEG_QUALITY, DirectorySink, KeyframeSink, drain_into};
pub use source::VideoSource;
#[cfg(feature = "async")]
pub use stream::{KeyframeStream, keyframe_stream};
pub use timestamp::format_timestamp;
