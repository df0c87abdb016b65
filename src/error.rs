//! Error types for the `chaptermark` crate.
//!
//! This module defines [`ChaptermarkError`], the unified error type returned
//! by every fallible operation in the crate. All variants are fatal for the
//! extraction that produced them: nothing is retried, and records emitted
//! before the error stay valid.

use std::{io::Error as IoError, path::PathBuf, time::Duration};

use ffmpeg_next::Error as FfmpegError;
use image::ImageError;
use thiserror::Error;

/// The unified error type for all `chaptermark` operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ChaptermarkError {
    /// The video could not be opened or has nothing decodable in it.
    ///
    /// Covers missing files, containers without a video stream, unsupported
    /// codecs and corrupt headers.
    #[error("Video source unavailable at {path}: {reason}")]
    SourceUnavailable {
        /// Path that was passed to [`VideoSource::open`](crate::VideoSource::open).
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// A frame could not be read or decoded from an already-open source.
    #[error("Failed to decode video frame: {0}")]
    VideoDecodeError(String),

    /// Decoding a single frame took longer than the configured bound.
    #[error("Decoding frame {frame_index} exceeded the {timeout:?} decode timeout")]
    DecodeTimeout {
        /// Decode index of the frame that was being produced.
        frame_index: u64,
        /// The configured per-frame bound.
        timeout: Duration,
    },

    /// A frame has unusable geometry (zero-sized, or a buffer that does not
    /// match its declared dimensions).
    #[error("Invalid frame ({width}x{height}): {reason}")]
    InvalidFrame {
        /// Declared frame width.
        width: u32,
        /// Declared frame height.
        height: u32,
        /// What was wrong with it.
        reason: String,
    },

    /// Two grayscale buffers of different sizes were compared.
    #[error("Cannot compare frames of different size: {expected:?} vs {actual:?}")]
    DimensionMismatch {
        /// `(width, height)` of the previous frame.
        expected: (u32, u32),
        /// `(width, height)` of the current frame.
        actual: (u32, u32),
    },

    /// A timestamp was negative or not a finite number.
    #[error("Invalid timestamp: {0} ms")]
    InvalidTimestamp(f64),

    /// An [`ExtractionConfig`](crate::ExtractionConfig) value is out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The operation was cancelled via a [`CancellationToken`](crate::CancellationToken).
    #[error("Operation cancelled")]
    Cancelled,

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// An I/O error occurred while writing keyframe images.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// An error from the `image` crate while encoding a keyframe.
    #[error("Image processing error: {0}")]
    ImageError(#[from] ImageError),
}

impl From<FfmpegError> for ChaptermarkError {
    fn from(error: FfmpegError) -> Self {
        ChaptermarkError::FfmpegError(error.to_string())
    }
}
