//! Extraction configuration.
//!
//! [`ExtractionConfig`] carries the detection parameters (threshold and
//! keyframe cap) together with the operational settings that thread through
//! a run: the per-frame decode timeout, progress callback and cancellation
//! token. A config is supplied once per run and never changes during it.
//!
//! # Example
//!
//! ```no_run
//! use std::{sync::Arc, time::Duration};
//!
//! use chaptermark::{CancellationToken, ExtractionConfig, ProgressCallback, ProgressInfo};
//!
//! struct LogProgress;
//! impl ProgressCallback for LogProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         println!("{} frames scanned", info.frames_scanned);
//!     }
//! }
//!
//! let token = CancellationToken::new();
//! let config = ExtractionConfig::new()
//!     .with_threshold(12.5)
//!     .with_max_keyframes(40)
//!     .with_decode_timeout(Some(Duration::from_secs(5)))
//!     .with_progress(Arc::new(LogProgress))
//!     .with_cancellation(token.clone())
//!     .with_batch_size(100);
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;
use std::time::Duration;

use crate::error::ChaptermarkError;
use crate::progress::{CancellationToken, NoProgress, ProgressCallback};

/// Default change-score threshold.
pub const DEFAULT_THRESHOLD: f64 = 20.0;

/// Default cap on emitted keyframes per run.
pub const DEFAULT_MAX_KEYFRAMES: usize = 100;

/// Default bound on the time spent producing a single frame.
pub const DEFAULT_DECODE_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for one keyframe extraction run.
///
/// All fields have defaults: threshold 20, at most 100 keyframes, a 30 second
/// per-frame decode timeout, no progress callback and no cancellation.
#[derive(Clone)]
pub struct ExtractionConfig {
    pub(crate) threshold: f64,
    /// `None` means unbounded.
    pub(crate) max_keyframes: Option<usize>,
    /// `None` disables the per-frame bound.
    pub(crate) decode_timeout: Option<Duration>,
    pub(crate) progress: Arc<dyn ProgressCallback>,
    pub(crate) cancellation: Option<CancellationToken>,
    /// How often to fire the progress callback (every N decoded frames).
    pub(crate) batch_size: u64,
}

impl Debug for ExtractionConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ExtractionConfig")
            .field("threshold", &self.threshold)
            .field("max_keyframes", &self.max_keyframes)
            .field("decode_timeout", &self.decode_timeout)
            .field("has_cancellation", &self.cancellation.is_some())
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractionConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            max_keyframes: Some(DEFAULT_MAX_KEYFRAMES),
            decode_timeout: Some(DEFAULT_DECODE_TIMEOUT),
            progress: Arc::new(NoProgress),
            cancellation: None,
            batch_size: 1,
        }
    }

    /// Set the change-score threshold.
    ///
    /// A frame becomes a keyframe when its score against the previous frame
    /// is strictly greater than this value. Must be positive and finite;
    /// checked by [`validate`](ExtractionConfig::validate).
    #[must_use]
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Stop after `max` keyframes have been emitted. Must be at least 1.
    #[must_use]
    pub fn with_max_keyframes(mut self, max: usize) -> Self {
        self.max_keyframes = Some(max);
        self
    }

    /// Emit every keyframe in the video.
    #[must_use]
    pub fn with_unbounded_keyframes(mut self) -> Self {
        self.max_keyframes = None;
        self
    }

    /// Bound the time spent decoding one frame. `None` disables the bound.
    #[must_use]
    pub fn with_decode_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.decode_timeout = timeout;
        self
    }

    /// Attach a progress callback.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Attach a cancellation token.
    ///
    /// When the token is cancelled the extractor yields
    /// [`ChaptermarkError::Cancelled`] before pulling its next frame.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Set how often the progress callback fires, in decoded frames.
    /// Clamped to a minimum of 1.
    #[must_use]
    pub fn with_batch_size(mut self, size: u64) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// The change-score threshold.
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// The keyframe cap, or `None` when unbounded.
    pub fn max_keyframes(&self) -> Option<usize> {
        self.max_keyframes
    }

    /// The per-frame decode bound, or `None` when disabled.
    pub fn decode_timeout(&self) -> Option<Duration> {
        self.decode_timeout
    }

    /// Check that every value is in range.
    ///
    /// # Errors
    ///
    /// Returns [`ChaptermarkError::InvalidConfiguration`] for a non-positive
    /// or non-finite threshold, a keyframe cap of zero, or a zero decode
    /// timeout.
    pub fn validate(&self) -> Result<(), ChaptermarkError> {
        if !self.threshold.is_finite() || self.threshold <= 0.0 {
            return Err(ChaptermarkError::InvalidConfiguration(format!(
                "threshold must be a positive number, got {}",
                self.threshold
            )));
        }
        if self.max_keyframes == Some(0) {
            return Err(ChaptermarkError::InvalidConfiguration(
                "max_keyframes must be at least 1".to_string(),
            ));
        }
        if self.decode_timeout == Some(Duration::ZERO) {
            return Err(ChaptermarkError::InvalidConfiguration(
                "decode timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(|token| token.is_cancelled())
    }
}
