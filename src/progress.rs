//! Progress reporting and cooperative cancellation.
//!
//! A long screencast takes a while to scan. Attach a [`ProgressCallback`] to
//! the [`ExtractionConfig`](crate::ExtractionConfig) to watch the scan, and a
//! [`CancellationToken`] to stop it from another thread.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use chaptermark::{ChaptermarkError, ExtractionConfig, ProgressCallback, ProgressInfo};
//!
//! struct ScanReport;
//!
//! impl ProgressCallback for ScanReport {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         match info.percentage {
//!             Some(done) => eprintln!("{done:5.1}%  {} keyframes", info.keyframes),
//!             None => eprintln!("{} frames  {} keyframes", info.frames_scanned, info.keyframes),
//!         }
//!     }
//! }
//!
//! let config = ExtractionConfig::new()
//!     .with_progress(Arc::new(ScanReport))
//!     .with_batch_size(25);
//! let keyframes = chaptermark::extract_keyframes("talk.mp4", &config)?.count();
//! # Ok::<(), ChaptermarkError>(())
//! ```

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

/// What a progress report is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum OperationType {
    /// Scanning a video for keyframes.
    KeyframeExtraction,
}

/// Progress of one extraction at a point in time.
///
/// Sent every [`batch_size`](crate::ExtractionConfig::with_batch_size)
/// scanned frames, plus one closing report when the extraction stops for
/// any reason. The closing report has no `frame_index` or `position`.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    pub operation: OperationType,
    /// Frames pulled from the source so far.
    pub frames_scanned: u64,
    /// Frame count estimated from the container, when it has one.
    pub frames_expected: Option<u64>,
    /// `frames_scanned / frames_expected` as a percentage. Can exceed 100,
    /// since the expected count is only an estimate.
    pub percentage: Option<f32>,
    /// Keyframes emitted so far.
    pub keyframes: u64,
    pub elapsed: Duration,
    /// Remaining time at the current scan rate.
    pub estimated_remaining: Option<Duration>,
    /// Decode index of the frame that triggered this report.
    pub frame_index: Option<u64>,
    /// Stream position of that frame.
    pub position: Option<Duration>,
}

/// Receives [`ProgressInfo`] reports during an extraction.
///
/// Extractions can run on rayon workers or Tokio's blocking pool, hence the
/// `Send + Sync` bound. A callback only observes; to stop a run, cancel its
/// [`CancellationToken`].
pub trait ProgressCallback: Send + Sync {
    fn on_progress(&self, info: &ProgressInfo);
}

/// Callback used when none is configured.
pub(crate) struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

/// A shared flag that asks running extractions to stop.
///
/// Clones share one flag. The extractor checks it before pulling each frame
/// and, once set, yields [`ChaptermarkError::Cancelled`](crate::ChaptermarkError::Cancelled)
/// and ends.
///
/// ```
/// use chaptermark::CancellationToken;
///
/// let token = CancellationToken::new();
/// let handle = token.clone();
/// handle.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag. Cannot be undone.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Counts scanned frames and emitted keyframes for one extraction and feeds
/// snapshots to its callback.
pub(crate) struct ProgressReporter {
    callback: Arc<dyn ProgressCallback>,
    operation: OperationType,
    expected: Option<u64>,
    scanned: u64,
    keyframes: u64,
    every: u64,
    pending: u64,
    started: Instant,
    closed: bool,
}

impl ProgressReporter {
    pub(crate) fn new(
        callback: Arc<dyn ProgressCallback>,
        operation: OperationType,
        every: u64,
    ) -> Self {
        Self {
            callback,
            operation,
            expected: None,
            scanned: 0,
            keyframes: 0,
            every: every.max(1),
            pending: 0,
            started: Instant::now(),
            closed: false,
        }
    }

    pub(crate) fn expect_frames(&mut self, expected: Option<u64>) {
        self.expected = expected;
    }

    pub(crate) fn frame_scanned(&mut self, frame_index: u64, position: Duration) {
        self.scanned += 1;
        self.pending += 1;
        if self.pending == self.every {
            self.pending = 0;
            self.callback
                .on_progress(&self.snapshot(Some((frame_index, position))));
        }
    }

    pub(crate) fn keyframe_emitted(&mut self) {
        self.keyframes += 1;
    }

    /// Send the closing report. Only the first call does anything.
    pub(crate) fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.callback.on_progress(&self.snapshot(None));
        }
    }

    fn snapshot(&self, frame: Option<(u64, Duration)>) -> ProgressInfo {
        let elapsed = self.started.elapsed();
        let expected = self.expected.filter(|&count| count > 0);

        let percentage = expected.map(|count| self.scanned as f32 * 100.0 / count as f32);
        let estimated_remaining = expected.filter(|_| self.scanned > 0).map(|count| {
            let left = count.saturating_sub(self.scanned) as f64;
            elapsed.mul_f64(left / self.scanned as f64)
        });

        ProgressInfo {
            operation: self.operation,
            frames_scanned: self.scanned,
            frames_expected: self.expected,
            percentage,
            keyframes: self.keyframes,
            elapsed,
            estimated_remaining,
            frame_index: frame.map(|(index, _)| index),
            position: frame.map(|(_, position)| position),
        }
    }
}
