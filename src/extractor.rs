//! Keyframe extraction.
//!
//! [`KeyframeExtractor`] pulls frames from a source one at a time, reduces
//! each to grayscale, scores it against the previous frame and yields a
//! [`KeyframeRecord`] whenever the score is strictly greater than the
//! configured threshold.
//!
//! The extractor is a three-state machine:
//!
//! - `AwaitingFirstFrame`: the first frame only seeds the comparison and is
//!   never emitted. An empty source goes straight to `Done`.
//! - `Comparing`: holds the previous frame's grayscale buffer. Every step
//!   replaces it with the current one, whether or not a record was emitted.
//! - `Done`: terminal. Entered when the source runs dry, when
//!   `max_keyframes` records have been emitted, or after an error. The
//!   source is dropped on entry, so an early stop releases the decoder
//!   without reading further.
//!
//! Records are yielded in decode order. Nothing is deduplicated: a signal
//! that keeps crossing the threshold yields a record each time.
//!
//! # Example
//!
//! ```no_run
//! use chaptermark::{ChaptermarkError, ExtractionConfig};
//!
//! let config = ExtractionConfig::new().with_threshold(20.0).with_max_keyframes(100);
//! for record in chaptermark::extract_keyframes("screencast.mp4", &config)? {
//!     let record = record?;
//!     record.frame.image().save(record.filename())?;
//! }
//! # Ok::<(), ChaptermarkError>(())
//! ```

use std::{mem, path::Path, time::Duration};

use crate::{
    configuration::ExtractionConfig,
    error::ChaptermarkError,
    frame::Frame,
    grayscale::{self, GrayscaleBuffer},
    progress::{OperationType, ProgressReporter},
    score, source::VideoSource, timestamp,
};

/// A frame that changed significantly from its predecessor.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyframeRecord {
    /// `HH-MM-SS` label of the frame's position.
    pub timestamp_label: String,
    /// Position of the frame in milliseconds.
    pub timestamp_ms: f64,
    /// Zero-based decode index of the frame.
    pub frame_index: u64,
    /// Change score against the previous frame.
    pub score: f64,
    /// The original colour frame.
    pub frame: Frame,
}

impl KeyframeRecord {
    /// File name for this keyframe's image: `{timestamp_label}.jpg`.
    ///
    /// Two keyframes within the same second share a name.
    pub fn filename(&self) -> String {
        format!("{}.jpg", self.timestamp_label)
    }
}

/// What one extraction produced before it stopped.
///
/// Collecting an extractor into an `ExtractionOutcome` keeps the records
/// emitted ahead of a mid-stream failure. Those records stay valid; the
/// error only says why the run ended early.
///
/// ```
/// use chaptermark::{ChaptermarkError, ExtractionConfig, ExtractionOutcome, Frame, KeyframeExtractor};
/// use image::{Rgb, RgbImage};
///
/// let frame = |ms: f64, value: u8| Ok(Frame::new(ms, RgbImage::from_pixel(2, 2, Rgb([value; 3]))));
/// let frames = vec![
///     frame(0.0, 0),
///     frame(1_000.0, 255),
///     Err(ChaptermarkError::VideoDecodeError("truncated packet".into())),
/// ];
///
/// let outcome: ExtractionOutcome =
///     KeyframeExtractor::new(frames.into_iter(), ExtractionConfig::new())?.collect();
/// assert_eq!(outcome.records.len(), 1);
/// assert!(outcome.error.is_some());
/// # Ok::<(), ChaptermarkError>(())
/// ```
#[derive(Debug, Default)]
pub struct ExtractionOutcome {
    /// Records in emission order.
    pub records: Vec<KeyframeRecord>,
    /// The error that ended the run, if it did not finish cleanly.
    pub error: Option<ChaptermarkError>,
}

impl ExtractionOutcome {
    /// An outcome for a run that failed before emitting anything.
    pub fn failed(error: ChaptermarkError) -> Self {
        Self {
            records: Vec::new(),
            error: Some(error),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }

    /// The records, or the error if there was one.
    pub fn into_result(self) -> Result<Vec<KeyframeRecord>, ChaptermarkError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.records),
        }
    }
}

impl FromIterator<Result<KeyframeRecord, ChaptermarkError>> for ExtractionOutcome {
    /// Takes records up to the first error and stops there.
    fn from_iter<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Result<KeyframeRecord, ChaptermarkError>>,
    {
        let mut outcome = Self::default();
        for item in items {
            match item {
                Ok(record) => outcome.records.push(record),
                Err(error) => {
                    outcome.error = Some(error);
                    break;
                }
            }
        }
        outcome
    }
}

enum ExtractorState {
    AwaitingFirstFrame,
    Comparing { previous: GrayscaleBuffer },
    Done,
}

enum Step {
    Emit(KeyframeRecord),
    Continue,
    Finished,
}

/// Lazy iterator of [`KeyframeRecord`]s over a frame source.
///
/// `S` is any iterator of decoded frames: a [`VideoSource`] for real files,
/// or an in-memory sequence. The extractor owns the source for the whole
/// run and is not restartable; extracting again means building a new one
/// over a freshly opened source.
pub struct KeyframeExtractor<S> {
    source: Option<S>,
    state: ExtractorState,
    config: ExtractionConfig,
    progress: ProgressReporter,
    frames_read: u64,
    emitted: usize,
}

impl<S> KeyframeExtractor<S>
where
    S: Iterator<Item = Result<Frame, ChaptermarkError>>,
{
    /// Create an extractor over `source`.
    ///
    /// # Errors
    ///
    /// Returns [`ChaptermarkError::InvalidConfiguration`] if `config` does
    /// not pass [`ExtractionConfig::validate`].
    pub fn new(source: S, config: ExtractionConfig) -> Result<Self, ChaptermarkError> {
        config.validate()?;

        let progress = ProgressReporter::new(
            config.progress.clone(),
            OperationType::KeyframeExtraction,
            config.batch_size,
        );

        Ok(Self {
            source: Some(source),
            state: ExtractorState::AwaitingFirstFrame,
            config,
            progress,
            frames_read: 0,
            emitted: 0,
        })
    }

    /// Expected frame count, used for progress percentages.
    #[must_use]
    pub fn with_total_frames(mut self, total: Option<u64>) -> Self {
        self.progress.expect_frames(total);
        self
    }

    /// Number of frames pulled from the source so far.
    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    /// Number of records yielded so far.
    pub fn keyframes_emitted(&self) -> usize {
        self.emitted
    }

    /// `true` once the extractor has reached its terminal state.
    pub fn is_done(&self) -> bool {
        matches!(self.state, ExtractorState::Done)
    }

    /// The configuration this run uses.
    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Pull the next frame, or `None` when the source is exhausted.
    fn pull(&mut self) -> Result<Option<(u64, Frame)>, ChaptermarkError> {
        if self.config.is_cancelled() {
            return Err(ChaptermarkError::Cancelled);
        }

        let Some(source) = self.source.as_mut() else {
            return Ok(None);
        };

        match source.next() {
            None => Ok(None),
            Some(frame) => {
                let frame = frame?;
                let index = self.frames_read;
                self.frames_read += 1;
                self.progress.frame_scanned(
                    index,
                    Duration::from_secs_f64(frame.timestamp_ms().max(0.0) / 1_000.0),
                );
                Ok(Some((index, frame)))
            }
        }
    }

    fn step(&mut self) -> Result<Step, ChaptermarkError> {
        match mem::replace(&mut self.state, ExtractorState::Done) {
            ExtractorState::Done => Ok(Step::Finished),
            ExtractorState::AwaitingFirstFrame => {
                let Some((_, frame)) = self.pull()? else {
                    log::debug!("Source yielded no frames");
                    self.finish();
                    return Ok(Step::Finished);
                };
                let previous = grayscale::reduce(&frame)?;
                self.state = ExtractorState::Comparing { previous };
                Ok(Step::Continue)
            }
            ExtractorState::Comparing { previous } => {
                let Some((frame_index, frame)) = self.pull()? else {
                    self.finish();
                    return Ok(Step::Finished);
                };
                let current = grayscale::reduce(&frame)?;
                let change = score::change_score(&previous, &current)?;
                self.state = ExtractorState::Comparing { previous: current };

                if change <= self.config.threshold {
                    return Ok(Step::Continue);
                }

                let record = KeyframeRecord {
                    timestamp_label: timestamp::format_timestamp(frame.timestamp_ms())?,
                    timestamp_ms: frame.timestamp_ms(),
                    frame_index,
                    score: change,
                    frame,
                };
                self.emitted += 1;
                self.progress.keyframe_emitted();

                log::debug!(
                    "Keyframe {} at {} (frame {}, score {:.2})",
                    self.emitted,
                    record.timestamp_label,
                    frame_index,
                    change,
                );

                if self
                    .config
                    .max_keyframes
                    .is_some_and(|max| self.emitted >= max)
                {
                    log::debug!("Reached {} keyframes, stopping early", self.emitted);
                    self.finish();
                }

                Ok(Step::Emit(record))
            }
        }
    }

    /// Enter `Done` and release the source.
    fn finish(&mut self) {
        self.state = ExtractorState::Done;
        if self.source.take().is_some() {
            self.progress.close();
        }
    }
}

impl<S> Iterator for KeyframeExtractor<S>
where
    S: Iterator<Item = Result<Frame, ChaptermarkError>>,
{
    type Item = Result<KeyframeRecord, ChaptermarkError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.step() {
                Ok(Step::Emit(record)) => return Some(Ok(record)),
                Ok(Step::Continue) => continue,
                Ok(Step::Finished) => return None,
                Err(error) => {
                    log::debug!("Extraction aborted after {} frames: {error}", self.frames_read);
                    self.finish();
                    return Some(Err(error));
                }
            }
        }
    }
}

/// Open `path` and return an extractor over its frames.
///
/// The source gets the config's decode timeout, and progress percentages
/// use the container's estimated frame count.
///
/// # Errors
///
/// Returns [`ChaptermarkError::InvalidConfiguration`] for an invalid
/// config, or [`ChaptermarkError::SourceUnavailable`] if the video cannot
/// be opened.
pub fn extract_keyframes<P: AsRef<Path>>(
    path: P,
    config: &ExtractionConfig,
) -> Result<KeyframeExtractor<VideoSource>, ChaptermarkError> {
    config.validate()?;

    let source = VideoSource::open(path)?.with_decode_timeout(config.decode_timeout);
    let total = Some(source.metadata().frame_count).filter(|&count| count > 0);

    log::debug!(
        "Extracting keyframes from {} (threshold={}, max_keyframes={:?})",
        source.path().display(),
        config.threshold,
        config.max_keyframes,
    );

    Ok(KeyframeExtractor::new(source, config.clone())?.with_total_frames(total))
}
