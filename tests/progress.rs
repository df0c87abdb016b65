//! Progress callback and cancellation tests.

use std::sync::{Arc, Mutex};

use chaptermark::{
    CancellationToken, ChaptermarkError, ExtractionConfig, Frame, KeyframeExtractor,
    OperationType, ProgressCallback, ProgressInfo,
};
use image::{Rgb, RgbImage};

/// Records every ProgressInfo it receives.
struct RecordingProgress {
    infos: Mutex<Vec<ProgressInfo>>,
}

impl RecordingProgress {
    fn new() -> Self {
        Self {
            infos: Mutex::new(Vec::new()),
        }
    }

    fn infos(&self) -> Vec<ProgressInfo> {
        self.infos.lock().unwrap().clone()
    }
}

impl ProgressCallback for RecordingProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        self.infos.lock().unwrap().push(info.clone());
    }
}

fn grey_frames(values: &[u8]) -> std::vec::IntoIter<Result<Frame, ChaptermarkError>> {
    values
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            Ok(Frame::new(
                i as f64 * 500.0,
                RgbImage::from_pixel(2, 2, Rgb([v, v, v])),
            ))
        })
        .collect::<Vec<_>>()
        .into_iter()
}

fn run(values: &[u8], config: ExtractionConfig, total: Option<u64>) -> usize {
    match KeyframeExtractor::new(grey_frames(values), config) {
        Ok(extractor) => extractor
            .with_total_frames(total)
            .filter_map(Result::ok)
            .count(),
        Err(error) => panic!("Failed to build extractor: {error}"),
    }
}

// ── callbacks ────────────────────────────────────────────────────

#[test]
fn reports_every_frame_plus_final() {
    let recorder = Arc::new(RecordingProgress::new());
    let config = ExtractionConfig::new().with_progress(recorder.clone());

    let keyframes = run(&[0, 0, 50, 50, 110], config, Some(5));
    assert_eq!(keyframes, 2);

    let infos = recorder.infos();
    assert_eq!(infos.len(), 6, "Five per-frame reports and one final report");

    let currents: Vec<u64> = infos.iter().map(|i| i.frames_scanned).collect();
    assert_eq!(currents, vec![1, 2, 3, 4, 5, 5]);

    let frames: Vec<Option<u64>> = infos.iter().map(|i| i.frame_index).collect();
    assert_eq!(frames, vec![Some(0), Some(1), Some(2), Some(3), Some(4), None]);

    let last = infos.last().unwrap();
    assert_eq!(last.operation, OperationType::KeyframeExtraction);
    assert_eq!(last.keyframes, 2);
    assert_eq!(last.frames_expected, Some(5));
    assert_eq!(last.percentage, Some(100.0));
    assert!(last.position.is_none());
}

#[test]
fn reports_carry_frame_timestamps() {
    let recorder = Arc::new(RecordingProgress::new());
    let config = ExtractionConfig::new().with_progress(recorder.clone());
    run(&[0, 0, 0], config, None);

    let infos = recorder.infos();
    assert_eq!(
        infos[2].position,
        Some(std::time::Duration::from_millis(1_000))
    );
    assert!(infos.iter().all(|i| i.percentage.is_none()));
    assert!(infos.iter().all(|i| i.estimated_remaining.is_none()));
}

#[test]
fn keyframe_count_grows() {
    let recorder = Arc::new(RecordingProgress::new());
    let config = ExtractionConfig::new().with_progress(recorder.clone());
    run(&[0, 100, 0, 100], config, None);

    let counts: Vec<u64> = recorder.infos().iter().map(|i| i.keyframes).collect();
    // The count is bumped after the frame's progress report.
    assert_eq!(counts, vec![0, 0, 1, 2, 3]);
}

#[test]
fn batch_size_reduces_reports() {
    let recorder = Arc::new(RecordingProgress::new());
    let config = ExtractionConfig::new()
        .with_progress(recorder.clone())
        .with_batch_size(2);
    run(&[0, 0, 0, 0, 0], config, Some(5));

    let currents: Vec<u64> = recorder.infos().iter().map(|i| i.frames_scanned).collect();
    assert_eq!(currents, vec![2, 4, 5]);
}

#[test]
fn final_report_is_sent_once_on_early_stop() {
    let recorder = Arc::new(RecordingProgress::new());
    let config = ExtractionConfig::new()
        .with_progress(recorder.clone())
        .with_max_keyframes(1);

    let mut extractor = KeyframeExtractor::new(grey_frames(&[0, 100, 0, 100]), config)
        .ok()
        .expect("valid config");
    assert!(extractor.next().unwrap().is_ok());
    assert!(extractor.next().is_none());
    assert!(extractor.next().is_none());

    let finals = recorder
        .infos()
        .iter()
        .filter(|i| i.frame_index.is_none())
        .count();
    assert_eq!(finals, 1);
}

#[test]
fn empty_source_still_reports_completion() {
    let recorder = Arc::new(RecordingProgress::new());
    let config = ExtractionConfig::new().with_progress(recorder.clone());
    run(&[], config, Some(0));

    let infos = recorder.infos();
    assert_eq!(infos.len(), 1);
    assert_eq!(infos[0].frames_scanned, 0);
    assert_eq!(infos[0].percentage, None, "Zero total gives no percentage");
}

// ── cancellation ─────────────────────────────────────────────────

#[test]
fn cancellation_token_clones_share_state() {
    let token = CancellationToken::new();
    let clone = token.clone();
    assert!(!clone.is_cancelled());
    token.cancel();
    assert!(clone.is_cancelled());
}

#[test]
fn cancellation_token_default() {
    assert!(!CancellationToken::default().is_cancelled());
}

#[test]
fn cancel_from_another_thread() {
    let token = CancellationToken::new();
    let remote = token.clone();
    std::thread::spawn(move || remote.cancel())
        .join()
        .expect("Thread panicked");
    assert!(token.is_cancelled());
}

#[test]
fn cancel_from_progress_callback() {
    struct CancelAfter {
        token: CancellationToken,
        after: u64,
    }

    impl ProgressCallback for CancelAfter {
        fn on_progress(&self, info: &ProgressInfo) {
            if info.frames_scanned >= self.after {
                self.token.cancel();
            }
        }
    }

    let token = CancellationToken::new();
    let config = ExtractionConfig::new()
        .with_progress(Arc::new(CancelAfter {
            token: token.clone(),
            after: 3,
        }))
        .with_cancellation(token);

    let mut extractor =
        KeyframeExtractor::new(grey_frames(&[0, 100, 0, 100, 0, 100]), config)
            .ok()
            .expect("valid config");
    let items: Vec<_> = extractor.by_ref().collect();

    assert_eq!(items.len(), 3, "Two keyframes, then the cancellation");
    assert!(items[0].is_ok());
    assert!(items[1].is_ok());
    assert!(matches!(items[2], Err(ChaptermarkError::Cancelled)));
    assert_eq!(extractor.frames_read(), 3);
}
