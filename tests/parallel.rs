//! Parallel batch extraction tests.

#![cfg(feature = "rayon")]

use std::path::Path;

use chaptermark::{CancellationToken, ChaptermarkError, ExtractionConfig};

const SAMPLE_VIDEO: &str = "tests/fixtures/sample_video.mp4";

#[test]
fn results_follow_input_order() {
    let paths = ["missing-a.mp4", "missing-b.mp4"];
    let results = chaptermark::extract_keyframes_parallel(&paths, &ExtractionConfig::new());

    assert_eq!(results.len(), 2);
    for (path, outcome) in paths.iter().zip(&results) {
        assert!(outcome.records.is_empty());
        match &outcome.error {
            Some(ChaptermarkError::SourceUnavailable { path: failed, .. }) => {
                assert_eq!(failed, Path::new(path));
            }
            other => panic!("Expected SourceUnavailable, got: {other:?}"),
        }
    }
}

#[test]
fn empty_batch() {
    let paths: [&str; 0] = [];
    assert!(chaptermark::extract_keyframes_parallel(&paths, &ExtractionConfig::new()).is_empty());
}

#[test]
fn one_failure_does_not_affect_others() {
    if !Path::new(SAMPLE_VIDEO).exists() {
        return;
    }

    let paths = [SAMPLE_VIDEO, "missing.mp4", SAMPLE_VIDEO];
    let results = chaptermark::extract_keyframes_parallel(&paths, &ExtractionConfig::new());

    assert!(results[0].is_complete(), "First video should succeed");
    assert!(!results[1].is_complete());
    assert!(results[2].is_complete(), "Third video should succeed");
    assert_eq!(results[0].records, results[2].records);
    assert!(!results[0].records.is_empty());
}

#[test]
fn failed_video_keeps_records_from_before_the_failure() {
    if !Path::new(SAMPLE_VIDEO).exists() {
        return;
    }

    // Cancel between the first colour change (frame 50) and the second
    // (frame 100).
    let token = CancellationToken::new();
    let config = ExtractionConfig::new()
        .with_batch_size(1)
        .with_cancellation(token.clone())
        .with_progress(std::sync::Arc::new(CancelAfterFrames { token, frames: 75 }));

    let results = chaptermark::extract_keyframes_parallel(&[SAMPLE_VIDEO], &config);
    let outcome = &results[0];
    assert!(matches!(outcome.error, Some(ChaptermarkError::Cancelled)));
    let labels: Vec<&str> = outcome
        .records
        .iter()
        .map(|record| record.timestamp_label.as_str())
        .collect();
    assert_eq!(labels, vec!["00-00-02"]);
}

struct CancelAfterFrames {
    token: CancellationToken,
    frames: u64,
}

impl chaptermark::ProgressCallback for CancelAfterFrames {
    fn on_progress(&self, info: &chaptermark::ProgressInfo) {
        if info.frames_scanned >= self.frames {
            self.token.cancel();
        }
    }
}

#[test]
fn cancelled_batch() {
    if !Path::new(SAMPLE_VIDEO).exists() {
        return;
    }

    let token = CancellationToken::new();
    token.cancel();
    let config = ExtractionConfig::new().with_cancellation(token);

    let results = chaptermark::extract_keyframes_parallel(&[SAMPLE_VIDEO, SAMPLE_VIDEO], &config);
    assert!(
        results
            .iter()
            .all(|outcome| matches!(outcome.error, Some(ChaptermarkError::Cancelled)))
    );
}
