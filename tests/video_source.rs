//! VideoSource and end-to-end extraction tests.
//!
//! Tests that decode real video require fixture files from
//! `tests/fixtures/generate_fixtures.sh` and are skipped when they are
//! missing. The sample video is three 2-second solid colour segments
//! (black, white, mid grey) at 320x240, 25 fps.

use std::path::Path;
use std::time::Duration;

use chaptermark::{ChaptermarkError, ExtractionConfig, VideoSource};

fn sample_video_path() -> &'static str {
    "tests/fixtures/sample_video.mp4"
}

fn audio_only_path() -> &'static str {
    "tests/fixtures/sample_audio.wav"
}

// ── opening ──────────────────────────────────────────────────────

#[test]
fn open_nonexistent_file() {
    match VideoSource::open("this_file_does_not_exist.mp4") {
        Err(ChaptermarkError::SourceUnavailable { path, .. }) => {
            assert_eq!(path, Path::new("this_file_does_not_exist.mp4"));
        }
        other => panic!("Expected SourceUnavailable, got: {other:?}"),
    }
}

#[test]
fn open_invalid_file() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let invalid_file_path = temporary_directory.path().join("invalid.mp4");
    std::fs::write(&invalid_file_path, b"this is not a media file")
        .expect("Failed to write invalid file");

    let result = VideoSource::open(&invalid_file_path);
    assert!(
        matches!(result, Err(ChaptermarkError::SourceUnavailable { .. })),
        "Expected SourceUnavailable for garbage input, got: {result:?}",
    );
}

#[test]
fn open_audio_only_file() {
    let path = audio_only_path();
    if !Path::new(path).exists() {
        return;
    }

    match VideoSource::open(path) {
        Err(ChaptermarkError::SourceUnavailable { reason, .. }) => {
            assert!(
                reason.contains("no video stream"),
                "Reason should mention the missing stream: {reason}",
            );
        }
        other => panic!("Expected SourceUnavailable, got: {other:?}"),
    }
}

#[test]
fn extract_nonexistent_file() {
    let result = chaptermark::extract_keyframes("missing.mp4", &ExtractionConfig::new());
    assert!(matches!(
        result,
        Err(ChaptermarkError::SourceUnavailable { .. })
    ));
}

// ── metadata ─────────────────────────────────────────────────────

#[test]
fn sample_metadata() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let source = VideoSource::open(path).expect("Failed to open test video");
    let metadata = source.metadata();
    assert_eq!(metadata.width, 320);
    assert_eq!(metadata.height, 240);
    assert!(
        (metadata.frames_per_second - 25.0).abs() < 0.01,
        "Expected 25 fps, got {}",
        metadata.frames_per_second,
    );
    assert!(metadata.duration > Duration::from_secs(5));
    assert!(metadata.frame_count >= 140 && metadata.frame_count <= 160);
    assert_eq!(metadata.codec, "h264");
    assert_eq!(source.frames_decoded(), 0, "Opening decodes nothing");
}

// ── decoding ─────────────────────────────────────────────────────

#[test]
fn frames_match_stream_size() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let source = VideoSource::open(path).expect("Failed to open test video");
    for frame in source.take(5) {
        let frame = frame.expect("Failed to decode frame");
        assert_eq!((frame.width(), frame.height()), (320, 240));
    }
}

#[test]
fn timestamps_are_non_decreasing() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let source = VideoSource::open(path).expect("Failed to open test video");
    let timestamps: Vec<f64> = source
        .map(|frame| frame.expect("Failed to decode frame").timestamp_ms())
        .collect();

    assert!(timestamps.len() >= 140, "Decoded {} frames", timestamps.len());
    assert!(timestamps[0] < 1.0, "First frame at {} ms", timestamps[0]);
    assert!(timestamps.windows(2).all(|pair| pair[0] <= pair[1]));
    // 25 fps
    assert!((timestamps[25] - 1_000.0).abs() < 1.0);
}

#[test]
fn exhausted_source_stays_exhausted() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let mut source = VideoSource::open(path).expect("Failed to open test video");
    let count = source.by_ref().count();
    assert_eq!(source.frames_decoded(), count as u64);
    assert!(source.next().is_none());
}

#[test]
fn generous_timeout_does_not_fire() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let source = VideoSource::open(path)
        .expect("Failed to open test video")
        .with_decode_timeout(Some(Duration::from_secs(30)));
    assert!(source.into_iter().all(|frame| frame.is_ok()));
}

#[test]
fn expired_timeout_ends_the_source() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let mut source = VideoSource::open(path)
        .expect("Failed to open test video")
        .with_decode_timeout(Some(Duration::from_nanos(1)));

    match source.next() {
        Some(Err(ChaptermarkError::DecodeTimeout {
            frame_index,
            timeout,
        })) => {
            assert_eq!(frame_index, 0);
            assert_eq!(timeout, Duration::from_nanos(1));
        }
        other => panic!("Expected DecodeTimeout, got: {other:?}"),
    }
    assert!(source.next().is_none());
    assert_eq!(source.frames_decoded(), 0);
}

// ── end to end ───────────────────────────────────────────────────

#[test]
fn colour_changes_are_keyframes() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let records: Vec<_> = chaptermark::extract_keyframes(path, &ExtractionConfig::new())
        .expect("Failed to start extraction")
        .collect::<Result<_, _>>()
        .expect("Extraction failed");

    let labels: Vec<&str> = records.iter().map(|r| r.timestamp_label.as_str()).collect();
    assert_eq!(labels, vec!["00-00-02", "00-00-04"]);
    assert!((49..=51).contains(&records[0].frame_index));
    assert!((99..=101).contains(&records[1].frame_index));
    assert!(records.iter().all(|r| r.score > 20.0));
}

#[test]
fn high_threshold_finds_fewer_keyframes() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    // Black to white scores ~255, white to grey ~127.
    let config = ExtractionConfig::new().with_threshold(200.0);
    let count = chaptermark::extract_keyframes(path, &config)
        .expect("Failed to start extraction")
        .filter(|record| record.is_ok())
        .count();
    assert_eq!(count, 1);
}

#[test]
fn cap_stops_decoding_early() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let config = ExtractionConfig::new().with_max_keyframes(1);
    let mut extractor =
        chaptermark::extract_keyframes(path, &config).expect("Failed to start extraction");
    assert!(extractor.next().unwrap().is_ok());
    assert!(extractor.next().is_none());
    assert!(
        extractor.frames_read() <= 52,
        "Read {} frames after the first keyframe",
        extractor.frames_read()
    );
}

#[test]
fn extraction_is_deterministic() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let run = || -> Vec<(u64, String, f64)> {
        chaptermark::extract_keyframes(path, &ExtractionConfig::new().with_threshold(5.0))
            .expect("Failed to start extraction")
            .map(|record| {
                let record = record.expect("Extraction failed");
                (record.frame_index, record.timestamp_label, record.score)
            })
            .collect()
    };
    assert_eq!(run(), run());
}
