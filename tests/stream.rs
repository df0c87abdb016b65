//! Async keyframe stream tests.

#![cfg(feature = "async")]

use std::path::Path;

use chaptermark::{ChaptermarkError, ExtractionConfig};
use tokio_stream::StreamExt;

const SAMPLE_VIDEO: &str = "tests/fixtures/sample_video.mp4";

#[tokio::test]
async fn missing_file_is_the_only_item() {
    let mut stream = chaptermark::keyframe_stream("missing.mp4", ExtractionConfig::new());
    match stream.next().await {
        Some(Err(ChaptermarkError::SourceUnavailable { .. })) => {}
        other => panic!("Expected SourceUnavailable, got: {other:?}"),
    }
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn invalid_config_is_reported() {
    let config = ExtractionConfig::new().with_max_keyframes(0);
    let mut stream = chaptermark::keyframe_stream("missing.mp4", config);
    assert!(matches!(
        stream.next().await,
        Some(Err(ChaptermarkError::InvalidConfiguration(_)))
    ));
}

#[tokio::test]
async fn stream_matches_blocking_extraction() {
    if !Path::new(SAMPLE_VIDEO).exists() {
        return;
    }

    let config = ExtractionConfig::new();
    let blocking: Vec<String> = chaptermark::extract_keyframes(SAMPLE_VIDEO, &config)
        .expect("Failed to start extraction")
        .map(|record| record.expect("Extraction failed").timestamp_label)
        .collect();

    let mut stream = chaptermark::keyframe_stream(SAMPLE_VIDEO, config);
    let mut streamed = Vec::new();
    while let Some(record) = stream.next().await {
        streamed.push(record.expect("Extraction failed").timestamp_label);
    }

    assert_eq!(streamed, blocking);
}

#[tokio::test]
async fn dropping_the_stream_stops_extraction() {
    if !Path::new(SAMPLE_VIDEO).exists() {
        return;
    }

    let mut stream = chaptermark::keyframe_stream(
        SAMPLE_VIDEO,
        ExtractionConfig::new().with_threshold(1.0),
    );
    let first = stream.next().await;
    assert!(matches!(first, Some(Ok(_))));
    drop(stream);
}
