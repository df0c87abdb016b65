//! Async keyframe streaming.
//!
//! [`KeyframeStream`] runs a [`KeyframeExtractor`](crate::KeyframeExtractor)
//! on a blocking thread via `tokio::task::spawn_blocking` and hands its
//! records back through a bounded channel, so decoding never stalls the
//! async runtime.
//!
//! This module is available when the `async` feature is enabled.
//!
//! # Example
//!
//! ```no_run
//! use tokio_stream::StreamExt;
//!
//! use chaptermark::{ChaptermarkError, ExtractionConfig};
//!
//! # async fn example() -> Result<(), ChaptermarkError> {
//! let mut stream = chaptermark::keyframe_stream("talk.mp4", ExtractionConfig::new());
//! while let Some(record) = stream.next().await {
//!     let record = record?;
//!     println!("{} (score {:.1})", record.timestamp_label, record.score);
//! }
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::mpsc::{Receiver, Sender};
use tokio::task::JoinHandle;
use tokio_stream::Stream;

use crate::configuration::ExtractionConfig;
use crate::error::ChaptermarkError;
use crate::extractor::KeyframeRecord;

/// Bounded-channel capacity. Each record holds a full-size frame, so only a
/// couple are buffered.
const CHANNEL_CAPACITY: usize = 2;

/// A stream of keyframe records produced by a background extraction.
///
/// Dropping the stream closes the channel; the background thread notices at
/// its next record, drops the extractor and releases the video.
pub struct KeyframeStream {
    receiver: Receiver<Result<KeyframeRecord, ChaptermarkError>>,
    #[allow(dead_code)]
    handle: JoinHandle<()>,
}

impl Stream for KeyframeStream {
    type Item = Result<KeyframeRecord, ChaptermarkError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

/// Start extracting keyframes from `path` on a blocking thread.
///
/// Must be called from within a Tokio runtime. Open and configuration
/// errors arrive as the first (and only) stream item.
pub fn keyframe_stream<P: Into<PathBuf>>(path: P, config: ExtractionConfig) -> KeyframeStream {
    let path = path.into();
    let (sender, receiver) = tokio::sync::mpsc::channel(CHANNEL_CAPACITY);

    let handle = tokio::task::spawn_blocking(move || {
        if let Err(error) = extract_blocking(&path, &config, &sender) {
            let _ = sender.blocking_send(Err(error));
        }
    });

    KeyframeStream { receiver, handle }
}

/// Background loop. Returns `Ok` when the receiver hung up early.
fn extract_blocking(
    path: &Path,
    config: &ExtractionConfig,
    sender: &Sender<Result<KeyframeRecord, ChaptermarkError>>,
) -> Result<(), ChaptermarkError> {
    let extractor = crate::extractor::extract_keyframes(path, config)?;

    for record in extractor {
        let failed = record.is_err();
        if sender.blocking_send(record).is_err() {
            log::debug!("Keyframe stream for {} dropped by receiver", path.display());
            return Ok(());
        }
        if failed {
            break;
        }
    }

    Ok(())
}
