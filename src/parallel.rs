//! Parallel extraction over several videos.
//!
//! A single extraction is inherently sequential, since every step compares
//! against the previous frame. Different videos share nothing, so
//! [`extract_keyframes_parallel`] runs one extraction per file on the rayon
//! thread pool. Each worker opens its own demuxer and decoder.
//!
//! This module is available when the `rayon` feature is enabled.

use std::path::Path;

use ::rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use crate::configuration::ExtractionConfig;
use crate::extractor::ExtractionOutcome;

/// Extract keyframes from every path in parallel.
///
/// Returns one [`ExtractionOutcome`] per input, in input order. A failure in
/// one video does not affect the others, and a video that fails partway
/// keeps the records it emitted before the failure. Cancelling the config's
/// token stops all of them.
pub fn extract_keyframes_parallel<P>(
    paths: &[P],
    config: &ExtractionConfig,
) -> Vec<ExtractionOutcome>
where
    P: AsRef<Path> + Sync,
{
    paths
        .par_iter()
        .map(|path| match crate::extractor::extract_keyframes(path, config) {
            Ok(extractor) => extractor.collect(),
            Err(error) => ExtractionOutcome::failed(error),
        })
        .collect()
}
