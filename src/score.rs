//! Change scoring between consecutive frames.
//!
//! The score is the mean absolute intensity difference over all pixels. It
//! is a cheap global measure: a small region changing completely can score
//! lower than a faint change across the whole picture.

use crate::{error::ChaptermarkError, grayscale::GrayscaleBuffer};

/// Mean absolute per-pixel difference between two buffers, in `0.0..=255.0`.
///
/// The differences are summed exactly and divided once, so
/// `change_score(a, b) == change_score(b, a)` and `change_score(a, a) == 0.0`
/// hold bit for bit.
///
/// # Errors
///
/// Returns [`ChaptermarkError::DimensionMismatch`] if the buffers are not the
/// same size.
pub fn change_score(
    previous: &GrayscaleBuffer,
    current: &GrayscaleBuffer,
) -> Result<f64, ChaptermarkError> {
    if previous.dimensions() != current.dimensions() {
        return Err(ChaptermarkError::DimensionMismatch {
            expected: previous.dimensions(),
            actual: current.dimensions(),
        });
    }

    let total: u64 = previous
        .as_bytes()
        .iter()
        .zip(current.as_bytes())
        .map(|(&a, &b)| u64::from(a.abs_diff(b)))
        .sum();

    let pixel_count = previous.as_bytes().len() as f64;
    Ok(total as f64 / pixel_count)
}
