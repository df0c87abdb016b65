//! Keyframe timestamp labels.
//!
//! Labels have the fixed form `HH-MM-SS` so they can double as file names.
//! Every unit is truncated, never rounded, and hours wrap at 24: a frame at
//! 25h01m01s is labelled `01-01-01`. Existing chapter lists depend on those
//! exact labels.

use crate::error::ChaptermarkError;

const MILLIS_PER_SECOND: f64 = 1_000.0;
const MILLIS_PER_MINUTE: f64 = 60.0 * MILLIS_PER_SECOND;
const MILLIS_PER_HOUR: f64 = 60.0 * MILLIS_PER_MINUTE;

/// Format a millisecond offset as `HH-MM-SS`.
///
/// ```
/// use chaptermark::format_timestamp;
///
/// assert_eq!(format_timestamp(0.0).unwrap(), "00-00-00");
/// assert_eq!(format_timestamp(3_661_000.0).unwrap(), "01-01-01");
/// assert_eq!(format_timestamp(59_999.9).unwrap(), "00-00-59");
/// ```
///
/// # Errors
///
/// Returns [`ChaptermarkError::InvalidTimestamp`] for negative, NaN or
/// infinite input.
pub fn format_timestamp(milliseconds: f64) -> Result<String, ChaptermarkError> {
    if !milliseconds.is_finite() || milliseconds < 0.0 {
        return Err(ChaptermarkError::InvalidTimestamp(milliseconds));
    }

    let seconds = (milliseconds / MILLIS_PER_SECOND % 60.0) as u32;
    let minutes = (milliseconds / MILLIS_PER_MINUTE % 60.0) as u32;
    let hours = (milliseconds / MILLIS_PER_HOUR % 24.0) as u32;

    Ok(format!("{hours:02}-{minutes:02}-{seconds:02}"))
}
