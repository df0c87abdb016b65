//! Internal helpers for FFmpeg frame data and timestamps.

use ffmpeg_next::{Rational, frame::Video as VideoFrame};

/// Copy a packed RGB24 plane into a tightly-packed buffer.
///
/// FFmpeg rows usually carry alignment padding (stride > width × 3). The
/// padding is stripped so the result can go straight into
/// [`image::RgbImage::from_raw`].
pub(crate) fn rgb_plane_to_buffer(video_frame: &VideoFrame, width: u32, height: u32) -> Vec<u8> {
    let stride = video_frame.stride(0);
    let row_length = (width as usize) * 3;
    let data = video_frame.data(0);

    if stride == row_length {
        data[..row_length * (height as usize)].to_vec()
    } else {
        let mut buffer = Vec::with_capacity(row_length * (height as usize));
        for row in data.chunks(stride).take(height as usize) {
            buffer.extend_from_slice(&row[..row_length]);
        }
        buffer
    }
}

/// Rescale a stream timestamp to milliseconds relative to `start`.
pub(crate) fn stream_timestamp_to_milliseconds(timestamp: i64, start: i64, time_base: Rational) -> f64 {
    let ticks = timestamp.saturating_sub(start) as f64;
    ticks * 1_000.0 * f64::from(time_base.numerator()) / f64::from(time_base.denominator())
}

/// Average frame rate of a stream, falling back to its real base rate.
pub(crate) fn frames_per_second(average: Rational, base: Rational) -> f64 {
    [average, base]
        .into_iter()
        .find(|rate| rate.numerator() > 0 && rate.denominator() > 0)
        .map(|rate| f64::from(rate.numerator()) / f64::from(rate.denominator()))
        .unwrap_or(0.0)
}
