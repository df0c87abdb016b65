//! Video stream metadata.

use std::time::Duration;

/// Properties of the video stream a [`VideoSource`](crate::VideoSource)
/// decodes, read once when the container is opened.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoMetadata {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Average frame rate, or `0.0` when the container does not report one.
    pub frames_per_second: f64,
    /// Estimated frame count (`duration × frames_per_second`).
    ///
    /// Only an estimate: variable frame-rate streams and inaccurate container
    /// durations make it drift from the number of frames actually decoded.
    pub frame_count: u64,
    /// Container duration, or zero when unknown.
    pub duration: Duration,
    /// Codec name as reported by FFmpeg (e.g. `"h264"`).
    pub codec: String,
    /// Container format name (e.g. `"mov,mp4,m4a,3gp,3g2,mj2"`).
    pub format: String,
    /// Index of the decoded stream within the container.
    pub stream_index: usize,
}
