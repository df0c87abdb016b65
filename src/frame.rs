//! Decoded video frames.

use image::RgbImage;

/// An immutable decoded picture and the decoder position it was read at.
///
/// Produced by a frame source (normally [`VideoSource`](crate::VideoSource))
/// and owned by the extraction loop until it is either dropped or moved into
/// a [`KeyframeRecord`](crate::KeyframeRecord).
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    timestamp_ms: f64,
    image: RgbImage,
}

impl Frame {
    /// Wrap an RGB image taken at `timestamp_ms` milliseconds into the video.
    pub fn new(timestamp_ms: f64, image: RgbImage) -> Self {
        Self {
            timestamp_ms,
            image,
        }
    }

    /// Position of this frame in milliseconds from the start of the stream.
    pub fn timestamp_ms(&self) -> f64 {
        self.timestamp_ms
    }

    /// The colour picture.
    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Consume the frame and return its picture.
    pub fn into_image(self) -> RgbImage {
        self.image
    }

    /// Picture width in pixels.
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Picture height in pixels.
    pub fn height(&self) -> u32 {
        self.image.height()
    }
}
