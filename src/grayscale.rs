//! Colour to luma reduction.
//!
//! Frames are compared in a single intensity channel. The reduction uses the
//! BT.601 weights in 14-bit fixed point with round-half-up, so neutral greys
//! map to themselves exactly and results are bit-identical across platforms.

use image::GrayImage;

use crate::{error::ChaptermarkError, frame::Frame};

const LUMA_SHIFT: u32 = 14;
const LUMA_RED: u32 = 4899;
const LUMA_GREEN: u32 = 9617;
const LUMA_BLUE: u32 = 1868;
const LUMA_ROUND: u32 = 1 << (LUMA_SHIFT - 1);

/// A single-channel 8-bit intensity grid with the dimensions of its source
/// frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrayscaleBuffer {
    image: GrayImage,
}

impl GrayscaleBuffer {
    /// Build a buffer from row-major luma bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ChaptermarkError::InvalidFrame`] if either dimension is
    /// zero or `data.len() != width * height`.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self, ChaptermarkError> {
        ensure_non_empty(width, height)?;
        let length = data.len();
        let image = GrayImage::from_raw(width, height, data).ok_or_else(|| {
            ChaptermarkError::InvalidFrame {
                width,
                height,
                reason: format!("buffer holds {length} bytes"),
            }
        })?;
        Ok(Self { image })
    }

    /// Width of the luma plane in pixels.
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Height of the luma plane in pixels.
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// `(width, height)`.
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Row-major intensity values.
    pub fn as_bytes(&self) -> &[u8] {
        self.image.as_raw()
    }

    /// Intensity at `(x, y)`, or `None` outside the buffer.
    pub fn get(&self, x: u32, y: u32) -> Option<u8> {
        self.image.get_pixel_checked(x, y).map(|pixel| pixel.0[0])
    }
}

/// Luma of one RGB pixel.
pub fn luma(red: u8, green: u8, blue: u8) -> u8 {
    let weighted = LUMA_RED * red as u32 + LUMA_GREEN * green as u32 + LUMA_BLUE * blue as u32;
    ((weighted + LUMA_ROUND) >> LUMA_SHIFT) as u8
}

/// Reduce a colour frame to its grayscale buffer.
///
/// # Errors
///
/// Returns [`ChaptermarkError::InvalidFrame`] for a zero-width or
/// zero-height frame.
pub fn reduce(frame: &Frame) -> Result<GrayscaleBuffer, ChaptermarkError> {
    ensure_non_empty(frame.width(), frame.height())?;

    let data: Vec<u8> = frame
        .image()
        .as_raw()
        .chunks_exact(3)
        .map(|rgb| luma(rgb[0], rgb[1], rgb[2]))
        .collect();

    GrayscaleBuffer::from_raw(frame.width(), frame.height(), data)
}

fn ensure_non_empty(width: u32, height: u32) -> Result<(), ChaptermarkError> {
    if width == 0 || height == 0 {
        return Err(ChaptermarkError::InvalidFrame {
            width,
            height,
            reason: "frame has no pixels".to_string(),
        });
    }
    Ok(())
}
