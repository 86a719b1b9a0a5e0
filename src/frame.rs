//! Captured frames.
//!
//! A `Frame` is immutable once captured and is shared as `Arc<Frame>` between
//! the capture thread, the detection worker and the render loop. There is no
//! mutable pixel accessor: drawing works on a private copy from
//! [`Frame::to_canvas`].

use anyhow::{anyhow, Result};
use image::RgbImage;
use std::time::Instant;

/// Bytes per pixel of every frame (packed RGB8).
pub const CHANNELS: u32 = 3;

pub struct Frame {
    image: RgbImage,
    captured_at: Instant,
    sequence: u64,
}

impl Frame {
    /// Wrap packed RGB8 pixels. Fails when the buffer length does not match.
    pub fn from_rgb(pixels: Vec<u8>, width: u32, height: u32, sequence: u64) -> Result<Self> {
        let len = pixels.len();
        let image = RgbImage::from_raw(width, height, pixels).ok_or_else(|| {
            anyhow!(
                "frame buffer of {} bytes does not fit {}x{} RGB",
                len,
                width,
                height
            )
        })?;
        Ok(Self::from_image(image, sequence))
    }

    pub fn from_image(image: RgbImage, sequence: u64) -> Self {
        Self {
            image,
            captured_at: Instant::now(),
            sequence,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn channels(&self) -> u32 {
        CHANNELS
    }

    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    /// Per-source capture counter, starting at 1.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Read-only pixel view for detectors.
    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Private, mutable copy for drawing overlays.
    pub fn to_canvas(&self) -> RgbImage {
        self.image.clone()
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("sequence", &self.sequence)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_rgb_checks_length() {
        assert!(Frame::from_rgb(vec![0u8; 12], 2, 2, 1).is_ok());
        assert!(Frame::from_rgb(vec![0u8; 11], 2, 2, 1).is_err());
    }

    #[test]
    fn canvas_is_a_private_copy() -> Result<()> {
        let frame = Frame::from_rgb(vec![10u8; 4 * 4 * 3], 4, 4, 7)?;
        let mut canvas = frame.to_canvas();
        canvas.put_pixel(0, 0, image::Rgb([255, 0, 0]));
        assert_eq!(frame.image().get_pixel(0, 0).0, [10, 10, 10]);
        assert_eq!(frame.sequence(), 7);
        assert_eq!(frame.channels(), 3);
        Ok(())
    }
}
