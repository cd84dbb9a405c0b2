//! Captured video frames.
//!
//! - `Frame`: RGB pixels straight from a capture, plus capture metadata.
//! - `Frame::prepare`: scales to the tracking resolution and converts to
//!   grayscale, which is what detector backends consume.

use anyhow::{anyhow, Result};
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, RgbImage};

/// One RGB frame from a capture.
pub struct Frame {
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Monotonic capture counter assigned by the capture.
    pub sequence: u64,
}

impl Frame {
    /// Wrap packed RGB bytes. Fails when the buffer does not match the size.
    pub fn from_rgb(data: Vec<u8>, width: u32, height: u32, sequence: u64) -> Result<Self> {
        let expected_len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if data.len() != expected_len {
            return Err(anyhow!(
                "expected {} RGB bytes for {}x{}, received {}",
                expected_len,
                width,
                height,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
            sequence,
        })
    }

    /// Scale to `width`x`height` and convert to grayscale.
    ///
    /// Detection coordinates are in this prepared image's space, so the
    /// tracker evaluates positions against the same dimensions.
    pub fn prepare(&self, width: u32, height: u32) -> Result<GrayImage> {
        let rgb = RgbImage::from_raw(self.width, self.height, self.data.clone())
            .ok_or_else(|| anyhow!("frame buffer does not match its dimensions"))?;
        let image = DynamicImage::ImageRgb8(rgb);
        if self.width == width && self.height == height {
            return Ok(image.to_luma8());
        }
        Ok(image
            .resize_exact(width, height, FilterType::Triangle)
            .to_luma8())
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("sequence", &self.sequence)
            .finish_non_exhaustive()
    }
}
