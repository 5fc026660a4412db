//! Decoded raster frames.
//!
//! A `Frame` is the unit of work for every pipeline: produced by a frame
//! source, read by the detector, copied by the renderer, then dropped.

use anyhow::{anyhow, Result};
use image::{DynamicImage, RgbImage};

/// One decoded RGB frame and its position in the sequence it came from.
#[derive(Clone, Debug)]
pub struct Frame {
    image: RgbImage,
    index: u64,
}

impl Frame {
    pub fn new(image: RgbImage, index: u64) -> Self {
        Self { image, index }
    }

    pub fn from_dynamic(image: DynamicImage, index: u64) -> Self {
        Self {
            image: image.into_rgb8(),
            index,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Position in the producing sequence, starting at 0.
    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }
}

pub(crate) fn rgb_len(width: u32, height: u32) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(3))
        .ok_or_else(|| anyhow!("frame dimensions overflow"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dynamic_images_are_converted_to_rgb() {
        let rgba = image::RgbaImage::from_pixel(4, 3, image::Rgba([10, 20, 30, 128]));
        let frame = Frame::from_dynamic(DynamicImage::ImageRgba8(rgba), 0);
        assert_eq!(frame.dimensions(), (4, 3));
        assert_eq!(frame.image().get_pixel(0, 0).0, [10, 20, 30]);
    }
}
