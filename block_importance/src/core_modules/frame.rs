// THEORY:
// The reference frame is whatever the encoder wrote next to the dump: usually a
// PNG, occasionally something else, sometimes grayscale. `FrameImage` hides the
// decode step and hands the renderer a single, predictable canvas type: an
// 8-bit RGB buffer, enlarged so that blocks are big enough to inspect.

use crate::error::{ImportanceError, Result};
use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};
use std::path::Path;

/// A decoded, half-resolution reference frame.
#[derive(Debug, Clone)]
pub struct FrameImage {
    image: DynamicImage,
}

impl FrameImage {
    pub fn open(path: &Path) -> Result<Self> {
        let image = image::open(path).map_err(|e| ImportanceError::image(path, e))?;
        Ok(Self { image })
    }

    /// Decodes an in-memory encoded image (png/jpg/webp/etc).
    pub fn from_encoded_bytes(bytes: &[u8]) -> Result<Self> {
        let image =
            image::load_from_memory(bytes).map_err(|e| ImportanceError::image("<memory>", e))?;
        Ok(Self { image })
    }

    pub fn from_rgb(image: RgbImage) -> Self {
        Self {
            image: DynamicImage::ImageRgb8(image),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Enlarges the frame by `multiplier` and converts it to RGB8.
    pub fn scale(&self, multiplier: u32, filter: FilterType) -> RgbImage {
        if multiplier == 1 {
            return self.image.to_rgb8();
        }
        let width = self.width() * multiplier;
        let height = self.height() * multiplier;
        self.image.resize_exact(width, height, filter).to_rgb8()
    }
}
