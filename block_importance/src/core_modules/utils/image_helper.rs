use crate::error::{ImportanceError, Result};
use image::codecs::png::PngEncoder;
use image::{ImageEncoder, RgbImage};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Encodes an RGB canvas as PNG at `path`, replacing any existing file.
pub fn save_png(path: &Path, canvas: &RgbImage) -> Result<()> {
    let file = std::fs::File::create(path).map_err(|e| ImportanceError::io(path, e))?;
    let mut writer = BufWriter::new(file);

    PngEncoder::new(&mut writer)
        .write_image(
            canvas.as_raw(),
            canvas.width(),
            canvas.height(),
            image::ExtendedColorType::Rgb8,
        )
        .map_err(|e| ImportanceError::image(path, e))?;

    writer.flush().map_err(|e| ImportanceError::io(path, e))
}
