// THEORY:
// The overlay turns a score grid into something a person can read at a glance:
// a black block grid over the enlarged reference frame, with every block washed
// in red whose brightness tracks its importance.
//
// Key architectural principles:
// 1.  **Fixed Ceiling by Default**: Intensity is `score / ceiling`, clamped to
//     [0, 1]. With a fixed ceiling two dumps from different frames or encoder
//     builds can be compared side by side; anything at or above the ceiling is
//     simply "as important as it gets".
// 2.  **Draw Order**: The grid is drawn first and the translucent blocks are
//     blended over it, so grid lines pick up the tint of the block they border.
// 3.  **Zero Guard**: A ceiling that is not strictly positive has no meaningful
//     intensity, so the overlay pass is skipped and only the grid is drawn.

use crate::core_modules::block_geometry::{BlockGeometry, BlockRect};
use crate::core_modules::frame::FrameImage;
use crate::core_modules::importance_map::ImportanceMap;
use crate::error::Result;
use image::imageops::FilterType;
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_line_segment_mut;

/// Score at which the red channel saturates.
pub const MAX_DISPLAY_SCORE: f32 = 10.0;
/// Opacity of the importance tint.
pub const OVERLAY_ALPHA: u8 = 128;
pub const GRID_COLOR: Rgb<u8> = Rgb([0, 0, 0]);

/// How a map's scores are normalized into intensities.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScoreScale {
    /// Divide by a constant ceiling shared by every image.
    Fixed(f32),
    /// Divide by the map's own largest finite score.
    Relative,
}

impl Default for ScoreScale {
    fn default() -> Self {
        Self::Fixed(MAX_DISPLAY_SCORE)
    }
}

impl ScoreScale {
    pub fn ceiling(&self, map: &ImportanceMap) -> f32 {
        match *self {
            Self::Fixed(ceiling) => ceiling,
            Self::Relative => map.max_score().unwrap_or(0.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayStyle {
    pub scale: ScoreScale,
    pub alpha: u8,
    pub grid_color: Rgb<u8>,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            scale: ScoreScale::default(),
            alpha: OVERLAY_ALPHA,
            grid_color: GRID_COLOR,
        }
    }
}

/// Red intensity for `score` under `ceiling`.
///
/// NaN scores map to zero and infinities clamp like any other out-of-range value.
pub fn intensity(score: f32, ceiling: f32) -> u8 {
    let ratio = (score / ceiling).clamp(0.0, 1.0);
    (ratio * 255.0) as u8
}

fn blend_channel(dst: u8, src: u8, alpha: u8) -> u8 {
    let a = alpha as u32;
    ((src as u32 * a + dst as u32 * (255 - a) + 127) / 255) as u8
}

fn blend_rect(canvas: &mut RgbImage, rect: BlockRect, color: Rgb<u8>, alpha: u8) {
    let x_end = (rect.x + rect.size).min(canvas.width());
    let y_end = (rect.y + rect.size).min(canvas.height());
    for y in rect.y..y_end {
        for x in rect.x..x_end {
            let pixel = canvas.get_pixel_mut(x, y);
            for channel in 0..3 {
                pixel.0[channel] = blend_channel(pixel.0[channel], color.0[channel], alpha);
            }
        }
    }
}

/// Draws one-pixel grid lines every `block_pixel_size` pixels across the canvas.
pub fn draw_grid(canvas: &mut RgbImage, block_pixel_size: u32, color: Rgb<u8>) {
    let (width, height) = canvas.dimensions();
    let step = block_pixel_size.max(1) as usize;

    for x in (0..width).step_by(step) {
        let x = x as f32;
        draw_line_segment_mut(canvas, (x, 0.0), (x, height as f32), color);
    }
    for y in (0..height).step_by(step) {
        let y = y as f32;
        draw_line_segment_mut(canvas, (0.0, y), (width as f32, y), color);
    }
}

/// Blends every block of `map` onto the canvas, unless the ceiling disables the pass.
pub fn draw_importances(
    canvas: &mut RgbImage,
    map: &ImportanceMap,
    geometry: &BlockGeometry,
    style: &OverlayStyle,
) {
    let ceiling = style.scale.ceiling(map);
    if ceiling.is_nan() || ceiling <= 0.0 {
        log::debug!("display ceiling {ceiling} is not positive; drawing grid only");
        return;
    }

    for (row, col, score) in map.blocks() {
        let color = Rgb([intensity(score, ceiling), 0, 0]);
        blend_rect(canvas, geometry.block_rect(row, col), color, style.alpha);
    }
}

/// Produces the finished overlay for one frame and its importance map.
pub fn render_overlay(
    frame: &FrameImage,
    map: &ImportanceMap,
    geometry: &BlockGeometry,
    filter: FilterType,
    style: &OverlayStyle,
) -> Result<RgbImage> {
    let scaled = frame.scale(geometry.multiplier(), filter);
    let (width, height) =
        geometry.fit_canvas(map.rows(), map.cols(), scaled.width(), scaled.height())?;

    let mut canvas = if (width, height) == scaled.dimensions() {
        scaled
    } else {
        log::debug!(
            "padding {}x{} canvas to {width}x{height} to fit the block grid",
            scaled.width(),
            scaled.height()
        );
        let mut padded = RgbImage::new(width, height);
        image::imageops::replace(&mut padded, &scaled, 0, 0);
        padded
    };

    draw_grid(&mut canvas, geometry.block_pixel_size(), style.grid_color);
    draw_importances(&mut canvas, map, geometry, style);
    Ok(canvas)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ImportanceError;

    const S: u32 = 16;

    fn black_frame(blocks_x: u32, blocks_y: u32) -> FrameImage {
        // Each block is 4x4 pixels on the half-resolution reference.
        FrameImage::from_rgb(RgbImage::new(blocks_x * 4, blocks_y * 4))
    }

    fn block_interior(canvas: &RgbImage, row: u32, col: u32) -> Rgb<u8> {
        *canvas.get_pixel(col * S + S / 2, row * S + S / 2)
    }

    fn render(frame: &FrameImage, map: &ImportanceMap, style: &OverlayStyle) -> RgbImage {
        render_overlay(
            frame,
            map,
            &BlockGeometry::default(),
            FilterType::Nearest,
            style,
        )
        .unwrap()
    }

    #[test]
    fn intensity_saturates_at_ceiling() {
        let full = intensity(MAX_DISPLAY_SCORE, MAX_DISPLAY_SCORE);
        assert_eq!(full, 255);
        for score in [10.0, 10.5, 20.0, 1e9, f32::INFINITY] {
            assert_eq!(intensity(score, MAX_DISPLAY_SCORE), full, "score {score}");
        }
    }

    #[test]
    fn intensity_clamps_low_end() {
        assert_eq!(intensity(0.0, MAX_DISPLAY_SCORE), 0);
        assert_eq!(intensity(-3.0, MAX_DISPLAY_SCORE), 0);
        assert_eq!(intensity(f32::NAN, MAX_DISPLAY_SCORE), 0);
        assert_eq!(intensity(5.0, MAX_DISPLAY_SCORE), 127);
    }

    #[test]
    fn two_by_two_example() {
        let map = ImportanceMap::new(2, 2, vec![0.0, 5.0, 10.0, 20.0]).unwrap();
        let canvas = render(&black_frame(2, 2), &map, &OverlayStyle::default());

        assert_eq!(canvas.dimensions(), (32, 32));

        let tint = |red: u8| Rgb([blend_channel(0, red, OVERLAY_ALPHA), 0, 0]);
        assert_eq!(block_interior(&canvas, 0, 0), tint(0));
        assert_eq!(block_interior(&canvas, 0, 1), tint(127));
        assert_eq!(block_interior(&canvas, 1, 0), tint(255));
        assert_eq!(block_interior(&canvas, 1, 1), tint(255));
        assert_eq!(block_interior(&canvas, 1, 1), Rgb([128, 0, 0]));
        assert_eq!(block_interior(&canvas, 0, 1), Rgb([64, 0, 0]));
    }

    #[test]
    fn overlay_tints_grid_lines() {
        let map = ImportanceMap::new(1, 1, vec![10.0]).unwrap();
        let canvas = render(&black_frame(1, 1), &map, &OverlayStyle::default());
        // The grid line at x=0 lies inside block (0, 0) and is blended over.
        assert_eq!(*canvas.get_pixel(0, 5), Rgb([128, 0, 0]));
    }

    #[test]
    fn zero_ceiling_draws_grid_only() {
        let white = FrameImage::from_rgb(RgbImage::from_pixel(8, 8, Rgb([255, 255, 255])));
        let map = ImportanceMap::new(2, 2, vec![0.0, 5.0, 10.0, 20.0]).unwrap();

        for ceiling in [0.0, -1.0, f32::NAN] {
            let style = OverlayStyle {
                scale: ScoreScale::Fixed(ceiling),
                ..OverlayStyle::default()
            };
            let canvas = render(&white, &map, &style);

            for row in 0..2 {
                for col in 0..2 {
                    assert_eq!(block_interior(&canvas, row, col), Rgb([255, 255, 255]));
                }
            }
            for i in 0..32 {
                assert_eq!(*canvas.get_pixel(0, i), GRID_COLOR);
                assert_eq!(*canvas.get_pixel(S, i), GRID_COLOR);
                assert_eq!(*canvas.get_pixel(i, S), GRID_COLOR);
            }
            assert_eq!(*canvas.get_pixel(S + 1, S + 1), Rgb([255, 255, 255]));
        }
    }

    #[test]
    fn relative_scale_uses_map_maximum() {
        let map = ImportanceMap::new(1, 2, vec![2.0, 4.0]).unwrap();
        let style = OverlayStyle {
            scale: ScoreScale::Relative,
            ..OverlayStyle::default()
        };
        assert_eq!(style.scale.ceiling(&map), 4.0);

        let canvas = render(&black_frame(2, 1), &map, &style);
        assert_eq!(block_interior(&canvas, 0, 1), Rgb([128, 0, 0]));
        assert_eq!(block_interior(&canvas, 0, 0), Rgb([blend_channel(0, 127, OVERLAY_ALPHA), 0, 0]));
    }

    #[test]
    fn relative_scale_on_all_zero_map_hits_zero_guard() {
        let map = ImportanceMap::new(1, 1, vec![0.0]).unwrap();
        let white = FrameImage::from_rgb(RgbImage::from_pixel(4, 4, Rgb([255, 255, 255])));
        let style = OverlayStyle {
            scale: ScoreScale::Relative,
            ..OverlayStyle::default()
        };
        let canvas = render(&white, &map, &style);
        assert_eq!(block_interior(&canvas, 0, 0), Rgb([255, 255, 255]));
    }

    #[test]
    fn every_block_fits_on_canvas() {
        // 5x3 reference pixels give a 20x12 canvas; a 1x2 grid of 16px blocks overhangs it.
        let frame = FrameImage::from_rgb(RgbImage::new(5, 3));
        let map = ImportanceMap::new(1, 2, vec![10.0, 10.0]).unwrap();
        let canvas = render(&frame, &map, &OverlayStyle::default());

        assert!(canvas.width() >= 2 * S);
        assert!(canvas.height() >= S);
        assert_eq!(*canvas.get_pixel(2 * S - 1, S - 1), Rgb([128, 0, 0]));
    }

    #[test]
    fn mismatched_grid_is_an_error() {
        let map = ImportanceMap::new(3, 3, vec![1.0; 9]).unwrap();
        let err = render_overlay(
            &black_frame(2, 2),
            &map,
            &BlockGeometry::default(),
            FilterType::Nearest,
            &OverlayStyle::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ImportanceError::DimensionMismatch { rows: 3, cols: 3, .. }));
    }

    #[test]
    fn grid_lines_fall_on_block_edges_only() {
        let white = Rgb([255, 255, 255]);
        let mut canvas = RgbImage::from_pixel(33, 20, white);
        draw_grid(&mut canvas, S, GRID_COLOR);

        for y in 0..20 {
            for x in [0, S, 2 * S] {
                assert_eq!(*canvas.get_pixel(x, y), GRID_COLOR, "({x}, {y})");
            }
        }
        for x in 0..33 {
            assert_eq!(*canvas.get_pixel(x, 0), GRID_COLOR);
            assert_eq!(*canvas.get_pixel(x, S), GRID_COLOR);
            assert_eq!(*canvas.get_pixel(x, 19), if x % S == 0 { GRID_COLOR } else { white });
        }
        assert_eq!(*canvas.get_pixel(1, 1), white);
        assert_eq!(*canvas.get_pixel(S - 1, S + 1), white);
        assert_eq!(*canvas.get_pixel(2 * S - 1, 17), white);

        let mut empty = RgbImage::new(0, 0);
        draw_grid(&mut empty, S, GRID_COLOR);
    }

    #[test]
    fn blend_endpoints() {
        assert_eq!(blend_channel(200, 10, 0), 200);
        assert_eq!(blend_channel(200, 10, 255), 10);
        assert_eq!(blend_channel(0, 255, 128), 128);
    }
}
