// THEORY:
// Importance is computed by the encoder on 8x8 blocks of the full-resolution
// frame, but the reference image it dumps alongside is half resolution. On the
// half-resolution image a block is therefore 4x4 pixels, which is too small to
// read, so the image is scaled up by a fixed multiplier before drawing. This
// module owns that arithmetic so the renderer only ever asks "where is block
// (row, col)?" and "does this grid belong to this canvas?".

use crate::error::{ImportanceError, Result};

/// Edge length, in full-resolution pixels, of one importance block.
pub const NATIVE_BLOCK_SIZE: u32 = 8;
/// Factor applied to the half-resolution reference frame before drawing.
pub const FRAME_SIZE_MULTIPLIER: u32 = 4;

/// A block's pixel rectangle on the scaled canvas, half-open on the far edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRect {
    pub x: u32,
    pub y: u32,
    pub size: u32,
}

/// Maps block indices to pixels on the scaled reference frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockGeometry {
    multiplier: u32,
    block_pixel_size: u32,
}

impl Default for BlockGeometry {
    fn default() -> Self {
        Self::new(NATIVE_BLOCK_SIZE, FRAME_SIZE_MULTIPLIER)
    }
}

impl BlockGeometry {
    pub fn new(native_block_size: u32, multiplier: u32) -> Self {
        let multiplier = multiplier.max(1);
        Self {
            multiplier,
            block_pixel_size: ((native_block_size / 2) * multiplier).max(1),
        }
    }

    pub fn multiplier(&self) -> u32 {
        self.multiplier
    }

    pub fn block_pixel_size(&self) -> u32 {
        self.block_pixel_size
    }

    pub fn block_rect(&self, row: usize, col: usize) -> BlockRect {
        BlockRect {
            x: col as u32 * self.block_pixel_size,
            y: row as u32 * self.block_pixel_size,
            size: self.block_pixel_size,
        }
    }

    /// Pixel extent `(width, height)` covered by a `rows x cols` grid.
    pub fn grid_extent(&self, rows: usize, cols: usize) -> (u64, u64) {
        let s = self.block_pixel_size as u64;
        (cols as u64 * s, rows as u64 * s)
    }

    /// Checks that a `rows x cols` grid belongs to a `width x height` canvas and
    /// returns the canvas size needed to hold every block.
    ///
    /// Encoders pad frames up to whole blocks, so the grid may overhang the
    /// canvas by part of a block; it may not be short of it or overhang by a
    /// whole block or more.
    pub fn fit_canvas(
        &self,
        rows: usize,
        cols: usize,
        width: u32,
        height: u32,
    ) -> Result<(u32, u32)> {
        let s = self.block_pixel_size;
        let mismatch = || ImportanceError::DimensionMismatch {
            rows,
            cols,
            width,
            height,
            block_size: s,
        };

        if width.div_ceil(s) as usize != cols || height.div_ceil(s) as usize != rows {
            return Err(mismatch());
        }

        let (grid_w, grid_h) = self.grid_extent(rows, cols);
        let grid_w = u32::try_from(grid_w).map_err(|_| mismatch())?;
        let grid_h = u32::try_from(grid_h).map_err(|_| mismatch())?;
        Ok((width.max(grid_w), height.max(grid_h)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_block_is_sixteen_pixels() {
        let geometry = BlockGeometry::default();
        assert_eq!(geometry.block_pixel_size(), 16);
        assert_eq!(geometry.multiplier(), 4);
    }

    #[test]
    fn degenerate_sizes_stay_positive() {
        assert_eq!(BlockGeometry::new(1, 4).block_pixel_size(), 1);
        assert_eq!(BlockGeometry::new(8, 0).block_pixel_size(), 4);
    }

    #[test]
    fn block_rect_is_row_col_scaled() {
        let geometry = BlockGeometry::default();
        assert_eq!(
            geometry.block_rect(2, 3),
            BlockRect {
                x: 48,
                y: 32,
                size: 16
            }
        );
    }

    #[test]
    fn exact_tiling_keeps_canvas() {
        let geometry = BlockGeometry::default();
        assert_eq!(geometry.fit_canvas(135, 240, 3840, 2160).unwrap(), (3840, 2160));
    }

    #[test]
    fn partial_overhang_grows_canvas_to_fit_every_block() {
        let geometry = BlockGeometry::default();
        // 854x480 source: 427x240 reference, 1708x960 canvas, 107x60 padded blocks.
        let (w, h) = geometry.fit_canvas(60, 107, 1708, 960).unwrap();
        let (grid_w, grid_h) = geometry.grid_extent(60, 107);
        assert_eq!((w as u64, h as u64), (grid_w, grid_h));
        assert!(w as u64 >= 107 * 16 && h as u64 >= 60 * 16);
    }

    #[test]
    fn mismatched_grids_are_rejected() {
        let geometry = BlockGeometry::default();
        for (rows, cols) in [(2, 3), (3, 2), (1, 2), (0, 0)] {
            let err = geometry.fit_canvas(rows, cols, 32, 32).unwrap_err();
            assert!(matches!(err, ImportanceError::DimensionMismatch { .. }));
        }
    }
}
