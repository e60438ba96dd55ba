// THEORY:
// The `ImportanceMap` is the in-memory form of one lookahead dump: a dense,
// row-major grid of per-block scores. It is the only thing in the crate that
// touches the raw dump bytes.
//
// Key architectural principles:
// 1.  **Untrusted Input**: The header is two signed 64-bit counts with no magic
//     number and no version. A corrupt or foreign file looks exactly like a
//     valid one until the sizes are checked, so every size relationship is
//     verified before a single score is allocated.
// 2.  **Reject, Never Guess**: A payload that is too short, too long, or not a
//     whole number of floats is an error. Nothing is truncated or padded.
// 3.  **Immutable Data Container**: Once parsed, the map never changes. The
//     renderer and the console dump only borrow it.

use crate::error::{ImportanceError, Result};
use std::fmt;
use std::path::Path;

/// Size of the `rows`/`cols` header in bytes.
pub const HEADER_LEN: usize = 16;
/// Size of one serialized score in bytes.
pub const SCORE_LEN: usize = 4;
/// Upper bound on `rows * cols` accepted from a dump header.
///
/// An 8K frame split into 8x8 blocks has roughly half a million blocks, so this
/// leaves ample headroom while keeping a corrupt header from requesting gigabytes.
pub const MAX_GRID_BLOCKS: u64 = 1 << 24;

/// A `rows x cols` grid of block-importance scores.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportanceMap {
    rows: usize,
    cols: usize,
    /// Row-major scores; `scores.len() == rows * cols`.
    scores: Vec<f32>,
}

fn read_i64_le(bytes: &[u8]) -> i64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[..8]);
    i64::from_le_bytes(buf)
}

impl ImportanceMap {
    /// Builds a map from an in-memory score grid.
    pub fn new(rows: usize, cols: usize, scores: Vec<f32>) -> Result<Self> {
        let expected = rows.checked_mul(cols).ok_or_else(|| {
            ImportanceError::Format(format!("grid of {rows}x{cols} blocks overflows"))
        })?;
        if scores.len() != expected {
            return Err(ImportanceError::Format(format!(
                "{rows}x{cols} grid needs {expected} scores, got {}",
                scores.len()
            )));
        }
        Ok(Self { rows, cols, scores })
    }

    /// Parses a dump: `i64 rows | i64 cols | rows*cols x f32`, all little-endian.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(ImportanceError::Format(format!(
                "header truncated: {} bytes, need {HEADER_LEN}",
                bytes.len()
            )));
        }

        let (header, payload) = bytes.split_at(HEADER_LEN);
        let rows = read_i64_le(&header[0..8]);
        let cols = read_i64_le(&header[8..16]);

        if rows < 0 || cols < 0 {
            return Err(ImportanceError::Format(format!(
                "negative grid dimensions {rows}x{cols}"
            )));
        }
        if rows as u64 > MAX_GRID_BLOCKS || cols as u64 > MAX_GRID_BLOCKS {
            return Err(ImportanceError::Format(format!(
                "implausible grid dimension {rows}x{cols} (limit {MAX_GRID_BLOCKS} per side)"
            )));
        }
        if payload.len() % SCORE_LEN != 0 {
            return Err(ImportanceError::Format(format!(
                "payload of {} bytes is not a whole number of f32 scores",
                payload.len()
            )));
        }

        let blocks = (rows as u64)
            .checked_mul(cols as u64)
            .filter(|&blocks| blocks <= MAX_GRID_BLOCKS)
            .ok_or_else(|| {
                ImportanceError::Format(format!(
                    "implausible grid of {rows}x{cols} blocks (limit {MAX_GRID_BLOCKS})"
                ))
            })?;

        let expected = blocks as usize * SCORE_LEN;
        if payload.len() != expected {
            return Err(ImportanceError::Format(format!(
                "header claims {rows}x{cols} blocks ({expected} bytes) but payload has {} bytes",
                payload.len()
            )));
        }

        let scores = payload
            .chunks_exact(SCORE_LEN)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();

        log::debug!("parsed importance map: {rows}x{cols} blocks");

        Ok(Self {
            rows: rows as usize,
            cols: cols as usize,
            scores,
        })
    }

    /// Reads and parses a dump file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| ImportanceError::io(path, e))?;
        Self::parse(&bytes).map_err(|e| match e {
            ImportanceError::Format(msg) => {
                ImportanceError::Format(format!("{}: {msg}", path.display()))
            }
            other => other,
        })
    }

    /// Serializes the map back into the dump format.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.scores.len() * SCORE_LEN);
        out.extend_from_slice(&(self.rows as i64).to_le_bytes());
        out.extend_from_slice(&(self.cols as i64).to_le_bytes());
        for score in &self.scores {
            out.extend_from_slice(&score.to_le_bytes());
        }
        out
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn scores(&self) -> &[f32] {
        &self.scores
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        Some(self.scores[row * self.cols + col])
    }

    /// The scores of one block row, or an empty slice if `row` is out of range.
    pub fn row(&self, row: usize) -> &[f32] {
        if row >= self.rows {
            return &[];
        }
        let start = row * self.cols;
        &self.scores[start..start + self.cols]
    }

    /// Iterates `(row, col, score)` in row-major order.
    pub fn blocks(&self) -> impl Iterator<Item = (usize, usize, f32)> + '_ {
        let cols = self.cols.max(1);
        self.scores
            .iter()
            .enumerate()
            .map(move |(i, &score)| (i / cols, i % cols, score))
    }

    /// The largest finite score, if there is one.
    pub fn max_score(&self) -> Option<f32> {
        self.scores
            .iter()
            .copied()
            .filter(|s| s.is_finite())
            .reduce(f32::max)
    }
}

impl fmt::Display for ImportanceMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "[] ({}x{})", self.rows, self.cols);
        }
        for r in 0..self.rows {
            f.write_str(if r == 0 { "[[" } else { " [" })?;
            for (c, score) in self.row(r).iter().enumerate() {
                if c > 0 {
                    f.write_str(" ")?;
                }
                write!(f, "{score:8.3}")?;
            }
            f.write_str(if r + 1 == self.rows { "]]" } else { "]\n" })?;
        }
        Ok(())
    }
}
