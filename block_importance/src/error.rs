// THEORY:
// Every failure the library can surface is one of a handful of kinds, and each
// kind maps to a different reaction in the driver: a corrupt dump, a file that
// cannot be read or written, a grid that does not belong to its frame, or a
// caller that asked for nothing. Keeping them in one enum lets the batch runner
// collect per-job failures without boxing, and lets tests match on the kind
// instead of on message text.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Errors produced while loading, rendering, or scheduling importance overlays.
#[derive(Debug)]
pub enum ImportanceError {
    /// The importance dump is malformed or its size disagrees with its header.
    Format(String),
    /// A file could not be read, written, or listed.
    Io { path: PathBuf, source: io::Error },
    /// A reference frame could not be decoded, or the overlay could not be encoded.
    Image { path: PathBuf, source: image::ImageError },
    /// The block grid does not tile the scaled reference frame.
    DimensionMismatch {
        rows: usize,
        cols: usize,
        width: u32,
        height: u32,
        block_size: u32,
    },
    /// No usable input mode was requested.
    Usage(String),
    /// A batch task panicked or was cancelled before it produced a result.
    Worker(String),
}

pub type Result<T> = std::result::Result<T, ImportanceError>;

impl ImportanceError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn image(path: impl Into<PathBuf>, source: image::ImageError) -> Self {
        Self::Image {
            path: path.into(),
            source,
        }
    }
}

impl fmt::Display for ImportanceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Format(msg) => write!(f, "malformed importance dump: {msg}"),
            Self::Io { path, source } => write!(f, "{}: {source}", path.display()),
            Self::Image { path, source } => write!(f, "{}: {source}", path.display()),
            Self::DimensionMismatch {
                rows,
                cols,
                width,
                height,
                block_size,
            } => write!(
                f,
                "a {rows}x{cols} block grid ({block_size}px blocks) does not tile a {width}x{height} frame"
            ),
            Self::Usage(msg) => f.write_str(msg),
            Self::Worker(msg) => write!(f, "render task failed: {msg}"),
        }
    }
}

impl std::error::Error for ImportanceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Image { source, .. } => Some(source),
            _ => None,
        }
    }
}
