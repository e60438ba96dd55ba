// THEORY:
// The `pipeline` module is the top-level API for turning dumps into overlay
// images. It sits between the driver, which knows about command lines, clocks
// and consoles, and the core modules, which know only about bytes and pixels.
//
// Key architectural principles:
// 1.  **Resolve Before Rendering**: Whether the user named one pair of files or a
//     whole directory, the request is turned into a flat list of `RenderJob`s
//     up front. Nothing downstream ever asks which mode it is running in.
// 2.  **Explicit Output Location**: The timestamped output directory is a value,
//     `OutputLayout`, computed once by the caller and passed in. No job reads
//     the clock.
// 3.  **One Job, One File**: A job reads its own two inputs and writes its own
//     output. Jobs share nothing, which is what lets `parallel_pipeline` run
//     them side by side.

use crate::core_modules::block_geometry::BlockGeometry;
use crate::core_modules::frame::FrameImage;
use crate::core_modules::importance_map::ImportanceMap;
use crate::core_modules::overlay::{self, OverlayStyle};
use crate::core_modules::utils::image_helper;
use crate::error::{ImportanceError, Result};
use image::imageops::FilterType;
use std::path::{Path, PathBuf};

/// File-name ending of the half-resolution reference frame.
pub const REFERENCE_SUFFIX: &str = "hres.png";
/// File-name ending of the matching importance dump.
pub const DUMP_SUFFIX: &str = "imps.bin";
pub const DEFAULT_OUTPUT_ROOT: &str = "out";

/// Everything that controls how a single overlay is drawn.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub geometry: BlockGeometry,
    pub filter: FilterType,
    pub style: OverlayStyle,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            geometry: BlockGeometry::default(),
            filter: FilterType::Nearest,
            style: OverlayStyle::default(),
        }
    }
}

/// Where overlay images are written: `<root>/<stamp>/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    root: PathBuf,
    stamp: String,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>, stamp: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            stamp: stamp.into(),
        }
    }

    pub fn dir(&self) -> PathBuf {
        self.root.join(&self.stamp)
    }

    /// Output path for a dump: its file stem with a `.png` extension.
    pub fn output_path_for(&self, dump: &Path) -> Result<PathBuf> {
        let stem = dump.file_stem().ok_or_else(|| {
            ImportanceError::Usage(format!("{} has no file name", dump.display()))
        })?;
        let mut name = stem.to_os_string();
        name.push(".png");
        Ok(self.dir().join(name))
    }

    /// Creates the output directory (and its parents) if needed.
    pub fn ensure_dir(&self) -> Result<PathBuf> {
        let dir = self.dir();
        std::fs::create_dir_all(&dir).map_err(|e| ImportanceError::io(&dir, e))?;
        Ok(dir)
    }
}

/// One unit of work: a reference frame, its dump, and where the overlay goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderJob {
    pub frame: PathBuf,
    pub dump: PathBuf,
    pub output: PathBuf,
}

/// What was produced by a finished job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderSummary {
    pub output: PathBuf,
    pub rows: usize,
    pub cols: usize,
    pub width: u32,
    pub height: u32,
}

/// The two ways a run can be requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkMode {
    SingleFile { frame: PathBuf, dump: PathBuf },
    BatchDirectory(PathBuf),
}

impl WorkMode {
    /// Picks a mode from optional driver inputs. Supplying neither is a usage error.
    pub fn select(input: Option<(PathBuf, PathBuf)>, path: Option<PathBuf>) -> Result<Self> {
        match (input, path) {
            (Some((frame, dump)), _) => Ok(Self::SingleFile { frame, dump }),
            (None, Some(dir)) => Ok(Self::BatchDirectory(dir)),
            (None, None) => Err(ImportanceError::Usage(
                "Please use either --input or --path, for more information use --help.".into(),
            )),
        }
    }

    /// Expands the mode into concrete jobs writing into `layout`.
    pub fn resolve(&self, layout: &OutputLayout) -> Result<Vec<RenderJob>> {
        let pairs = match self {
            Self::SingleFile { frame, dump } => vec![(frame.clone(), dump.clone())],
            Self::BatchDirectory(dir) => discover_pairs(dir)?,
        };

        pairs
            .into_iter()
            .map(|(frame, dump)| -> Result<RenderJob> {
                let output = layout.output_path_for(&dump)?;
                Ok(RenderJob {
                    frame,
                    dump,
                    output,
                })
            })
            .collect()
    }
}

/// Finds every `*hres.png` in `dir` that has a sibling `*imps.bin` with the same prefix.
///
/// Reference images without a dump are skipped with a warning. The result is
/// sorted by path.
pub fn discover_pairs(dir: &Path) -> Result<Vec<(PathBuf, PathBuf)>> {
    let entries = std::fs::read_dir(dir).map_err(|e| ImportanceError::io(dir, e))?;

    let mut pairs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ImportanceError::io(dir, e))?;
        let frame = entry.path();
        let Some(name) = frame.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(prefix) = name.strip_suffix(REFERENCE_SUFFIX) else {
            continue;
        };
        if !frame.is_file() {
            continue;
        }

        let dump = dir.join(format!("{prefix}{DUMP_SUFFIX}"));
        if dump.is_file() {
            pairs.push((frame, dump));
        } else {
            log::warn!(
                "skipping {}: no matching {}",
                frame.display(),
                dump.display()
            );
        }
    }

    pairs.sort();
    Ok(pairs)
}

/// Draws the overlay for an already-loaded frame and map, and writes it to `output`.
pub fn render_to_file(
    frame: &FrameImage,
    map: &ImportanceMap,
    output: &Path,
    config: &RenderConfig,
) -> Result<RenderSummary> {
    let canvas =
        overlay::render_overlay(frame, map, &config.geometry, config.filter, &config.style)?;
    image_helper::save_png(output, &canvas)?;

    Ok(RenderSummary {
        output: output.to_path_buf(),
        rows: map.rows(),
        cols: map.cols(),
        width: canvas.width(),
        height: canvas.height(),
    })
}

/// Loads both inputs of `job`, renders, and writes the overlay.
pub fn render_job(job: &RenderJob, config: &RenderConfig) -> Result<RenderSummary> {
    let map = ImportanceMap::from_file(&job.dump)?;
    let frame = FrameImage::open(&job.frame)?;
    log::debug!(
        "{}: {}x{} blocks over a {}x{} frame",
        job.dump.display(),
        map.rows(),
        map.cols(),
        frame.width(),
        frame.height()
    );
    render_to_file(&frame, &map, &job.output, config)
}

/// Runs jobs one after another, stopping at the first failure.
pub fn render_all(jobs: &[RenderJob], config: &RenderConfig) -> Result<Vec<RenderSummary>> {
    jobs.iter().map(|job| render_job(job, config)).collect()
}
