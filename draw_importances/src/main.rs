use anyhow::{Context, Result, bail};
use block_importance::core_modules::overlay::MAX_DISPLAY_SCORE;
use block_importance::parallel_pipeline::BatchRenderer;
use block_importance::pipeline::{
    DEFAULT_OUTPUT_ROOT, OutputLayout, RenderConfig, RenderJob, WorkMode, render_all,
};
use block_importance::{ImportanceMap, OverlayStyle, ScoreScale};
use chrono::Local;
use clap::{Parser, ValueEnum};
use env_logger::Builder;
use image::imageops::FilterType;
use log::{LevelFilter, debug, error, info, warn};
use std::path::PathBuf;

/// Render an encoder's block importances over their reference frames.
///
/// Run the encoder with lookahead dumping enabled to produce `*-hres.png` and
/// `*-imps.bin` pairs, then either pass one pair with --input or a directory of
/// pairs with --path. Output files are written to <out-dir>/YYYYMMDD_HH/ as
/// `*-imps.png`.
#[derive(Parser, Debug)]
#[command(author, version)]
struct Args {
    /// Reference frame and importance dump to render (single-file mode)
    #[arg(long, num_args = 2, value_names = ["HRES_PNG", "IMPS_BIN"], conflicts_with = "path")]
    input: Option<Vec<PathBuf>>,

    /// Directory holding `*hres.png` / `*imps.bin` pairs (batch mode)
    #[arg(long)]
    path: Option<PathBuf>,

    /// Print verbose progress messages
    #[arg(long)]
    verbose: bool,

    /// Print the parsed importance grids
    #[arg(long)]
    raw: bool,

    /// Root directory for timestamped output folders
    #[arg(long, default_value = DEFAULT_OUTPUT_ROOT)]
    out_dir: PathBuf,

    /// Scale each image by its own highest score instead of the fixed ceiling
    #[arg(long)]
    relative: bool,

    /// Resampling filter used to enlarge the reference frame
    #[arg(long, value_enum, default_value_t = Resample::Nearest)]
    filter: Resample,

    /// Number of images rendered at once; 0 uses every logical CPU
    #[arg(short, long, default_value_t = 1)]
    jobs: usize,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Resample {
    Nearest,
    Triangle,
    CatmullRom,
    Gaussian,
    Lanczos3,
}

impl From<Resample> for FilterType {
    fn from(value: Resample) -> Self {
        match value {
            Resample::Nearest => FilterType::Nearest,
            Resample::Triangle => FilterType::Triangle,
            Resample::CatmullRom => FilterType::CatmullRom,
            Resample::Gaussian => FilterType::Gaussian,
            Resample::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

fn main() -> Result<()> {
    // --- 1. Argument Parsing & Logging ---
    let args = Args::parse();

    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    Builder::new().filter_level(level).parse_default_env().init();

    debug!("Input given: {:?}", args.input);
    debug!("Path given: {:?}", args.path);

    // --- 2. Mode Selection ---
    let input = match args.input.as_deref() {
        Some([frame, dump]) => Some((frame.clone(), dump.clone())),
        Some(other) => bail!("--input takes exactly two paths, got {}", other.len()),
        None => None,
    };
    let mode = WorkMode::select(input, args.path.clone())?;
    match &mode {
        WorkMode::SingleFile { .. } => debug!("MODE 1: single file"),
        WorkMode::BatchDirectory(dir) => debug!("MODE 2: batch directory {}", dir.display()),
    }

    // --- 3. Job Resolution ---
    let stamp = Local::now().format("%Y%m%d_%H").to_string();
    let layout = OutputLayout::new(&args.out_dir, stamp);
    let jobs = mode
        .resolve(&layout)
        .context("Failed to collect input files")?;

    if let WorkMode::BatchDirectory(dir) = &mode {
        debug!("png list: {:?}", jobs.iter().map(|j| &j.frame).collect::<Vec<_>>());
        debug!("bin list: {:?}", jobs.iter().map(|j| &j.dump).collect::<Vec<_>>());
        debug!("Total Count: {}", jobs.len());
        if jobs.is_empty() {
            warn!("No reference/dump pairs found in {}", dir.display());
        }
    }

    if args.raw {
        print_raw(&jobs)?;
    }

    let out_dir = layout.ensure_dir()?;

    // --- 4. Rendering ---
    let config = RenderConfig {
        style: OverlayStyle {
            scale: if args.relative {
                ScoreScale::Relative
            } else {
                ScoreScale::Fixed(MAX_DISPLAY_SCORE)
            },
            ..OverlayStyle::default()
        },
        filter: args.filter.into(),
        ..RenderConfig::default()
    };

    if args.jobs == 1 {
        for summary in render_all(&jobs, &config)? {
            debug!(
                "{} ({}x{} blocks, {}x{} px)",
                summary.output.display(),
                summary.rows,
                summary.cols,
                summary.width,
                summary.height
            );
        }
    } else {
        render_parallel(jobs, config, args.jobs)?;
    }

    // --- 5. Report ---
    let folder = std::env::current_dir()
        .map(|cwd| cwd.join(&out_dir))
        .unwrap_or(out_dir);
    debug!("Folder Path: {}", folder.display());
    info!("Processing done.");
    Ok(())
}

fn print_raw(jobs: &[RenderJob]) -> Result<()> {
    for job in jobs {
        let map = ImportanceMap::from_file(&job.dump)?;
        println!("imps data after processing ({}):", job.dump.display());
        println!("{map}");
    }
    Ok(())
}

fn render_parallel(jobs: Vec<RenderJob>, config: RenderConfig, workers: usize) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start the render runtime")?;

    let renderer = if workers == 0 {
        BatchRenderer::with_available_parallelism(config)
    } else {
        BatchRenderer::new(config, workers)
    };
    debug!("Rendering with {} workers", renderer.workers());

    let total = jobs.len();
    let outcomes = runtime.block_on(renderer.render(jobs));

    let mut failures = 0;
    for (job, result) in outcomes {
        match result {
            Ok(summary) => debug!("{}", summary.output.display()),
            Err(e) => {
                error!("{}: {e}", job.output.display());
                failures += 1;
            }
        }
    }

    if failures > 0 {
        bail!("{failures} of {total} overlays failed");
    }
    Ok(())
}
