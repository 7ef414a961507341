//! lanefind CLI: lane finding over image sequences and camera calibration.

use clap::{Parser, Subcommand};
use lanefind::config::{CalibrationConfig, LaneConfig};
use lanefind::job::run_job;
use lanefind::session::CalibrationSession;
use std::fs;
use std::path::PathBuf;

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "lanefind")]
#[command(about = "Find lane boundaries, curvature and vehicle offset in road images")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process an image file or a directory of frames.
    Process {
        /// Image file or directory of frames (processed in file-name order).
        input: PathBuf,

        /// JSON configuration; defaults are used for missing fields.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Directory for annotated frames and report.json.
        #[arg(long, default_value = "output")]
        output_dir: PathBuf,
    },

    /// Calibrate the camera from chessboard images.
    Calibrate {
        /// Directory of chessboard images.
        #[arg(long)]
        images: PathBuf,

        /// Inner corners as COLSxROWS.
        #[arg(long, default_value = "9x6", value_parser = parse_pattern)]
        pattern: [usize; 2],

        /// Correspondence cache file.
        #[arg(long, default_value = "calibration_cache.json")]
        cache: PathBuf,

        /// Where to write the solved profile (JSON).
        #[arg(long, default_value = "calibration_profile.json")]
        output: PathBuf,
    },

    /// Write the default configuration to a file.
    InitConfig {
        /// Destination path.
        path: PathBuf,
    },
}

fn parse_pattern(s: &str) -> Result<[usize; 2], String> {
    let (cols, rows) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected COLSxROWS, got {s:?}"))?;
    let parse = |v: &str| {
        v.trim()
            .parse::<usize>()
            .map_err(|e| format!("invalid pattern size {v:?}: {e}"))
    };
    let pattern = [parse(cols)?, parse(rows)?];
    if pattern.iter().any(|&n| n < 2) {
        return Err(format!("pattern {s} needs at least 2x2 inner corners"));
    }
    Ok(pattern)
}

fn init_logging(verbose: u8) -> CliResult<()> {
    #[cfg(feature = "tracing")]
    {
        let _ = verbose;
        tracing_log::LogTracer::init()?;
        lanefind::core::init_tracing(false);
    }
    #[cfg(not(feature = "tracing"))]
    lanefind::core::init_with_level(lanefind::core::level_from_verbosity(verbose))?;
    Ok(())
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    match cli.command {
        Commands::Process {
            input,
            config,
            output_dir,
        } => run_process(input, config, output_dir),
        Commands::Calibrate {
            images,
            pattern,
            cache,
            output,
        } => run_calibrate(images, pattern, cache, output),
        Commands::InitConfig { path } => {
            LaneConfig::default().write_json(&path)?;
            println!("wrote default configuration to {}", path.display());
            Ok(())
        }
    }
}

fn run_process(input: PathBuf, config: Option<PathBuf>, output_dir: PathBuf) -> CliResult<()> {
    let config = match config {
        Some(path) => LaneConfig::load_json(&path)?,
        None => LaneConfig::default(),
    };
    let report = run_job(&input, &output_dir, &config)?;
    println!(
        "processed {} frames ({} skipped), results in {}",
        report.processed,
        report.skipped,
        output_dir.display()
    );
    if let Some(last) = report.frames.last() {
        match (last.curvature_m, last.offset_m) {
            (Some(c), Some(o)) => println!("last frame: curvature {c:.2} m, offset {o:.2} m"),
            (None, Some(o)) => println!("last frame: straight lane, offset {o:.2} m"),
            _ => println!("last frame: no lane found"),
        }
    }
    Ok(())
}

fn run_calibrate(
    images: PathBuf,
    pattern: [usize; 2],
    cache: PathBuf,
    output: PathBuf,
) -> CliResult<()> {
    let config = CalibrationConfig {
        images_dir: Some(images),
        pattern,
        cache_path: cache,
        ..CalibrationConfig::default()
    };
    let session = CalibrationSession::open(&config)?;
    let (w, h) = session.native_size()?;
    let profile = session.profile(w, h)?;
    fs::write(&output, serde_json::to_string_pretty(&profile)?)?;
    println!(
        "calibrated {w}x{h} from {} views: fx {:.1}, fy {:.1}, cx {:.1}, cy {:.1}, rms {:.3} px",
        profile.views,
        profile.fx(),
        profile.fy(),
        profile.cx(),
        profile.cy(),
        profile.rms_reprojection_px
    );
    println!("profile written to {}", output.display());
    Ok(())
}
