//! vtshot CLI - Framebuffer screenshots and animated GIF captures.
//!
//! ## Usage
//!
//! ```bash
//! vtshot shot -o screen.png                      # Single screenshot
//! vtshot record -o screen.gif --fps 10 --frames 50
//! vtshot record -o session.vtcap --raw           # Lossless recording
//! vtshot --mmap shot -o screen.png               # Read through a mapping (mmap feature)
//! vtshot convert session.vtcap -o session.gif    # Encode a recording later
//! vtshot example-config > vtshot.json
//! ```

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use log::{LevelFilter, error, info};

use vtshot::{
    animation::{CapturePlayer, CaptureRecorder},
    capture::{CaptureError, Framebuffer, ReadMode, capture_paced, capture_sequence},
    encode::{
        AnimationTiming, EncodeError, PaletteQuantizer, StillError, StillFormat,
        write_gif_sequence, write_still,
    },
    schema::{CaptureConfig, ConfigError},
};

/// Framebuffer screenshots and delta-encoded animated GIF captures
#[derive(Parser, Debug)]
#[command(name = "vtshot")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log progress
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log every frame
    #[arg(short = 'D', long, global = true)]
    debug: bool,

    /// Read frames through a memory mapping of the device
    #[arg(short, long, global = true)]
    mmap: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Capture a single screenshot
    Shot(ShotArgs),
    /// Capture an animated GIF (or a raw recording with --raw)
    Record(RecordArgs),
    /// Encode a raw recording as an animated GIF
    Convert(ConvertArgs),
    /// Print the default configuration as JSON
    ExampleConfig,
}

#[derive(Args, Debug)]
struct ShotArgs {
    /// Output file
    #[arg(short, long)]
    output: PathBuf,

    /// Framebuffer device
    #[arg(short, long)]
    device: Option<PathBuf>,

    /// Image format (png, ppm, gif)
    #[arg(long, value_parser = parse_format)]
    format: Option<StillFormat>,
}

#[derive(Args, Debug)]
struct RecordArgs {
    /// Output file
    #[arg(short, long)]
    output: PathBuf,

    /// Framebuffer device
    #[arg(short, long)]
    device: Option<PathBuf>,

    /// Capture rate in frames per second
    #[arg(long)]
    fps: Option<f64>,

    /// Number of frames to capture
    #[arg(long)]
    frames: Option<usize>,

    /// Write a lossless .vtcap recording instead of a GIF
    #[arg(long)]
    raw: bool,
}

#[derive(Args, Debug)]
struct ConvertArgs {
    /// Recording to convert
    input: PathBuf,

    /// Output GIF
    #[arg(short, long)]
    output: PathBuf,

    /// Playback rate (defaults to the recorded rate)
    #[arg(long)]
    fps: Option<f64>,
}

#[derive(Debug, thiserror::Error)]
enum AppError {
    #[error("Unable to read config '{}': {source}", path.display())]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Unable to parse config '{}': {source}", path.display())]
    ParseConfig {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error(transparent)]
    Still(#[from] StillError),
    #[error("Recording '{}' failed: {source}", path.display())]
    Recording {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Unable to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),
}

fn main() -> ExitCode {
    #[cfg(feature = "dhat-heap")]
    let _profiler = dhat::Profiler::new_heap();

    let cli = Cli::parse();
    init_logging(&cli);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(cli: &Cli) {
    let level = if cli.quiet {
        Some(LevelFilter::Error)
    } else if cli.debug {
        Some(LevelFilter::Debug)
    } else if cli.verbose {
        Some(LevelFilter::Info)
    } else {
        None
    };

    let mut builder = env_logger::Builder::new();
    match level {
        Some(level) => {
            builder.filter_level(level);
        }
        None if std::env::var_os("RUST_LOG").is_some() => {
            builder.parse_default_env();
        }
        None => {
            builder.filter_level(LevelFilter::Warn);
        }
    }
    builder.init();
}

fn run(cli: Cli) -> Result<(), AppError> {
    let mut config = load_config(cli.config.as_deref())?;
    if cli.mmap {
        config.read_mode = ReadMode::Mmap;
    }

    match cli.command {
        Commands::Shot(args) => run_shot(config, args),
        Commands::Record(args) => run_record(config, args),
        Commands::Convert(args) => run_convert(args),
        Commands::ExampleConfig => {
            println!("{}", serde_json::to_string_pretty(&CaptureConfig::default())?);
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<CaptureConfig, AppError> {
    let Some(path) = path else {
        return Ok(CaptureConfig::default());
    };
    let text = fs::read_to_string(path).map_err(|source| AppError::ReadConfig {
        path: path.to_path_buf(),
        source,
    })?;
    let config = serde_json::from_str(&text).map_err(|source| AppError::ParseConfig {
        path: path.to_path_buf(),
        source,
    })?;
    info!("Loaded config from '{}'", path.display());
    Ok(config)
}

fn run_shot(mut config: CaptureConfig, args: ShotArgs) -> Result<(), AppError> {
    if let Some(device) = args.device {
        config.device = device;
    }
    if let Some(format) = args.format {
        config.format = format;
    }
    config.validate()?;

    let mut fb = Framebuffer::open_with_mode(&config.device, config.read_mode)?;
    let rgb = fb.capture()?;
    write_still(&args.output, config.format, fb.dimensions(), &rgb)?;
    Ok(())
}

fn run_record(mut config: CaptureConfig, args: RecordArgs) -> Result<(), AppError> {
    if let Some(device) = args.device {
        config.device = device;
    }
    if let Some(fps) = args.fps {
        config.fps = fps;
    }
    if let Some(frames) = args.frames {
        config.frames = frames;
    }
    config.validate()?;

    let mut fb = Framebuffer::open_with_mode(&config.device, config.read_mode)?;
    if args.raw {
        return record_raw(&mut fb, &config, &args.output);
    }

    let timing = AnimationTiming::new(config.fps)?;
    let mut sequence = capture_sequence(&mut fb, config.frames, config.fps)?;
    write_gif_sequence(&args.output, &mut sequence, &PaletteQuantizer::default(), timing)?;
    Ok(())
}

fn record_raw(
    fb: &mut Framebuffer,
    config: &CaptureConfig,
    output: &Path,
) -> Result<(), AppError> {
    let recording_error = |source: io::Error| AppError::Recording {
        path: output.to_path_buf(),
        source,
    };
    let mut recorder =
        CaptureRecorder::new(output, fb.dimensions(), config.fps as f32, config.compression)
            .map_err(recording_error)?;

    capture_paced(fb, config.frames, config.fps, |rgb| {
        recorder.record_frame(rgb).map_err(recording_error)
    })?;

    let stats = recorder.finalize().map_err(recording_error)?;
    info!("Wrote {} to '{}'", stats, output.display());
    Ok(())
}

fn run_convert(args: ConvertArgs) -> Result<(), AppError> {
    let mut player = CapturePlayer::open(&args.input).map_err(|source| AppError::Recording {
        path: args.input.clone(),
        source,
    })?;
    let fps = args.fps.unwrap_or_else(|| f64::from(player.fps()));
    info!(
        "Converting {} frames from '{}' at {} fps",
        player.frame_count(),
        args.input.display(),
        fps
    );

    let timing = AnimationTiming::new(fps)?;
    write_gif_sequence(&args.output, &mut player, &PaletteQuantizer::default(), timing)?;
    Ok(())
}

fn parse_format(s: &str) -> Result<StillFormat, String> {
    match s.to_ascii_lowercase().as_str() {
        "png" => Ok(StillFormat::Png),
        "ppm" => Ok(StillFormat::Ppm),
        "gif" => Ok(StillFormat::Gif),
        other => Err(format!("unknown format '{other}' (expected png, ppm or gif)")),
    }
}
