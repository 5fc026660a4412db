//! road-damage - detect potholes and cracks in images, videos and a live camera
//!
//! Annotated output goes to the output directory (`--out`):
//! - image mode: `original.png` and `annotated.png`
//! - video and webcam: `latest.jpg`, rewritten per frame, plus
//!   `frames/frame_NNNNNN.jpg` with `--keep-frames`
//!
//! Ctrl-C stops a running video or camera at the next frame boundary.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use road_damage_detect::ui::{Ui, UiMode};
use road_damage_detect::{
    App, AppConfig, Confidence, DirectorySink, Inputs, Mode, Parameters, RunReport, Upload,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// JSON config file (overrides ROAD_DAMAGE_CONFIG).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Model weights (ONNX), or stub:// for the built-in stub detector.
    #[arg(long, global = true)]
    model: Option<PathBuf>,
    /// Confidence threshold between 0 and 1.
    #[arg(long, global = true)]
    confidence: Option<f32>,
    /// Output directory for annotated frames.
    #[arg(long, global = true)]
    out: Option<PathBuf>,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, global = true, default_value = "auto", value_name = "MODE")]
    ui: UiMode,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze a jpg/png image.
    Image {
        path: PathBuf,
        /// Decode and save the original only, without running the detector.
        #[arg(long)]
        preview: bool,
    },
    /// Process every frame of a gif video (mp4/avi/mov too when built with FFmpeg).
    Video {
        path: PathBuf,
        /// Keep every annotated frame, not only the latest.
        #[arg(long)]
        keep_frames: bool,
    },
    /// Stream from a camera until Ctrl-C.
    Webcam {
        /// Capture device (default /dev/video0), or stub:// for synthetic frames.
        #[arg(long)]
        device: Option<String>,
        #[arg(long)]
        keep_frames: bool,
    },
}

fn main() -> Result<ExitCode> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = load_config(&args)?;

    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = Ui::new(args.ui, is_tty, !stdout_is_tty);
    let mut sink = DirectorySink::new(&config.output, ui)?;

    let mode = match &args.command {
        Command::Image { .. } => Mode::Image,
        Command::Video { .. } => Mode::Video,
        Command::Webcam { .. } => Mode::Webcam,
    };
    log::info!(
        "road-damage: {} (confidence {}, output {})",
        mode.title(),
        config.confidence,
        config.output.dir.display()
    );

    let mut app = App::load(&config, &mut sink);
    let params = Parameters::new(config.confidence, mode);
    let mut inputs = Inputs::new(config.camera.clone());

    match &args.command {
        Command::Image { path, preview } => {
            inputs.image = Some(Upload::from_path(path)?);
            inputs.analyze = !preview;
        }
        Command::Video { path, .. } => {
            inputs.video = Some(Upload::from_path(path)?);
        }
        Command::Webcam { .. } => {
            params.camera_on.set(true);
        }
    }

    // Image runs keep the default Ctrl-C behaviour.
    if mode != Mode::Image {
        let camera_on = params.camera_on.clone();
        let stop_video = params.stop_video.clone();
        ctrlc::set_handler(move || {
            camera_on.set(false);
            stop_video.set(true);
        })
        .context("install Ctrl-C handler")?;
    }

    match app.run(&params, &mut inputs, &mut sink) {
        Ok(RunReport::Inert) => Ok(ExitCode::FAILURE),
        Ok(report) => {
            log::debug!("road-damage: {:?}", report);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            // Already shown to the user by the session.
            log::debug!("road-damage: run failed: {}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = match &args.config {
        Some(path) => AppConfig::load_from(Some(path))?,
        None => AppConfig::load()?,
    };

    if let Some(model) = &args.model {
        config.model.path = model.clone();
    }
    if let Some(confidence) = args.confidence {
        config.confidence = Confidence::new(confidence)?;
    }
    if let Some(out) = &args.out {
        config.output.dir = out.clone();
    }
    match &args.command {
        Command::Video { keep_frames, .. } => config.output.keep_frames |= keep_frames,
        Command::Webcam {
            device,
            keep_frames,
        } => {
            if let Some(device) = device {
                config.camera.device = device.clone();
            }
            config.output.keep_frames |= keep_frames;
        }
        Command::Image { .. } => {}
    }
    Ok(config)
}
