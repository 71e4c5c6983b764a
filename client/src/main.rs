//! ptz-tracker – follow a head with an ESP32-CAM pan/tilt mount.
//!
//! Wires the stream reader, cascade detector and control loop together,
//! then parks until the session ends: `q` in the debug window, Ctrl-C,
//! or a fatal startup error.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use ptz_control::{SessionOptions, TrackerConfig, TrackingSession};
use ptz_detect::CascadeDetector;

#[derive(Parser, Debug)]
#[command(name = "ptz-tracker", about = "Head tracking and recording for ESP32-CAM pan/tilt mounts")]
struct Args {
    /// Camera host or IP; stream on :81/stream, control on /action
    #[arg(long, default_value = "192.168.1.1")]
    host: String,
    /// Override the full MJPEG stream URL
    #[arg(long)]
    stream_url: Option<String>,
    /// Override the full pan/tilt control URL
    #[arg(long)]
    control_url: Option<String>,
    #[arg(long, default_value = "assets/cascades")]
    cascade_dir: PathBuf,
    /// Do not steer the camera; stream (and optionally record) only
    #[arg(long)]
    no_follow: bool,
    /// Record to recordings/recording_<timestamp>.mp4
    #[arg(long)]
    record: bool,
    /// Show the live debug window (q quits, r toggles recording)
    #[arg(long)]
    debug: bool,
    /// Base cooldown between camera moves, seconds
    #[arg(long, default_value_t = 0.12)]
    move_cooldown: f64,
    /// Dead zone around frame center, fraction of the frame dimension
    #[arg(long, default_value_t = 0.1)]
    center_threshold: f64,
    /// The mount pans mirrored relative to the image
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    mirrored_pan: bool,
    #[arg(long, default_value = "recordings")]
    recording_dir: PathBuf,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = TrackerConfig::for_host(&args.host);
    if let Some(url) = args.stream_url {
        config.stream_url = url;
    }
    if let Some(url) = args.control_url {
        config.control_url = url;
    }
    config.move_cooldown = Duration::from_secs_f64(args.move_cooldown);
    config.center_threshold = args.center_threshold;
    config.mirrored_pan = args.mirrored_pan;
    config.recording_dir = args.recording_dir;

    let detector = CascadeDetector::new(
        &args.cascade_dir.join("haarcascade_frontalface_default.xml"),
        &args.cascade_dir.join("haarcascade_profileface.xml"),
    )
    .with_context(|| {
        format!("failed to load cascades from {}", args.cascade_dir.display())
    })?;

    log::info!("stream:  {}", config.stream_url);
    log::info!("control: {}", config.control_url);

    let session = TrackingSession::start(
        config,
        Box::new(detector),
        SessionOptions {
            follow_person: !args.no_follow,
            record: args.record,
            show_debug: args.debug,
        },
    )
    .context("failed to start tracking session")?;

    let token = session.cancel_token();
    ctrlc::set_handler(move || {
        log::info!("interrupt received, stopping");
        token.cancel();
    })
    .context("failed to install Ctrl-C handler")?;

    session.wait();
    Ok(())
}
