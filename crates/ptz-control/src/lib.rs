// ptz-control/src/lib.rs
// ============================================================
// ptz-control  –  Tracking control loop for the PTZ tracker
// Ties the stream reader and head detector to the camera's
// pan/tilt endpoint: smooth the detected position, decide a
// steering direction, rate-limit the moves, optionally record
// and show a debug view.
// ------------------------------------------------------------
// Public API
//   * TrackerConfig          – all loop tunables, serde-friendly
//   * TrackingSession        – start/stop the loop on its own thread
//   * SessionCommand         – Stop / ToggleRecording over a channel
//   * MoveGate / steer / PositionSmoother – pure pieces, unit-testable
// ============================================================

//! PTZ tracker – control layer
//!
//! One iteration of the loop: check cancellation, drain the command
//! channel, reconnect the stream if it went stale, grab the latest frame,
//! feed the recorder, run detection, smooth, steer, actuate, draw.  Every
//! fallible step inside the loop degrades to a log line; only startup
//! errors abort the session.  Cleanup (finalize the recording, stop the
//! reader, close the window) runs on every exit path.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod actuator;
pub mod recorder;
pub mod session;
pub mod smoother;
pub mod steering;
pub mod target;
pub mod view;

pub use actuator::{CameraActuator, Direction, MoveGate};
pub use session::{CancelToken, SessionCommand, SessionOptions, SessionStatus, TrackingSession};
pub use smoother::PositionSmoother;
pub use steering::{steer, SteeringParams};
pub use target::TargetState;

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("stream error: {0}")]
    Stream(#[from] ptz_stream::StreamError),
    #[error("detector error: {0}")]
    Detect(#[from] ptz_detect::DetectError),
    #[error("OpenCV error: {0}")]
    Cv(#[from] opencv::Error),
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to create recording directory {0}: {1}")]
    RecordingDir(PathBuf, #[source] std::io::Error),
    #[error("failed to open video writer for {0}")]
    WriterOpen(PathBuf),
    #[error("failed to spawn tracking thread: {0}")]
    Spawn(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ControlError>;

/// Every tunable of the tracking loop.  Defaults match the ESP32-CAM
/// deployment this was built for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// MJPEG stream endpoint, usually `http://<host>:81/stream`.
    pub stream_url: String,
    /// Pan/tilt endpoint, usually `http://<host>/action`; commands are
    /// sent as `?go=<direction>`.
    pub control_url: String,
    /// Base gap between consecutive camera moves.
    pub move_cooldown: Duration,
    /// Dead zone around frame center, as a fraction of the frame dimension.
    pub center_threshold: f64,
    /// FIFO window of the position smoother.
    pub smoothing_window: usize,
    /// Target frame rate of recordings.
    pub recording_fps: f64,
    pub recording_dir: PathBuf,
    /// Stream is considered dead after this long without a decoded frame.
    pub stale_after: Duration,
    pub first_frame_timeout: Duration,
    /// Consecutive detection misses tolerated before the target is lost.
    pub miss_limit: u32,
    /// The camera mount pans mirrored relative to the image: a head right
    /// of center is brought back with a `left` command.
    pub mirrored_pan: bool,
    /// Initial reconnect backoff; doubles per failure up to the cap.
    pub reconnect_backoff: Duration,
    pub reconnect_backoff_cap: Duration,
    /// Sleep at the end of each loop iteration.
    pub idle_sleep: Duration,
}

impl TrackerConfig {
    /// Config for a stock ESP32-CAM at `host`.
    pub fn for_host(host: &str) -> Self {
        Self {
            stream_url: format!("http://{host}:81/stream"),
            control_url: format!("http://{host}/action"),
            move_cooldown: Duration::from_millis(120),
            center_threshold: 0.1,
            smoothing_window: 2,
            recording_fps: 20.0,
            recording_dir: PathBuf::from("recordings"),
            stale_after: Duration::from_secs(5),
            first_frame_timeout: Duration::from_secs(10),
            miss_limit: 10,
            mirrored_pan: true,
            reconnect_backoff: Duration::from_millis(500),
            reconnect_backoff_cap: Duration::from_secs(10),
            idle_sleep: Duration::from_millis(10),
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self::for_host("192.168.1.1")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn for_host_builds_stock_endpoints() {
        let config = TrackerConfig::for_host("10.0.0.7");
        assert_eq!(config.stream_url, "http://10.0.0.7:81/stream");
        assert_eq!(config.control_url, "http://10.0.0.7/action");
    }

    #[test]
    fn config_round_trips_through_serde() {
        let config = TrackerConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: TrackerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.stream_url, config.stream_url);
        assert_eq!(back.move_cooldown, config.move_cooldown);
        assert_eq!(back.mirrored_pan, config.mirrored_pan);
    }
}
