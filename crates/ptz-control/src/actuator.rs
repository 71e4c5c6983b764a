//! Pan/tilt actuation over the camera's HTTP endpoint.
//!
//! The servo firmware is dumb: one GET per nudge, `?go=<direction>`.
//! Sending them as fast as detection runs makes the mount oscillate, so
//! every send passes through [`MoveGate`] first.  The gate is pure state
//! fed explicit instants, which keeps the rate-limit math testable with a
//! simulated clock.

use std::fmt;
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::Result;

/// Same-direction repeats past this count start stretching the cooldown.
const REPEAT_DAMPING_AFTER: u32 = 3;
/// Cooldown never stretches beyond this multiple of the base.
const MAX_COOLDOWN_SCALE: f64 = 3.0;

const MOVE_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rate limiter for camera moves.
///
/// Base cooldown applies between any two moves.  A run of identical
/// directions longer than [`REPEAT_DAMPING_AFTER`] scales the cooldown by
/// `1 + 0.2 * repeats`, capped at [`MAX_COOLDOWN_SCALE`]; changing
/// direction resets the run.  State only advances through [`record`],
/// which the actuator calls after a confirmed send.
///
/// [`record`]: MoveGate::record
#[derive(Debug, Clone)]
pub struct MoveGate {
    base_cooldown: Duration,
    last_move: Option<Instant>,
    last_direction: Option<Direction>,
    repeats: u32,
}

impl MoveGate {
    pub fn new(base_cooldown: Duration) -> Self {
        Self {
            base_cooldown,
            last_move: None,
            last_direction: None,
            repeats: 0,
        }
    }

    pub fn effective_cooldown(&self, direction: Direction) -> Duration {
        if self.last_direction == Some(direction) && self.repeats > REPEAT_DAMPING_AFTER {
            let scale = (1.0 + 0.2 * self.repeats as f64).min(MAX_COOLDOWN_SCALE);
            self.base_cooldown.mul_f64(scale)
        } else {
            self.base_cooldown
        }
    }

    pub fn allows(&self, direction: Direction, now: Instant) -> bool {
        match self.last_move {
            None => true,
            Some(last) => now.duration_since(last) >= self.effective_cooldown(direction),
        }
    }

    pub fn record(&mut self, direction: Direction, now: Instant) {
        if self.last_direction == Some(direction) {
            self.repeats += 1;
        } else {
            self.repeats = 0;
        }
        self.last_direction = Some(direction);
        self.last_move = Some(now);
    }
}

/// HTTP client for the pan/tilt endpoint, gated by [`MoveGate`].
pub struct CameraActuator {
    client: reqwest::blocking::Client,
    control_url: String,
    gate: MoveGate,
    enabled: bool,
}

impl CameraActuator {
    pub fn new(control_url: &str, base_cooldown: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(MOVE_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            control_url: control_url.to_string(),
            gate: MoveGate::new(base_cooldown),
            enabled: true,
        })
    }

    /// Disabled actuators swallow every move; used for record-only sessions.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Try to nudge the camera.  Returns true only for a confirmed send:
    /// gated, failed, or refused moves leave the cooldown state untouched
    /// so the next attempt is not pushed out by a move that never happened.
    pub fn move_camera(&mut self, direction: Direction) -> bool {
        if !self.enabled {
            return false;
        }
        let now = Instant::now();
        if !self.gate.allows(direction, now) {
            return false;
        }

        let url = format!("{}?go={}", self.control_url, direction);
        match self.client.get(&url).send() {
            Ok(response) if response.status().is_success() => {
                debug!("camera moved {direction}");
                self.gate.record(direction, now);
                true
            }
            Ok(response) => {
                warn!("camera move {direction} refused with status {}", response.status());
                false
            }
            Err(err) => {
                warn!("camera move {direction} failed: {err}");
                false
            }
        }
    }
}
