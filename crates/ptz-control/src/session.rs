//! The tracking session: lifecycle, cancellation and the loop itself.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use log::{error, info, warn};

use ptz_detect::{HeadBox, HeadDetector};
use ptz_stream::{StreamConfig, StreamReader};

use crate::actuator::CameraActuator;
use crate::recorder::Recorder;
use crate::smoother::PositionSmoother;
use crate::steering::{steer, SteeringParams};
use crate::target::TargetState;
use crate::view::{DebugView, ViewOverlay};
use crate::{ControlError, Result, TrackerConfig};

/// How long `stop()` waits for the loop thread before abandoning it.  The
/// thread may be stuck inside a connect attempt, which resolves on its own.
const STOP_WAIT: Duration = Duration::from_secs(5);
/// Pause when the reader is alive but has not published a frame yet.
const NO_FRAME_SLEEP: Duration = Duration::from_millis(100);
const CANCEL_POLL: Duration = Duration::from_millis(50);

/// Commands accepted by a running session.  The debug view's keyboard,
/// tests and the owning binary all drive this same channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    Stop,
    ToggleRecording,
}

/// Cooperative cancellation flag, cloneable across threads.  The loop
/// checks it once per iteration and during reconnect waits.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Coarse health signal for the owning caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Connecting,
    Tracking,
    Stopped,
}

impl SessionStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SessionStatus::Connecting,
            1 => SessionStatus::Tracking,
            _ => SessionStatus::Stopped,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Steer the camera to keep the head centered.
    pub follow_person: bool,
    /// Start recording as soon as the stream is up.
    pub record: bool,
    /// Open the live debug window.
    pub show_debug: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            follow_person: true,
            record: false,
            show_debug: false,
        }
    }
}

/// Handle to a tracking loop running on its own thread.
pub struct TrackingSession {
    commands: Sender<SessionCommand>,
    token: CancelToken,
    status: Arc<AtomicU8>,
    done_rx: Receiver<()>,
    handle: Option<JoinHandle<()>>,
}

impl TrackingSession {
    /// Spawn the loop.  Returns as soon as the thread is up; connecting to
    /// the stream happens inside the loop so a dead camera shows up as
    /// [`SessionStatus::Connecting`], not as a startup error.
    pub fn start(
        config: TrackerConfig,
        detector: Box<dyn HeadDetector + Send>,
        options: SessionOptions,
    ) -> Result<Self> {
        let (cmd_tx, cmd_rx) = unbounded();
        let (done_tx, done_rx) = bounded(1);
        let token = CancelToken::new();
        let status = Arc::new(AtomicU8::new(SessionStatus::Connecting as u8));

        let handle = thread::Builder::new()
            .name("ptz-tracking".into())
            .spawn({
                let token = token.clone();
                let status = Arc::clone(&status);
                let cmd_feed = cmd_tx.clone();
                move || {
                    run_loop(config, detector, options, cmd_rx, cmd_feed, &token, &status);
                    let _ = done_tx.send(());
                }
            })
            .map_err(ControlError::Spawn)?;

        Ok(Self {
            commands: cmd_tx,
            token,
            status,
            done_rx,
            handle: Some(handle),
        })
    }

    /// Sender half of the command channel, for keyboards and remote callers.
    pub fn commands(&self) -> Sender<SessionCommand> {
        self.commands.clone()
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.token.clone()
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus::from_u8(self.status.load(Ordering::Relaxed))
    }

    pub fn is_active(&self) -> bool {
        self.status() != SessionStatus::Stopped
    }

    pub fn toggle_recording(&self) {
        let _ = self.commands.send(SessionCommand::ToggleRecording);
    }

    /// Cancel the loop and wait briefly for it to wind down.
    pub fn stop(mut self) {
        self.token.cancel();
        let _ = self.commands.send(SessionCommand::Stop);
        match self.done_rx.recv_timeout(STOP_WAIT) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if let Some(handle) = self.handle.take() {
                    let _ = handle.join();
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!("tracking loop did not stop within {STOP_WAIT:?}, abandoning thread");
            }
        }
    }

    /// Block until the loop exits on its own (quit key, Ctrl-C token, ...).
    pub fn wait(mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run_loop(
    config: TrackerConfig,
    mut detector: Box<dyn HeadDetector + Send>,
    options: SessionOptions,
    commands: Receiver<SessionCommand>,
    command_feed: Sender<SessionCommand>,
    token: &CancelToken,
    status: &AtomicU8,
) {
    // Nothing past this boundary is allowed to panic the process; every
    // error is logged here and cleanup still runs.
    if let Err(err) = track(
        &config,
        detector.as_mut(),
        &options,
        &commands,
        &command_feed,
        token,
        status,
    ) {
        error!("tracking loop error: {err}");
    }
    status.store(SessionStatus::Stopped as u8, Ordering::Relaxed);
    info!("tracking stopped");
}

fn track(
    config: &TrackerConfig,
    detector: &mut dyn HeadDetector,
    options: &SessionOptions,
    commands: &Receiver<SessionCommand>,
    command_feed: &Sender<SessionCommand>,
    token: &CancelToken,
    status: &AtomicU8,
) -> Result<()> {
    let mut actuator = CameraActuator::new(&config.control_url, config.move_cooldown)?;
    actuator.set_enabled(options.follow_person);

    let steering = SteeringParams {
        center_threshold: config.center_threshold,
        mirrored_pan: config.mirrored_pan,
    };
    let mut smoother = PositionSmoother::new(config.smoothing_window);
    let mut target = TargetState::new();

    let mut reader: Option<StreamReader> = None;
    let mut recorder: Option<Recorder> = None;
    let mut record_requested = options.record;

    let mut view: Option<DebugView> = None;
    if options.show_debug {
        match DebugView::open(command_feed.clone()) {
            Ok(opened) => view = Some(opened),
            Err(err) => warn!("debug window unavailable, running headless: {err}"),
        }
    }

    let outcome = run_iterations(
        config,
        detector,
        options,
        commands,
        token,
        status,
        &mut actuator,
        &steering,
        &mut smoother,
        &mut target,
        &mut reader,
        &mut recorder,
        &mut record_requested,
        &view,
    );

    // Cleanup runs on every exit path: cancel, quit command, error.
    if let Some(active) = recorder.take() {
        active.finish();
    }
    if let Some(open) = view.take() {
        open.close();
    }
    if let Some(mut connected) = reader.take() {
        connected.stop();
    }
    outcome
}

#[allow(clippy::too_many_arguments)]
fn run_iterations(
    config: &TrackerConfig,
    detector: &mut dyn HeadDetector,
    options: &SessionOptions,
    commands: &Receiver<SessionCommand>,
    token: &CancelToken,
    status: &AtomicU8,
    actuator: &mut CameraActuator,
    steering: &SteeringParams,
    smoother: &mut PositionSmoother,
    target: &mut TargetState,
    reader: &mut Option<StreamReader>,
    recorder: &mut Option<Recorder>,
    record_requested: &mut bool,
    view: &Option<DebugView>,
) -> Result<()> {
    loop {
        if token.is_cancelled() {
            return Ok(());
        }

        let mut stop = false;
        while let Ok(command) = commands.try_recv() {
            match command {
                SessionCommand::Stop => stop = true,
                SessionCommand::ToggleRecording => {
                    toggle_recording(recorder, record_requested, reader, config);
                }
            }
        }
        if stop {
            return Ok(());
        }

        let active = reader.as_ref().map(StreamReader::is_active).unwrap_or(false);
        if !active {
            status.store(SessionStatus::Connecting as u8, Ordering::Relaxed);
            if let Some(mut stale) = reader.take() {
                warn!("stream went stale, reconnecting");
                stale.stop();
            }
            smoother.clear();
            *target = TargetState::new();

            let Some(connected) = connect_with_backoff(config, token) else {
                return Ok(()); // cancelled mid-reconnect
            };
            if *record_requested && recorder.is_none() {
                start_recorder(recorder, &connected, config);
            }
            *reader = Some(connected);
            status.store(SessionStatus::Tracking as u8, Ordering::Relaxed);
            continue;
        }

        let Some(frame) = reader.as_ref().and_then(StreamReader::read) else {
            thread::sleep(NO_FRAME_SLEEP);
            continue;
        };

        if let Some(sink) = recorder.as_mut() {
            if let Err(err) = sink.write(&frame) {
                warn!("recording write failed: {err}");
            }
        }

        let mut detections = 0;
        let mut display: Option<HeadBox> = None;
        if options.follow_person {
            let found = match detector.detect(&frame) {
                Ok(boxes) => {
                    detections = boxes.len();
                    HeadBox::largest_of(&boxes)
                }
                Err(err) => {
                    warn!("detection failed: {err}");
                    None
                }
            };

            let smoothed = found.map(|head| smoother.push(head));
            if let Some(head) = smoothed {
                if let Some(direction) = steer(&head, frame.width, frame.height, steering) {
                    actuator.move_camera(direction);
                }
            }
            display = target.observe(smoothed, config.miss_limit);
        }

        if let Some(open) = view {
            let overlay = ViewOverlay {
                target: display.as_ref(),
                detections,
                recording: recorder.is_some(),
                center_threshold: config.center_threshold,
            };
            if let Err(err) = open.show(&frame, &overlay) {
                warn!("debug view failed: {err}");
            }
        }

        thread::sleep(config.idle_sleep);
    }
}

/// Keep trying to open the stream, doubling the wait after each failure.
/// Returns `None` only when the token is cancelled.
fn connect_with_backoff(config: &TrackerConfig, token: &CancelToken) -> Option<StreamReader> {
    let stream_config = StreamConfig {
        first_frame_timeout: config.first_frame_timeout,
        stale_after: config.stale_after,
        ..StreamConfig::default()
    };
    let mut backoff = config.reconnect_backoff;

    loop {
        if token.is_cancelled() {
            return None;
        }
        match StreamReader::connect_with(&config.stream_url, stream_config.clone()) {
            Ok(reader) => return Some(reader),
            Err(err) => {
                warn!(
                    "connect to {} failed ({err}), retrying in {backoff:?}",
                    config.stream_url
                );
                if !sleep_cancellable(backoff, token) {
                    return None;
                }
                backoff = (backoff * 2).min(config.reconnect_backoff_cap);
            }
        }
    }
}

/// Sleep in small slices so cancellation stays responsive.  False means
/// the token fired.
fn sleep_cancellable(total: Duration, token: &CancelToken) -> bool {
    let mut remaining = total;
    while remaining > Duration::ZERO {
        if token.is_cancelled() {
            return false;
        }
        let slice = remaining.min(CANCEL_POLL);
        thread::sleep(slice);
        remaining -= slice;
    }
    !token.is_cancelled()
}

fn start_recorder(recorder: &mut Option<Recorder>, reader: &StreamReader, config: &TrackerConfig) {
    let Some((width, height)) = reader.dimensions() else {
        info!("recording will start once the stream delivers a frame");
        return;
    };
    match Recorder::create(&config.recording_dir, width, height, config.recording_fps) {
        Ok(created) => *recorder = Some(created),
        Err(err) => warn!("could not start recording: {err}"),
    }
}

fn toggle_recording(
    recorder: &mut Option<Recorder>,
    record_requested: &mut bool,
    reader: &Option<StreamReader>,
    config: &TrackerConfig,
) {
    if let Some(active) = recorder.take() {
        *record_requested = false;
        active.finish();
        return;
    }
    *record_requested = true;
    if let Some(connected) = reader {
        start_recorder(recorder, connected, config);
    } else {
        info!("recording will start once the stream connects");
    }
}
