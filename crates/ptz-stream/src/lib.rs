// ptz-stream/src/lib.rs
// ============================================================
// MJPEG-over-HTTP stream reader for the PTZ tracker
// Pulls the camera's multipart stream on a dedicated thread,
// slices JPEGs out by SOI/EOI markers, and publishes decoded
// RGB frames into a single latest-frame slot.
// ------------------------------------------------------------
// Public API:
//   * StreamReader::connect()    – open a stream, wait for frame #1
//   * StreamReader::read()       – latest frame, lock-briefly clone
//   * StreamReader::is_active()  – freshness check (stale_after)
//   * StreamReader::stop()       – cooperative shutdown, bounded join
// ============================================================

//! PTZ tracker – camera stream layer
//!
//! An ESP32-CAM serves MJPEG on `http://<host>:81/stream`.  The boundary
//! lines of the multipart response vary between firmware builds, so frames
//! are recovered purely from JPEG SOI/EOI markers.  Decoding happens on the
//! reader thread; consumers only ever see the most recent [`Frame`] via an
//! `Arc` slot, so a slow consumer drops frames instead of building a queue.

use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use thiserror::Error;

mod jpeg;
pub use jpeg::extract_jpeg;

const READ_CHUNK: usize = 64 * 1024;
const FIRST_FRAME_POLL: Duration = Duration::from_millis(25);
const STOP_JOIN_WAIT: Duration = Duration::from_secs(1);

#[derive(Error, Debug)]
pub enum StreamError {
    #[error("failed to connect to {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("stream {url} answered with status {status}")]
    BadStatus {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("stream ended before delivering a frame")]
    ClosedBeforeFirstFrame,
    #[error("no frame decoded within {0:?} of connecting")]
    FirstFrameTimeout(Duration),
    #[error("failed to spawn reader thread: {0}")]
    Spawn(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StreamError>;

/// One decoded frame, packed RGB24.
///
/// Frames are shared as `Arc<Frame>` and never mutated after publish;
/// anything that wants to draw on one copies the pixels first.
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub decoded_at: Instant,
}

impl Frame {
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Tunables for a reader; defaults match the ESP32-CAM deployment.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub connect_timeout: Duration,
    pub first_frame_timeout: Duration,
    pub stale_after: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            first_frame_timeout: Duration::from_secs(10),
            stale_after: Duration::from_secs(5),
        }
    }
}

struct Shared {
    slot: Mutex<Option<Arc<Frame>>>,
    stopped: AtomicBool,
}

/// Handle to a running MJPEG reader thread.
pub struct StreamReader {
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
    done_rx: Receiver<()>,
    stale_after: Duration,
}

impl StreamReader {
    /// Connect with default [`StreamConfig`].
    pub fn connect(url: &str) -> Result<Self> {
        Self::connect_with(url, StreamConfig::default())
    }

    /// Open `url`, spawn the reader thread, and block until the first frame
    /// decodes or `first_frame_timeout` elapses.
    pub fn connect_with(url: &str, config: StreamConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(config.connect_timeout)
            // The body is an endless multipart stream; no whole-request deadline.
            .timeout(None::<Duration>)
            .build()
            .map_err(|source| StreamError::Connect {
                url: url.into(),
                source,
            })?;

        let response = client.get(url).send().map_err(|source| StreamError::Connect {
            url: url.into(),
            source,
        })?;
        if !response.status().is_success() {
            return Err(StreamError::BadStatus {
                url: url.into(),
                status: response.status(),
            });
        }
        info!("connected to MJPEG stream {url}");

        let shared = Arc::new(Shared {
            slot: Mutex::new(None),
            stopped: AtomicBool::new(false),
        });
        let (done_tx, done_rx) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("mjpeg-reader".into())
            .spawn({
                let shared = Arc::clone(&shared);
                move || {
                    read_loop(response, &shared);
                    shared.stopped.store(true, Ordering::Relaxed);
                    let _ = done_tx.send(());
                }
            })
            .map_err(StreamError::Spawn)?;

        let mut reader = Self {
            shared,
            handle: Some(handle),
            done_rx,
            stale_after: config.stale_after,
        };

        let deadline = Instant::now() + config.first_frame_timeout;
        while reader.read().is_none() {
            if reader.shared.stopped.load(Ordering::Relaxed) {
                reader.stop();
                return Err(StreamError::ClosedBeforeFirstFrame);
            }
            if Instant::now() >= deadline {
                reader.stop();
                return Err(StreamError::FirstFrameTimeout(config.first_frame_timeout));
            }
            thread::sleep(FIRST_FRAME_POLL);
        }

        Ok(reader)
    }

    /// Latest decoded frame, if any. Last writer wins; never blocks on I/O.
    pub fn read(&self) -> Option<Arc<Frame>> {
        self.shared
            .slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Dimensions of the most recent frame.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.read().map(|frame| frame.dimensions())
    }

    /// True while frames keep arriving within `stale_after`.  A reader that
    /// has gone inactive never recovers; the owner reconnects with a new one.
    pub fn is_active(&self) -> bool {
        frame_is_fresh(self.read().as_deref(), Instant::now(), self.stale_after)
    }

    /// Ask the reader thread to stop and wait briefly for it to oblige.
    ///
    /// A thread wedged inside a blocking socket read cannot observe the stop
    /// flag; after the grace period it is abandoned with a warning and will
    /// die on its own when the socket does.
    pub fn stop(&mut self) {
        self.shared.stopped.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            match self.done_rx.recv_timeout(STOP_JOIN_WAIT) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    let _ = handle.join();
                }
                Err(RecvTimeoutError::Timeout) => {
                    warn!("mjpeg reader did not stop within {STOP_JOIN_WAIT:?}, abandoning thread");
                }
            }
        }
    }
}

impl Drop for StreamReader {
    fn drop(&mut self) {
        self.shared.stopped.store(true, Ordering::Relaxed);
    }
}

fn frame_is_fresh(frame: Option<&Frame>, now: Instant, stale_after: Duration) -> bool {
    match frame {
        Some(frame) => now.duration_since(frame.decoded_at) < stale_after,
        None => false,
    }
}

fn read_loop(mut response: reqwest::blocking::Response, shared: &Shared) {
    let mut buffer = Vec::with_capacity(READ_CHUNK * 2);
    let mut chunk = [0u8; READ_CHUNK];

    loop {
        if shared.stopped.load(Ordering::Relaxed) {
            return;
        }
        match response.read(&mut chunk) {
            Ok(0) => {
                debug!("mjpeg stream ended");
                return;
            }
            Ok(n) => {
                buffer.extend_from_slice(&chunk[..n]);
                while let Some(bytes) = extract_jpeg(&mut buffer) {
                    publish(&bytes, shared);
                }
            }
            Err(err) => {
                warn!("mjpeg read error: {err}");
                return;
            }
        }
    }
}

fn publish(bytes: &[u8], shared: &Shared) {
    match image::load_from_memory(bytes) {
        Ok(decoded) => {
            let rgb = decoded.into_rgb8();
            let (width, height) = rgb.dimensions();
            let frame = Arc::new(Frame {
                data: rgb.into_raw(),
                width,
                height,
                decoded_at: Instant::now(),
            });
            *shared
                .slot
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(frame);
        }
        // A corrupt frame is dropped; the stream keeps going.
        Err(err) => warn!("dropping undecodable frame ({} bytes): {err}", bytes.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_at(decoded_at: Instant) -> Frame {
        Frame {
            data: vec![0; 12],
            width: 2,
            height: 2,
            decoded_at,
        }
    }

    #[test]
    fn freshness_tracks_stale_after() {
        let stale_after = Duration::from_secs(5);
        let decoded = Instant::now();
        let frame = frame_at(decoded);

        assert!(frame_is_fresh(Some(&frame), decoded, stale_after));
        assert!(frame_is_fresh(
            Some(&frame),
            decoded + Duration::from_millis(4_999),
            stale_after
        ));
        assert!(!frame_is_fresh(
            Some(&frame),
            decoded + Duration::from_secs(5),
            stale_after
        ));
        assert!(!frame_is_fresh(None, decoded, stale_after));
    }
}
