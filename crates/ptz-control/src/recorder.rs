//! MP4 recording of the live stream.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use log::{info, warn};
use opencv::core::Size;
use opencv::prelude::*;
use opencv::videoio::VideoWriter;

use ptz_stream::Frame;

use crate::{ControlError, Result};

/// Writes `recording_YYYYMMDD_HHMMSS.mp4` files, paced to the target fps.
///
/// The loop runs as fast as frames decode; [`write`] drops anything that
/// arrives before the next frame slot so the file plays back at real speed.
///
/// [`write`]: Recorder::write
pub struct Recorder {
    writer: VideoWriter,
    path: PathBuf,
    frame_interval: Duration,
    last_write: Option<Instant>,
}

impl Recorder {
    pub fn create(dir: &Path, width: u32, height: u32, fps: f64) -> Result<Self> {
        fs::create_dir_all(dir)
            .map_err(|err| ControlError::RecordingDir(dir.to_path_buf(), err))?;

        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let path = dir.join(format!("recording_{stamp}.mp4"));
        let path_str = path
            .to_str()
            .ok_or_else(|| ControlError::WriterOpen(path.clone()))?;

        let fourcc = VideoWriter::fourcc('m', 'p', '4', 'v')?;
        let writer = VideoWriter::new(
            path_str,
            fourcc,
            fps,
            Size::new(width as i32, height as i32),
            true,
        )?;
        if !writer.is_opened()? {
            return Err(ControlError::WriterOpen(path));
        }

        info!("recording started: {}", path.display());
        Ok(Self {
            writer,
            path,
            frame_interval: Duration::from_secs_f64(1.0 / fps),
            last_write: None,
        })
    }

    /// Write a frame unless the previous one landed less than a frame
    /// interval ago.
    pub fn write(&mut self, frame: &Frame) -> Result<()> {
        let now = Instant::now();
        if let Some(last) = self.last_write {
            if now.duration_since(last) < self.frame_interval {
                return Ok(());
            }
        }
        let bgr = ptz_detect::convert::bgr_mat(frame)?;
        self.writer.write(&bgr)?;
        self.last_write = Some(now);
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Finalize the file.  Consumes the recorder, so a recording can only
    /// be closed once.
    pub fn finish(mut self) {
        match self.writer.release() {
            Ok(()) => info!("recording saved: {}", self.path.display()),
            Err(err) => warn!("failed to finalize {}: {err}", self.path.display()),
        }
    }
}

// ---------------------------------------------------------------------------
// Needs working OpenCV video codecs – skipped on CI
// ---------------------------------------------------------------------------
#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    #[ignore]
    fn writes_a_playable_file() {
        let dir = std::env::temp_dir().join("ptz-recorder-test");
        let mut recorder = Recorder::create(&dir, 64, 48, 20.0).expect("create");

        let frame = Frame {
            data: vec![128u8; 64 * 48 * 3],
            width: 64,
            height: 48,
            decoded_at: Instant::now(),
        };
        for _ in 0..5 {
            recorder.write(&frame).expect("write");
            std::thread::sleep(Duration::from_millis(60));
        }
        let path = recorder.path().to_path_buf();
        recorder.finish();
        assert!(path.is_file());
        let _ = std::fs::remove_file(path);
    }
}
