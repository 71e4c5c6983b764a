// ptz-detect/src/lib.rs
// ============================================================
// ptz-detect  –  Head detection stage for the PTZ tracker
// Runs OpenCV Haar cascades (frontal + profile) over decoded
// RGB frames from ptz-stream.
// ------------------------------------------------------------
// Public API
//   * HeadDetector::detect(frame)      – trait seam, Vec<HeadBox>
//   * CascadeDetector::new(paths)      – frontal/profile cascades
//   * HeadBox                          – pixel-space box + geometry
// ============================================================

//! PTZ tracker – detection layer
//!
//! A backend-agnostic [`HeadDetector`] trait plus a concrete
//! [`CascadeDetector`] running Viola-Jones cascades.  The trait is the
//! seam the control loop and the tests use; swapping in a DNN detector
//! later is a matter of another impl, the outer API stays identical.
//!
//! The cascade runs three stages against an equalized grayscale image:
//! frontal faces first, then profile faces, then profile faces on the
//! horizontally mirrored image (the stock profile cascade only knows one
//! side).  Boxes from the mirrored pass are mapped back into original
//! frame coordinates.

use thiserror::Error;

use ptz_stream::Frame;

pub mod convert;
mod cascade;

pub use cascade::{CascadeDetector, DetectParams};

#[derive(Debug, Error)]
pub enum DetectError {
    #[error("OpenCV error: {0}")]
    Cv(#[from] opencv::Error),
    #[error("cascade failed to load from {0}")]
    CascadeLoad(std::path::PathBuf),
    #[error("cascade path is not valid UTF-8: {0}")]
    CascadePath(std::path::PathBuf),
    #[error("frame has no pixel data")]
    EmptyFrame,
}

pub type Result<T> = std::result::Result<T, DetectError>;

/// Axis-aligned detection box in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeadBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl HeadBox {
    pub fn center(&self) -> (f64, f64) {
        (
            self.x as f64 + self.width as f64 / 2.0,
            self.y as f64 + self.height as f64 / 2.0,
        )
    }

    pub fn area(&self) -> i64 {
        self.width.max(0) as i64 * self.height.max(0) as i64
    }

    /// Map a box detected on a horizontally flipped image back into the
    /// original frame: x' = frame_width - x - width.
    pub fn mirrored(self, frame_width: u32) -> Self {
        Self {
            x: frame_width as i32 - self.x - self.width,
            ..self
        }
    }

    /// Clamp the box inside the frame bounds.
    pub fn clamped(self, frame_width: u32, frame_height: u32) -> Self {
        let fw = frame_width as i32;
        let fh = frame_height as i32;
        let x = self.x.clamp(0, fw);
        let y = self.y.clamp(0, fh);
        Self {
            x,
            y,
            width: self.width.min(fw - x).max(0),
            height: self.height.min(fh - y).max(0),
        }
    }

    /// Largest box by area; the tracker follows the nearest head.
    pub fn largest_of(boxes: &[HeadBox]) -> Option<HeadBox> {
        boxes.iter().copied().max_by_key(HeadBox::area)
    }
}

/// Trait for head detectors.  Empty result means no head, not an error.
pub trait HeadDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<HeadBox>>;
}
