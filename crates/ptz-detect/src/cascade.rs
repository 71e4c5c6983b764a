//! Three-stage Haar cascade head detector.

use std::path::Path;

use log::debug;
use opencv::core::{self, Mat, Rect, Size};
use opencv::imgproc;
use opencv::objdetect::CascadeClassifier;
use opencv::prelude::*;

use ptz_stream::Frame;

use crate::{convert, DetectError, HeadBox, HeadDetector, Result};

/// Cascade tuning.  Defaults were chosen against the ESP32-CAM's 320x240
/// stream; min_size below 30 drowns the loop in false positives.
#[derive(Debug, Clone, Copy)]
pub struct DetectParams {
    pub scale_factor: f64,
    pub min_neighbors: i32,
    pub min_size: i32,
}

impl Default for DetectParams {
    fn default() -> Self {
        Self {
            scale_factor: 1.1,
            min_neighbors: 5,
            min_size: 30,
        }
    }
}

/// Viola-Jones head detector: frontal cascade, then profile, then profile
/// on the mirrored image.  Later stages only run when earlier ones found
/// nothing.
pub struct CascadeDetector {
    frontal: CascadeClassifier,
    profile: CascadeClassifier,
    params: DetectParams,
}

impl CascadeDetector {
    pub fn new(frontal: &Path, profile: &Path) -> Result<Self> {
        Self::with_params(frontal, profile, DetectParams::default())
    }

    pub fn with_params(frontal: &Path, profile: &Path, params: DetectParams) -> Result<Self> {
        Ok(Self {
            frontal: load_cascade(frontal)?,
            profile: load_cascade(profile)?,
            params,
        })
    }
}

fn load_cascade(path: &Path) -> Result<CascadeClassifier> {
    let path_str = path
        .to_str()
        .ok_or_else(|| DetectError::CascadePath(path.to_path_buf()))?;
    let cascade = CascadeClassifier::new(path_str)
        .map_err(|_| DetectError::CascadeLoad(path.to_path_buf()))?;
    if cascade.empty()? {
        return Err(DetectError::CascadeLoad(path.to_path_buf()));
    }
    Ok(cascade)
}

fn run_cascade(
    cascade: &mut CascadeClassifier,
    gray: &Mat,
    params: &DetectParams,
) -> Result<Vec<HeadBox>> {
    let mut rects = core::Vector::<Rect>::new();
    cascade.detect_multi_scale(
        gray,
        &mut rects,
        params.scale_factor,
        params.min_neighbors,
        0,
        Size::new(params.min_size, params.min_size),
        Size::default(),
    )?;
    Ok(rects
        .iter()
        .map(|rect| HeadBox {
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
        })
        .collect())
}

impl HeadDetector for CascadeDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<HeadBox>> {
        let gray = convert::gray_mat(frame)?;
        let mut equalized = Mat::default();
        imgproc::equalize_hist(&gray, &mut equalized)?;

        let mut boxes = run_cascade(&mut self.frontal, &equalized, &self.params)?;
        if boxes.is_empty() {
            boxes = run_cascade(&mut self.profile, &equalized, &self.params)?;
        }
        if boxes.is_empty() {
            // Stock profile cascades only know one side of the face.
            let mut flipped = Mat::default();
            core::flip(&equalized, &mut flipped, 1)?;
            boxes = run_cascade(&mut self.profile, &flipped, &self.params)?
                .into_iter()
                .map(|found| found.mirrored(frame.width))
                .collect();
        }

        if !boxes.is_empty() {
            debug!("cascade found {} head(s)", boxes.len());
        }
        Ok(boxes
            .into_iter()
            .map(|found| found.clamped(frame.width, frame.height))
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Needs real cascade XMLs on disk – skipped on CI
// ---------------------------------------------------------------------------
#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Instant;

    fn cascade_dir() -> PathBuf {
        PathBuf::from(
            std::env::var("PTZ_CASCADE_DIR").unwrap_or_else(|_| "assets/cascades".into()),
        )
    }

    #[test]
    #[ignore]
    fn loads_cascades_and_runs_on_blank_frame() {
        let dir = cascade_dir();
        let mut detector = CascadeDetector::new(
            &dir.join("haarcascade_frontalface_default.xml"),
            &dir.join("haarcascade_profileface.xml"),
        )
        .expect("load cascades");

        let frame = Frame {
            data: vec![0u8; 320 * 240 * 3],
            width: 320,
            height: 240,
            decoded_at: Instant::now(),
        };
        let boxes = detector.detect(&frame).expect("detect");
        assert!(boxes.is_empty(), "blank frame should contain no heads");
    }

    #[test]
    fn missing_cascade_is_an_error() {
        let missing = PathBuf::from("/definitely/not/here.xml");
        assert!(matches!(
            CascadeDetector::new(&missing, &missing),
            Err(DetectError::CascadeLoad(_))
        ));
    }
}
