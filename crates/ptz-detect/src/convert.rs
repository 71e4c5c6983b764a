//! RGB frame → OpenCV Mat conversion.
//!
//! Frames arrive as packed RGB24 from ptz-stream; OpenCV wants BGR for
//! drawing/encoding and single-channel grayscale for cascade detection.
//! Both conversions copy, the shared frame is never touched.

use opencv::core::Mat;
use opencv::imgproc;
use opencv::prelude::*;

use ptz_stream::Frame;

use crate::{DetectError, Result};

fn rgb_mat(frame: &Frame) -> Result<Mat> {
    if frame.data.is_empty() {
        return Err(DetectError::EmptyFrame);
    }
    let flat = Mat::from_slice(&frame.data)?;
    let rgb = flat.reshape(3, frame.height as i32)?.try_clone()?;
    Ok(rgb)
}

/// Frame as a BGR Mat, suitable for `VideoWriter` and `imshow`.
pub fn bgr_mat(frame: &Frame) -> Result<Mat> {
    let rgb = rgb_mat(frame)?;
    let mut bgr = Mat::default();
    imgproc::cvt_color(
        &rgb,
        &mut bgr,
        imgproc::COLOR_RGB2BGR,
        0,
    )?;
    Ok(bgr)
}

/// Frame as a single-channel grayscale Mat.
pub fn gray_mat(frame: &Frame) -> Result<Mat> {
    let rgb = rgb_mat(frame)?;
    let mut gray = Mat::default();
    imgproc::cvt_color(
        &rgb,
        &mut gray,
        imgproc::COLOR_RGB2GRAY,
        0,
    )?;
    Ok(gray)
}
