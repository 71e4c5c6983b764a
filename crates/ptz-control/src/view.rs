//! Live debug window.
//!
//! Shows the stream with the tracked box, frame-center crosshair, dead
//! zone rectangle and a small HUD.  Keystrokes are translated into
//! [`SessionCommand`]s on the control channel; the view never touches
//! controller state directly.

use crossbeam_channel::Sender;
use log::debug;
use opencv::core::{Point, Rect, Scalar};
use opencv::{highgui, imgproc};

use ptz_detect::HeadBox;
use ptz_stream::Frame;

use crate::session::SessionCommand;
use crate::Result;

const WINDOW_NAME: &str = "ptz-tracker";

const KEY_QUIT: i32 = 'q' as i32;
const KEY_RECORD: i32 = 'r' as i32;

// BGR order, as everywhere in OpenCV.
fn green() -> Scalar {
    Scalar::new(0.0, 255.0, 0.0, 0.0)
}
fn yellow() -> Scalar {
    Scalar::new(0.0, 255.0, 255.0, 0.0)
}
fn red() -> Scalar {
    Scalar::new(0.0, 0.0, 255.0, 0.0)
}
fn gray() -> Scalar {
    Scalar::new(128.0, 128.0, 128.0, 0.0)
}

/// Per-frame overlay state.
pub struct ViewOverlay<'a> {
    pub target: Option<&'a HeadBox>,
    pub detections: usize,
    pub recording: bool,
    pub center_threshold: f64,
}

pub struct DebugView {
    commands: Sender<SessionCommand>,
}

impl DebugView {
    pub fn open(commands: Sender<SessionCommand>) -> Result<Self> {
        highgui::named_window(WINDOW_NAME, highgui::WINDOW_AUTOSIZE)?;
        Ok(Self { commands })
    }

    /// Draw one frame and pump the key queue.
    pub fn show(&self, frame: &Frame, overlay: &ViewOverlay) -> Result<()> {
        let mut canvas = ptz_detect::convert::bgr_mat(frame)?;
        let width = frame.width as i32;
        let height = frame.height as i32;

        // Frame-center crosshair.
        imgproc::line(
            &mut canvas,
            Point::new(width / 2, 0),
            Point::new(width / 2, height),
            gray(),
            1,
            imgproc::LINE_8,
            0,
        )?;
        imgproc::line(
            &mut canvas,
            Point::new(0, height / 2),
            Point::new(width, height / 2),
            gray(),
            1,
            imgproc::LINE_8,
            0,
        )?;

        // Dead zone: moves only happen once the target leaves this box.
        let dead_w = (width as f64 * overlay.center_threshold) as i32;
        let dead_h = (height as f64 * overlay.center_threshold) as i32;
        imgproc::rectangle(
            &mut canvas,
            Rect::new(
                width / 2 - dead_w,
                height / 2 - dead_h,
                dead_w * 2,
                dead_h * 2,
            ),
            yellow(),
            1,
            imgproc::LINE_8,
            0,
        )?;

        if let Some(target) = overlay.target {
            imgproc::rectangle(
                &mut canvas,
                Rect::new(target.x, target.y, target.width, target.height),
                green(),
                2,
                imgproc::LINE_8,
                0,
            )?;
            let (cx, cy) = target.center();
            imgproc::circle(
                &mut canvas,
                Point::new(cx as i32, cy as i32),
                3,
                green(),
                -1,
                imgproc::LINE_8,
                0,
            )?;
        }

        let hud = format!("heads: {}  [q quit | r record]", overlay.detections);
        imgproc::put_text(
            &mut canvas,
            &hud,
            Point::new(10, 24),
            imgproc::FONT_HERSHEY_SIMPLEX,
            0.5,
            green(),
            1,
            imgproc::LINE_8,
            false,
        )?;
        if overlay.recording {
            imgproc::put_text(
                &mut canvas,
                "REC",
                Point::new(width - 60, 24),
                imgproc::FONT_HERSHEY_SIMPLEX,
                0.6,
                red(),
                2,
                imgproc::LINE_8,
                false,
            )?;
            imgproc::circle(
                &mut canvas,
                Point::new(width - 75, 18),
                6,
                red(),
                -1,
                imgproc::LINE_8,
                0,
            )?;
        }

        highgui::imshow(WINDOW_NAME, &canvas)?;
        match highgui::wait_key(1)? {
            key if key == KEY_QUIT => {
                debug!("quit key pressed");
                let _ = self.commands.send(SessionCommand::Stop);
            }
            key if key == KEY_RECORD => {
                debug!("record toggle key pressed");
                let _ = self.commands.send(SessionCommand::ToggleRecording);
            }
            _ => {}
        }
        Ok(())
    }

    pub fn close(&self) {
        let _ = highgui::destroy_window(WINDOW_NAME);
    }
}
