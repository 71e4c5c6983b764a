//! Steering decision: where to nudge the camera to re-center the target.

use ptz_detect::HeadBox;

use crate::actuator::Direction;

#[derive(Debug, Clone, Copy)]
pub struct SteeringParams {
    /// Dead zone around frame center, fraction of the frame dimension.
    pub center_threshold: f64,
    /// Mirrored mounts pan the opposite way from the image x axis.
    pub mirrored_pan: bool,
}

/// Pick at most one move that drives the target toward frame center.
///
/// Offsets are normalized to the frame size.  The vertical axis wins when
/// its offset is strictly larger; inside the dead zone nothing moves.
pub fn steer(
    target: &HeadBox,
    frame_width: u32,
    frame_height: u32,
    params: &SteeringParams,
) -> Option<Direction> {
    let (cx, cy) = target.center();
    let x_offset = (cx - frame_width as f64 / 2.0) / frame_width as f64;
    let y_offset = (cy - frame_height as f64 / 2.0) / frame_height as f64;

    if y_offset.abs() > x_offset.abs() && y_offset.abs() > params.center_threshold {
        Some(if y_offset > 0.0 {
            Direction::Down
        } else {
            Direction::Up
        })
    } else if x_offset.abs() > params.center_threshold {
        let head_is_right = x_offset > 0.0;
        Some(match (head_is_right, params.mirrored_pan) {
            (true, true) | (false, false) => Direction::Left,
            (true, false) | (false, true) => Direction::Right,
        })
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: (u32, u32) = (320, 240);

    fn params(mirrored_pan: bool) -> SteeringParams {
        SteeringParams { center_threshold: 0.1, mirrored_pan }
    }

    fn head_centered_at(cx: i32, cy: i32) -> HeadBox {
        HeadBox { x: cx - 20, y: cy - 20, width: 40, height: 40 }
    }

    #[test]
    fn centered_target_needs_no_move() {
        let head = head_centered_at(160, 120);
        assert_eq!(steer(&head, FRAME.0, FRAME.1, &params(true)), None);
    }

    #[test]
    fn inside_dead_zone_needs_no_move() {
        // 9% off on x, under the 10% threshold.
        let head = head_centered_at(160 + 28, 120);
        assert_eq!(steer(&head, FRAME.0, FRAME.1, &params(true)), None);
    }

    #[test]
    fn dominant_vertical_offset_wins() {
        // 40% down, 15% right: vertical magnitude dominates.
        let head = head_centered_at(160 + 48, 120 + 96);
        assert_eq!(
            steer(&head, FRAME.0, FRAME.1, &params(true)),
            Some(Direction::Down)
        );

        let head = head_centered_at(160 + 48, 120 - 96);
        assert_eq!(
            steer(&head, FRAME.0, FRAME.1, &params(true)),
            Some(Direction::Up)
        );
    }

    #[test]
    fn mirrored_pan_inverts_horizontal_commands() {
        // 40% right of center.
        let head = head_centered_at(160 + 128, 120);
        assert_eq!(
            steer(&head, FRAME.0, FRAME.1, &params(true)),
            Some(Direction::Left)
        );
        assert_eq!(
            steer(&head, FRAME.0, FRAME.1, &params(false)),
            Some(Direction::Right)
        );

        let head = head_centered_at(160 - 128, 120);
        assert_eq!(
            steer(&head, FRAME.0, FRAME.1, &params(true)),
            Some(Direction::Right)
        );
        assert_eq!(
            steer(&head, FRAME.0, FRAME.1, &params(false)),
            Some(Direction::Left)
        );
    }
}
