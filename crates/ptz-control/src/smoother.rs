//! Detection jitter smoothing.
//!
//! Haar cascades wobble a few pixels frame to frame, which turns into
//! camera move spam.  A short FIFO mean over the last N boxes settles it
//! without adding noticeable lag.

use std::collections::VecDeque;

use ptz_detect::HeadBox;

pub struct PositionSmoother {
    window: VecDeque<HeadBox>,
    capacity: usize,
}

impl PositionSmoother {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Push a detection and get the coordinate-wise mean of the window.
    pub fn push(&mut self, detected: HeadBox) -> HeadBox {
        self.window.push_back(detected);
        if self.window.len() > self.capacity {
            self.window.pop_front();
        }

        let n = self.window.len() as i64;
        let mut sums = [0i64; 4];
        for head in &self.window {
            sums[0] += head.x as i64;
            sums[1] += head.y as i64;
            sums[2] += head.width as i64;
            sums[3] += head.height as i64;
        }
        HeadBox {
            x: (sums[0] / n) as i32,
            y: (sums[1] / n) as i32,
            width: (sums[2] / n) as i32,
            height: (sums[3] / n) as i32,
        }
    }

    pub fn clear(&mut self) {
        self.window.clear();
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }
}
