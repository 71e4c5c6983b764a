//! Target acquisition state.
//!
//! A single missed detection must not drop the target: cascades flicker.
//! The machine coasts on the last known box for a bounded number of
//! misses, then declares the target lost and goes back to searching.

use ptz_detect::HeadBox;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetState {
    /// Nothing tracked yet, or the target was lost.
    Searching,
    /// A head was seen this cycle.
    Tracking { last: HeadBox },
    /// Recent misses; still holding the last known position.
    Coasting { last: HeadBox, misses: u32 },
}

impl TargetState {
    pub fn new() -> Self {
        TargetState::Searching
    }

    /// Feed one detection cycle.  Returns the box the caller should still
    /// treat as the target's position, if any.
    pub fn observe(&mut self, detected: Option<HeadBox>, miss_limit: u32) -> Option<HeadBox> {
        *self = match (*self, detected) {
            (_, Some(seen)) => TargetState::Tracking { last: seen },
            (TargetState::Searching, None) => TargetState::Searching,
            (TargetState::Tracking { last }, None) => coast(last, 1, miss_limit),
            (TargetState::Coasting { last, misses }, None) => coast(last, misses + 1, miss_limit),
        };
        match *self {
            TargetState::Searching => None,
            TargetState::Tracking { last } | TargetState::Coasting { last, .. } => Some(last),
        }
    }

    pub fn is_lost(&self) -> bool {
        matches!(self, TargetState::Searching)
    }
}

impl Default for TargetState {
    fn default() -> Self {
        Self::new()
    }
}

fn coast(last: HeadBox, misses: u32, miss_limit: u32) -> TargetState {
    if misses >= miss_limit {
        TargetState::Searching
    } else {
        TargetState::Coasting { last, misses }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MISS_LIMIT: u32 = 10;

    fn head() -> HeadBox {
        HeadBox { x: 100, y: 80, width: 40, height: 40 }
    }

    #[test]
    fn holds_position_through_brief_misses() {
        let mut state = TargetState::new();
        assert_eq!(state.observe(Some(head()), MISS_LIMIT), Some(head()));

        for _ in 0..MISS_LIMIT - 1 {
            assert_eq!(state.observe(None, MISS_LIMIT), Some(head()));
        }
        assert!(!state.is_lost());
    }

    #[test]
    fn loses_target_after_miss_limit() {
        let mut state = TargetState::new();
        state.observe(Some(head()), MISS_LIMIT);
        for _ in 0..MISS_LIMIT - 1 {
            state.observe(None, MISS_LIMIT);
        }
        assert_eq!(state.observe(None, MISS_LIMIT), None);
        assert!(state.is_lost());
    }

    #[test]
    fn redetection_resets_the_miss_count() {
        let mut state = TargetState::new();
        state.observe(Some(head()), MISS_LIMIT);
        for _ in 0..5 {
            state.observe(None, MISS_LIMIT);
        }
        state.observe(Some(head()), MISS_LIMIT);
        assert_eq!(state, TargetState::Tracking { last: head() });
    }

    #[test]
    fn searching_stays_searching_on_misses() {
        let mut state = TargetState::new();
        assert_eq!(state.observe(None, MISS_LIMIT), None);
        assert!(state.is_lost());
    }
}
