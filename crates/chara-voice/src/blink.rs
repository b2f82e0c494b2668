//! Autonomous blink timer.
//!
//! A two-state timer (open/closed) ticked once per frame. The reopen
//! transition fires on timer expiry regardless of the enable flag, so the eyes
//! can never stay shut while auto blink is switched off mid-close.

use crate::expression::{ExpressionChannel, ExpressionSink};
use std::sync::Arc;

/// Seconds the eyes stay closed during a blink.
pub const BLINK_CLOSE_MAX: f32 = 0.12;

/// Seconds the eyes stay open between blinks.
pub const BLINK_OPEN_MAX: f32 = 5.0;

pub struct AutoBlink {
    sink: Arc<dyn ExpressionSink>,
    remaining: f32,
    is_open: bool,
    auto: bool,
}

impl AutoBlink {
    pub fn new(sink: Arc<dyn ExpressionSink>) -> Self {
        Self {
            sink,
            remaining: 0.0,
            is_open: true,
            auto: true,
        }
    }

    /// Switch auto blink on or off. Returns the seconds until the eyes are
    /// guaranteed open (0 if already open); callers use it to delay facial
    /// changes that would look wrong over closed eyes.
    pub fn set_enabled(&mut self, auto: bool) -> f32 {
        self.auto = auto;
        if !self.is_open {
            self.remaining
        } else {
            0.0
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.auto
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    /// Advance the timer by `delta` seconds and emit the blink weight on a
    /// state transition.
    pub fn update(&mut self, delta: f32) {
        if self.remaining > 0.0 {
            self.remaining -= delta;
            return;
        }

        if self.is_open && self.auto {
            self.close();
            return;
        }

        self.open();
    }

    fn close(&mut self) {
        self.is_open = false;
        self.remaining = BLINK_CLOSE_MAX;
        self.sink.set_weight(ExpressionChannel::Blink, 1.0);
    }

    fn open(&mut self) {
        self.is_open = true;
        self.remaining = BLINK_OPEN_MAX;
        self.sink.set_weight(ExpressionChannel::Blink, 0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::WeightTable;

    fn blink() -> (AutoBlink, Arc<WeightTable>) {
        let table = Arc::new(WeightTable::default());
        (AutoBlink::new(table.clone()), table)
    }

    #[test]
    fn starts_open_with_auto_enabled() {
        let (blink, _) = blink();
        assert!(blink.is_open());
        assert!(blink.is_enabled());
    }

    #[test]
    fn closes_on_expiry_then_reopens_after_close_max() {
        let (mut blink, table) = blink();

        blink.update(0.016);
        assert!(!blink.is_open());
        assert_eq!(table.get(ExpressionChannel::Blink), 1.0);

        // Still inside the closed window: the tick only decrements.
        blink.update(BLINK_CLOSE_MAX / 2.0);
        assert!(!blink.is_open());

        blink.update(BLINK_CLOSE_MAX);
        blink.update(0.0);
        assert!(blink.is_open());
        assert_eq!(table.get(ExpressionChannel::Blink), 0.0);
    }

    #[test]
    fn never_stays_closed_longer_than_close_max() {
        let (mut blink, _) = blink();
        blink.update(0.016);
        assert!(!blink.is_open());

        let mut closed_for = 0.0;
        let step = 0.016;
        while !blink.is_open() {
            blink.update(step);
            closed_for += step;
            assert!(closed_for <= BLINK_CLOSE_MAX + 2.0 * step);
        }
    }

    #[test]
    fn reopens_even_when_auto_is_disabled() {
        let (mut blink, table) = blink();
        blink.update(0.016);
        assert!(!blink.is_open());

        let wait = blink.set_enabled(false);
        assert!(wait > 0.0);

        blink.update(wait);
        blink.update(0.0);
        assert!(blink.is_open());
        assert_eq!(table.get(ExpressionChannel::Blink), 0.0);

        // Disabled and open: expiry keeps re-arming the open state.
        blink.update(BLINK_OPEN_MAX + 1.0);
        blink.update(0.0);
        assert!(blink.is_open());
    }

    #[test]
    fn set_enabled_returns_zero_when_already_open() {
        let (mut blink, _) = blink();
        assert_eq!(blink.set_enabled(false), 0.0);
    }

    #[test]
    fn stays_open_while_enabled_no_longer_than_open_max() {
        let (mut blink, _) = blink();
        // First expiry closes immediately from the initial state.
        blink.update(0.016);
        // Walk one full closed→open cycle, then measure the open window.
        blink.update(BLINK_CLOSE_MAX + 0.001);
        blink.update(0.0);
        assert!(blink.is_open());

        let mut open_for = 0.0;
        let step = 0.1;
        while blink.is_open() {
            blink.update(step);
            open_for += step;
            assert!(open_for <= BLINK_OPEN_MAX + 2.0 * step);
        }
    }
}
