//! Frame tick for hosts without their own render loop.
//!
//! Render hosts normally call [`Character::update`] from their frame callback
//! with the real frame delta. `FrameDriver` provides that cadence as a tokio
//! task for headless and CLI use.

use crate::character::Character;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Tick rate of the expression clock (default 60).
    pub fps: u32,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self { fps: 60 }
    }
}

/// Ticks `Character::update` with measured deltas until stopped or dropped.
pub struct FrameDriver {
    task: JoinHandle<()>,
}

impl FrameDriver {
    pub fn start(character: Character, config: FrameConfig) -> Self {
        let period = Duration::from_secs_f64(1.0 / f64::from(config.fps.max(1)));
        let task = tokio::spawn(async move {
            let mut ticker = time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; it seeds the clock.
            ticker.tick().await;
            let mut last = Instant::now();
            loop {
                ticker.tick().await;
                let now = Instant::now();
                let delta = (now - last).as_secs_f32();
                last = now;
                character.update(delta);
            }
        });
        Self { task }
    }

    /// Stop ticking. Dropping the driver has the same effect.
    pub fn stop(self) {
        self.task.abort();
    }
}

impl Drop for FrameDriver {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::{ExpressionChannel, WeightTable};
    use crate::playback::SilentPlayer;
    use std::sync::Arc;
    use tokio::time::{advance, sleep};

    #[tokio::test(start_paused = true)]
    async fn driver_ticks_the_blink_timer() {
        let table = Arc::new(WeightTable::default());
        let character = Character::new(Arc::new(SilentPlayer), table.clone());
        let driver = FrameDriver::start(character, FrameConfig::default());

        // A few frames in (paused clock auto-advances through the ticks),
        // the first blink close must have fired.
        sleep(Duration::from_millis(100)).await;
        assert_eq!(table.get(ExpressionChannel::Blink), 1.0);

        driver.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_driver_stops_ticking() {
        let table = Arc::new(WeightTable::default());
        let character = Character::new(Arc::new(SilentPlayer), table.clone());
        let driver = FrameDriver::start(character, FrameConfig { fps: 30 });
        drop(driver);

        advance(Duration::from_secs(10)).await;
        sleep(Duration::from_millis(1)).await;
        assert_eq!(table.get(ExpressionChannel::Blink), 0.0);
    }
}
