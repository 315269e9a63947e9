//! Inference cadence.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

/// Periodic tick whose period follows a watch channel.
///
/// A period change restarts the schedule: the next tick fires one new period
/// after the change. Must be created inside a tokio runtime.
pub struct InferenceTimer {
    interval: Interval,
    period: Duration,
    updates: watch::Receiver<Duration>,
    open: bool,
}

impl InferenceTimer {
    pub fn new(mut updates: watch::Receiver<Duration>) -> Self {
        let period = *updates.borrow_and_update();
        Self {
            interval: schedule(period),
            period,
            updates,
            open: true,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Wait for the next tick.
    pub async fn tick(&mut self) -> Instant {
        loop {
            tokio::select! {
                instant = self.interval.tick() => return instant,
                changed = self.updates.changed(), if self.open => {
                    if changed.is_err() {
                        self.open = false;
                        continue;
                    }
                    let period = *self.updates.borrow_and_update();
                    if period != self.period {
                        tracing::debug!("Inference period changed from {:?} to {:?}", self.period, period);
                        self.period = period;
                        self.interval = schedule(period);
                    }
                }
            }
        }
    }
}

fn schedule(period: Duration) -> Interval {
    let period = period.max(Duration::from_millis(1));
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}
