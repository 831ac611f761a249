use std::time::Duration;
use tokio::time::{interval, Instant, Interval, MissedTickBehavior};

/// Fixed-period ticker for the ramp loop.
pub(crate) struct Timer {
    interval: Interval,
    last_tick: Instant,
}

impl Timer {
    pub async fn new(interval_dur: Duration) -> Self {
        let mut interval = interval(interval_dur);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // NOTE: First tick completes instantly
        interval.tick().await;
        Self {
            interval,
            last_tick: Instant::now(),
        }
    }

    /// Wait for the next tick, returning the time since the previous one.
    pub async fn tick(&mut self) -> Duration {
        self.interval.tick().await;
        let now = Instant::now();
        let elapsed = now - self.last_tick;
        self.last_tick = now;
        elapsed
    }

    /// How far `elapsed` overshot the period, once it is more than a full period late.
    pub fn lag(&self, elapsed: Duration) -> Option<Duration> {
        let period = self.interval.period();
        (elapsed > period * 2).then(|| elapsed - period)
    }
}
