//! Frame clock driving every cooperative wait in the engine.

use parking_lot::RwLock;
use std::time::Duration;
use tokio::time::Instant;

/// Default tick interval (roughly one 60 Hz frame).
pub const DEFAULT_TICK: Duration = Duration::from_millis(16);

/// Upper bound for the global time scale.
pub const MAX_TIME_SCALE: f32 = 100.0;

/// Time that passed during one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameDelta {
    /// Wall-clock time of the tick.
    pub unscaled: Duration,
    /// Tick time multiplied by the global time scale.
    pub scaled: Duration,
}

impl FrameDelta {
    /// Pick the delta a consumer should advance by.
    pub const fn get(self, ignore_time_scale: bool) -> Duration {
        if ignore_time_scale {
            self.unscaled
        } else {
            self.scaled
        }
    }
}

/// Tick source with a global time scale.
///
/// A time scale of 0 pauses everything that runs on scaled time.
#[derive(Debug)]
pub struct Clock {
    tick: Duration,
    time_scale: RwLock<f32>,
}

impl Clock {
    /// Create a clock ticking every `tick` (at least 1 ms).
    pub fn new(tick: Duration) -> Self {
        Self {
            tick: tick.max(Duration::from_millis(1)),
            time_scale: RwLock::new(1.0),
        }
    }

    pub const fn tick_interval(&self) -> Duration {
        self.tick
    }

    pub fn time_scale(&self) -> f32 {
        *self.time_scale.read()
    }

    /// Set the global time scale. Negative and NaN values clamp to 0.
    pub fn set_time_scale(&self, scale: f32) {
        *self.time_scale.write() = if scale.is_nan() {
            0.0
        } else {
            scale.clamp(0.0, MAX_TIME_SCALE)
        };
    }

    /// Suspend for one tick and report how much time passed.
    pub async fn tick(&self) -> FrameDelta {
        let start = Instant::now();
        tokio::time::sleep(self.tick).await;
        let unscaled = start.elapsed();
        let scale = self.time_scale();
        let scaled = if (scale - 1.0).abs() < f32::EPSILON {
            unscaled
        } else {
            Duration::from_secs_f64(unscaled.as_secs_f64() * f64::from(scale))
        };
        FrameDelta { unscaled, scaled }
    }

    /// Suspend until `duration` of (scaled or unscaled) frame time has passed.
    pub async fn wait(&self, duration: Duration, ignore_time_scale: bool) {
        let mut elapsed = Duration::ZERO;
        while elapsed < duration {
            elapsed += self.tick().await.get(ignore_time_scale);
        }
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new(DEFAULT_TICK)
    }
}
