//! Tick-driven volume ramps.
//!
//! Both ramps snapshot the voice volume once when they start and re-sample
//! the frame clock every tick until the fade time has elapsed. A zero
//! duration returns at once without touching the voice.

use std::time::Duration;

use parking_lot::Mutex;

use crate::clock::Clock;
use crate::voice::Voice;

/// Duration and time base of one fade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FadeSettings {
    pub duration: Duration,
    pub ignore_time_scale: bool,
}

impl FadeSettings {
    pub const fn new(duration: Duration, ignore_time_scale: bool) -> Self {
        Self {
            duration,
            ignore_time_scale,
        }
    }

    /// Build from a duration in seconds. Negative or invalid values mean no fade.
    pub fn from_secs(seconds: f32, ignore_time_scale: bool) -> Self {
        let duration = Duration::try_from_secs_f32(seconds).unwrap_or_default();
        Self::new(duration, ignore_time_scale)
    }

    pub const fn is_instant(&self) -> bool {
        self.duration.is_zero()
    }
}

/// Ramp the voice from silence up to the volume it had when the fade began.
pub async fn fade_in(voice: &Mutex<Box<dyn Voice>>, clock: &Clock, fade: FadeSettings) {
    if fade.is_instant() {
        return;
    }

    let target = {
        let mut voice = voice.lock();
        let target = voice.volume();
        voice.set_volume(0.0);
        target
    };
    ramp(voice, clock, fade, 0.0, target).await;
}

/// Ramp the voice down to silence, then stop it.
pub async fn fade_out(voice: &Mutex<Box<dyn Voice>>, clock: &Clock, fade: FadeSettings) {
    if fade.is_instant() {
        return;
    }

    let start = voice.lock().volume();
    ramp(voice, clock, fade, start, 0.0).await;
    voice.lock().stop();
}

pub(crate) async fn ramp(
    voice: &Mutex<Box<dyn Voice>>,
    clock: &Clock,
    fade: FadeSettings,
    from: f32,
    to: f32,
) {
    let total = fade.duration.as_secs_f64();
    let mut elapsed = Duration::ZERO;

    while elapsed < fade.duration {
        elapsed += clock.tick().await.get(fade.ignore_time_scale);
        let t = (elapsed.as_secs_f64() / total).min(1.0) as f32;
        voice.lock().set_volume(lerp(from, to, t));
    }
}

fn lerp(from: f32, to: f32, t: f32) -> f32 {
    (to - from).mul_add(t, from)
}
