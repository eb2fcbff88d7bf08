//! Playback configuration applied to an emitter when a cue starts.

use serde::{Deserialize, Serialize};

/// Voice priority. Lower values win when the backend runs out of voices.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Highest,
    High,
    #[default]
    Standard,
    Low,
    VeryLow,
}

impl Priority {
    /// Numeric priority as understood by the voice backend.
    pub const fn value(self) -> i32 {
        match self {
            Self::Highest => 0,
            Self::High => 64,
            Self::Standard => 128,
            Self::Low => 194,
            Self::VeryLow => 256,
        }
    }
}

/// Distance attenuation curve.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RolloffMode {
    #[default]
    Logarithmic,
    Linear,
    Custom,
}

/// How a single clip plays: levels, spatialisation, fades and routing flags.
///
/// Authored as static data and never mutated by the engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Mixer bus the voice is routed to. `None` routes to the master output.
    pub mixer_bus: Option<String>,
    pub priority: Priority,

    /// Fade-in time in seconds.
    pub fade_in: f32,
    /// Fade-out time in seconds.
    pub fade_out: f32,
    /// Overlap the outgoing BGM fade-out with this cue's fade-in.
    pub crossfade: bool,
    /// Fades and clip waits run on unscaled time.
    pub ignore_time_scale: bool,

    pub volume: f32,
    pub pitch: f32,
    pub stereo_pan: f32,
    pub reverb_zone_mix: f32,

    pub spatial_blend: f32,
    pub rolloff: RolloffMode,
    pub min_distance: f32,
    pub max_distance: f32,
    pub spread: u16,
    pub doppler_level: f32,

    pub bypass_effects: bool,
    pub bypass_listener_effects: bool,
    pub bypass_reverb_zones: bool,
    pub ignore_listener_volume: bool,
    pub ignore_listener_pause: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            mixer_bus: None,
            priority: Priority::Standard,
            fade_in: 0.0,
            fade_out: 0.0,
            crossfade: false,
            ignore_time_scale: false,
            volume: 1.0,
            pitch: 1.0,
            stereo_pan: 0.0,
            reverb_zone_mix: 1.0,
            spatial_blend: 1.0,
            rolloff: RolloffMode::Logarithmic,
            min_distance: 0.1,
            max_distance: 50.0,
            spread: 0,
            doppler_level: 1.0,
            bypass_effects: false,
            bypass_listener_effects: false,
            bypass_reverb_zones: false,
            ignore_listener_volume: false,
            ignore_listener_pause: false,
        }
    }
}

impl PlaybackConfig {
    /// Set fade-in and fade-out times in seconds.
    #[must_use]
    pub const fn with_fades(mut self, fade_in: f32, fade_out: f32) -> Self {
        self.fade_in = fade_in;
        self.fade_out = fade_out;
        self
    }

    #[must_use]
    pub const fn with_crossfade(mut self, crossfade: bool) -> Self {
        self.crossfade = crossfade;
        self
    }

    #[must_use]
    pub const fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume;
        self
    }

    #[must_use]
    pub fn with_mixer_bus(mut self, bus: impl Into<String>) -> Self {
        self.mixer_bus = Some(bus.into());
        self
    }

    /// Copy with every ranged field clamped into its authoring range.
    #[must_use]
    pub fn clamped(&self) -> Self {
        let min_distance = self.min_distance.clamp(0.01, 5.0);
        Self {
            fade_in: self.fade_in.max(0.0),
            fade_out: self.fade_out.max(0.0),
            volume: self.volume.clamp(0.0, 1.0),
            pitch: self.pitch.clamp(-3.0, 3.0),
            stereo_pan: self.stereo_pan.clamp(-1.0, 1.0),
            reverb_zone_mix: self.reverb_zone_mix.clamp(0.0, 1.1),
            spatial_blend: self.spatial_blend.clamp(0.0, 1.0),
            min_distance,
            max_distance: self.max_distance.clamp(5.0, 100.0),
            spread: self.spread.min(360),
            doppler_level: self.doppler_level.clamp(0.0, 5.0),
            ..self.clone()
        }
    }
}
