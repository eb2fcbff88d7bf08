//! Hardware voice abstraction.

use cadence_core::{AudioBuffer, PlaybackConfig};

/// A single playback voice on the output backend.
///
/// Emitters own exactly one voice each and drive it from the engine tasks,
/// so implementations only need to be `Send`.
pub trait Voice: Send {
    /// Assign the clip the next `play` starts.
    fn set_clip(&mut self, clip: Option<AudioBuffer>);

    /// Start the assigned clip from the beginning.
    fn play(&mut self);

    /// Stop immediately.
    fn stop(&mut self);

    /// Whether audio is currently coming out of this voice.
    fn is_playing(&self) -> bool;

    /// Current linear volume (0.0 to 1.0).
    fn volume(&self) -> f32;

    fn set_volume(&mut self, volume: f32);

    fn is_looping(&self) -> bool;

    fn set_looping(&mut self, looping: bool);

    /// Apply levels, spatialisation and routing from a cue config.
    fn configure(&mut self, config: &PlaybackConfig);
}

/// Creates voices for the emitter pool.
pub trait VoiceFactory: Send + Sync {
    /// Create the voice backing pool slot `slot`.
    fn create_voice(&self, slot: usize) -> Box<dyn Voice>;
}
