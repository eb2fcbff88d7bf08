//! In-memory output backend.
//!
//! `SimBackend` hands out voices that produce no sound but record everything
//! the engine does to them: volume writes, play/stop instants, looping and
//! the applied config. The headless runner and the tests play through it.

use std::collections::HashMap;
use std::sync::Arc;

use cadence_core::{AudioBuffer, PlaybackConfig};
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::trace;

use crate::mixer::MixerBus;
use crate::voice::{Voice, VoiceFactory};

/// Recorded state of one simulated voice.
#[derive(Debug, Default)]
struct SimVoiceState {
    clip: Option<AudioBuffer>,
    playing: bool,
    looping: bool,
    volume: f32,
    config: Option<PlaybackConfig>,
    volume_writes: Vec<f32>,
    started_at: Option<Instant>,
    stopped_at: Option<Instant>,
    play_count: usize,
}

impl SimVoiceState {
    /// A non-looping clip stops on its own once its duration has passed.
    /// Voices without a clip report the raw play flag.
    fn is_playing(&self) -> bool {
        if !self.playing {
            return false;
        }
        match (&self.clip, self.started_at) {
            (Some(clip), Some(started)) => self.looping || started.elapsed() < clip.duration(),
            _ => true,
        }
    }
}

struct SimVoice {
    slot: usize,
    state: Arc<Mutex<SimVoiceState>>,
}

impl Voice for SimVoice {
    fn set_clip(&mut self, clip: Option<AudioBuffer>) {
        self.state.lock().clip = clip;
    }

    fn play(&mut self) {
        let mut state = self.state.lock();
        state.playing = true;
        state.started_at = Some(Instant::now());
        state.play_count += 1;
        trace!("sim voice {} playing", self.slot);
    }

    fn stop(&mut self) {
        let mut state = self.state.lock();
        if state.playing {
            state.playing = false;
            state.stopped_at = Some(Instant::now());
            trace!("sim voice {} stopped", self.slot);
        }
    }

    fn is_playing(&self) -> bool {
        self.state.lock().is_playing()
    }

    fn volume(&self) -> f32 {
        self.state.lock().volume
    }

    fn set_volume(&mut self, volume: f32) {
        let mut state = self.state.lock();
        state.volume = volume;
        state.volume_writes.push(volume);
    }

    fn is_looping(&self) -> bool {
        self.state.lock().looping
    }

    fn set_looping(&mut self, looping: bool) {
        self.state.lock().looping = looping;
    }

    fn configure(&mut self, config: &PlaybackConfig) {
        let mut state = self.state.lock();
        state.volume = config.volume;
        state.volume_writes.push(config.volume);
        state.config = Some(config.clone());
    }
}

/// Read-only view of a simulated voice.
#[derive(Debug, Clone)]
pub struct VoiceProbe(Arc<Mutex<SimVoiceState>>);

impl VoiceProbe {
    pub fn is_playing(&self) -> bool {
        self.0.lock().is_playing()
    }

    pub fn is_looping(&self) -> bool {
        self.0.lock().looping
    }

    pub fn volume(&self) -> f32 {
        self.0.lock().volume
    }

    /// Every volume write since creation (or the last clear), in order.
    pub fn volume_writes(&self) -> Vec<f32> {
        self.0.lock().volume_writes.clone()
    }

    pub fn clear_volume_writes(&self) {
        self.0.lock().volume_writes.clear();
    }

    /// Key of the clip currently assigned.
    pub fn clip_key(&self) -> Option<String> {
        self.0
            .lock()
            .clip
            .as_ref()
            .map(|clip| clip.source().key().to_string())
    }

    pub fn config(&self) -> Option<PlaybackConfig> {
        self.0.lock().config.clone()
    }

    /// When the most recent `play` happened.
    pub fn started_at(&self) -> Option<Instant> {
        self.0.lock().started_at
    }

    /// When the voice was last stopped explicitly.
    pub fn stopped_at(&self) -> Option<Instant> {
        self.0.lock().stopped_at
    }

    pub fn play_count(&self) -> usize {
        self.0.lock().play_count
    }
}

/// Voice factory producing simulated voices.
#[derive(Debug, Default)]
pub struct SimBackend {
    voices: Mutex<Vec<VoiceProbe>>,
}

impl SimBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Probe the voice created for pool slot `slot`.
    pub fn probe(&self, slot: usize) -> Option<VoiceProbe> {
        self.voices.lock().get(slot).cloned()
    }

    /// Number of voices created so far.
    pub fn voice_count(&self) -> usize {
        self.voices.lock().len()
    }
}

impl VoiceFactory for SimBackend {
    fn create_voice(&self, slot: usize) -> Box<dyn Voice> {
        let state = Arc::new(Mutex::new(SimVoiceState {
            volume: 1.0,
            ..SimVoiceState::default()
        }));

        let mut voices = self.voices.lock();
        if voices.len() <= slot {
            voices.resize_with(slot + 1, || VoiceProbe(Arc::default()));
        }
        voices[slot] = VoiceProbe(state.clone());

        Box::new(SimVoice { slot, state })
    }
}

/// Mixer bus recording the last value written to every exposed parameter.
#[derive(Debug, Clone, Default)]
pub struct SimMixerBus {
    parameters: Arc<Mutex<HashMap<String, f32>>>,
}

impl SimMixerBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last decibel value written to `name`.
    pub fn parameter(&self, name: &str) -> Option<f32> {
        self.parameters.lock().get(name).copied()
    }
}

impl MixerBus for SimMixerBus {
    fn set_parameter(&mut self, name: &str, decibels: f32) {
        self.parameters.lock().insert(name.to_string(), decibels);
    }
}
