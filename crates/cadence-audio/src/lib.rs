//! # cadence-audio
//!
//! Audio cue playback engine for Cadence.
//!
//! Features:
//! - Pooled emitters, one voice each, reused across plays
//! - Tick-driven fade-in/fade-out ramps with optional unscaled time
//! - Single-slot BGM channel with crossfade and looping
//! - Multi-slot SFX channel walking cues with clip selectors
//! - Mixer bus volume/mute settings with decibel mapping

pub mod channel;
pub mod clock;
pub mod config;
pub mod emitter;
pub mod events;
pub mod fade;
pub mod loader;
pub mod manager;
pub mod mixer;
pub mod pool;
pub mod sim;
pub mod voice;

pub use channel::{BgmChannel, SfxChannel, SfxPlayback};
pub use clock::{Clock, FrameDelta};
pub use config::{EngineConfig, MixerConfig, PoolConfig};
pub use emitter::{EmitterHandle, EmitterId, EmitterState, StopHandle};
pub use events::{ChannelKind, EngineEvent};
pub use fade::FadeSettings;
pub use loader::{AssetLoader, LoadedClip, MemoryAssetLoader};
pub use manager::{request_channel, AudioManager, AudioRequest, RequestReceiver, RequestSender};
pub use mixer::{volume_to_decibels, BusDefinition, BusSetting, MixerBus, MixerSettings};
pub use pool::{EmitterPool, PoolStats};
pub use sim::{SimBackend, SimMixerBus, VoiceProbe};
pub use voice::{Voice, VoiceFactory};
