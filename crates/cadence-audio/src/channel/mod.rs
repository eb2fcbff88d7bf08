//! Playback channels.
//!
//! The BGM channel holds at most one emitter and switches between cues
//! with optional crossfade. The SFX channel runs any number of concurrent
//! cue traversals, each on its own emitter.

mod bgm;
mod sfx;

pub use bgm::BgmChannel;
pub use sfx::{SfxChannel, SfxPlayback};
