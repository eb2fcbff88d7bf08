//! Core domain types for Cadence.

pub mod asset;
pub mod config;
pub mod cue;
pub mod selector;

pub use asset::{AssetReference, AudioBuffer};
pub use config::{PlaybackConfig, Priority, RolloffMode};
pub use cue::{Cue, CueSheet};
pub use selector::{ClipSelector, SelectorKind};
