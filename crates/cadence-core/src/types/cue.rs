//! Audio cues: what to play and how.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{AssetReference, ClipSelector, PlaybackConfig, SelectorKind};
use crate::{Error, Result};

/// A playable unit: an ordered list of clips sharing one playback config.
///
/// BGM channels only ever play the first clip. SFX channels walk the list
/// with [`SelectorKind`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Cue {
    /// Clips in authoring order.
    pub clips: Vec<AssetReference>,
    /// Shared playback configuration.
    #[serde(default)]
    pub config: PlaybackConfig,
    /// Clip selection strategy (SFX only).
    #[serde(default)]
    pub selector: SelectorKind,
}

impl Cue {
    pub fn new(clips: Vec<AssetReference>, config: PlaybackConfig) -> Self {
        Self {
            clips,
            config,
            selector: SelectorKind::default(),
        }
    }

    /// Create a single-clip cue with the default config.
    pub fn single(clip: impl Into<AssetReference>) -> Self {
        Self::new(vec![clip.into()], PlaybackConfig::default())
    }

    #[must_use]
    pub const fn with_selector(mut self, selector: SelectorKind) -> Self {
        self.selector = selector;
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: PlaybackConfig) -> Self {
        self.config = config;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    /// The clip BGM playback uses.
    pub fn first_clip(&self) -> Option<&AssetReference> {
        self.clips.first()
    }

    /// Start a fresh clip traversal.
    pub fn selector(&self) -> ClipSelector<'_> {
        ClipSelector::new(self)
    }
}

/// Named cues, as authored in a cue sheet file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct CueSheet {
    cues: BTreeMap<String, Cue>,
}

impl CueSheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a cue sheet from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a cue sheet file.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json).map_err(|e| {
            Error::Config(format!("Invalid cue sheet {}: {e}", path.display()))
        })
    }

    pub fn insert(&mut self, name: impl Into<String>, cue: Cue) {
        self.cues.insert(name.into(), cue);
    }

    pub fn get(&self, name: &str) -> Option<&Cue> {
        self.cues.get(name)
    }

    /// Iterate cues in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Cue)> {
        self.cues.iter().map(|(name, cue)| (name.as_str(), cue))
    }

    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }
}
