//! Asset references and loaded audio buffers.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Opaque handle to a not-yet-loaded audio asset.
///
/// The reference itself carries no load state. Reference counting is the
/// loader's business: every load increments the count for this key and
/// every release decrements it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct AssetReference(Arc<str>);

impl AssetReference {
    pub fn new(key: impl AsRef<str>) -> Self {
        Self(Arc::from(key.as_ref()))
    }

    /// Get the asset key (address or GUID).
    pub fn key(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for AssetReference {
    fn from(key: String) -> Self {
        Self(Arc::from(key))
    }
}

impl From<&str> for AssetReference {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<AssetReference> for String {
    fn from(reference: AssetReference) -> Self {
        reference.0.to_string()
    }
}

/// A loaded, playable clip.
///
/// Samples are interleaved and shared, so cloning a buffer is cheap.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    source: AssetReference,
    samples: Arc<[f32]>,
    sample_rate: u32,
    channels: u16,
}

impl AudioBuffer {
    pub fn new(
        source: AssetReference,
        samples: impl Into<Arc<[f32]>>,
        sample_rate: u32,
        channels: u16,
    ) -> Self {
        Self {
            source,
            samples: samples.into(),
            sample_rate: sample_rate.max(1),
            channels: channels.max(1),
        }
    }

    /// Create a silent buffer of the given length.
    pub fn silence(
        source: AssetReference,
        duration: Duration,
        sample_rate: u32,
        channels: u16,
    ) -> Self {
        let frames = (duration.as_secs_f64() * f64::from(sample_rate)).round() as usize;
        let samples = vec![0.0f32; frames * usize::from(channels.max(1))];
        Self::new(source, samples, sample_rate, channels)
    }

    /// The asset this buffer was loaded from.
    pub const fn source(&self) -> &AssetReference {
        &self.source
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub const fn channels(&self) -> u16 {
        self.channels
    }

    /// Number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.samples.len() / usize::from(self.channels)
    }

    /// Natural playback length of the clip.
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frames() as f64 / f64::from(self.sample_rate))
    }
}
