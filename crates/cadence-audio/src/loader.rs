//! Asset loading capability and load/release bookkeeping.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cadence_core::{AssetReference, AudioBuffer, Error, Result};
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, trace};

/// Resolves asset references into playable buffers.
///
/// `load` may suspend. `Ok(None)` means the reference resolved to nothing
/// playable; the engine skips that clip (SFX) or aborts the play (BGM).
/// `release` must tolerate references that were never loaded or were
/// already released.
pub trait AssetLoader: Send + Sync + 'static {
    fn load(
        &self,
        reference: &AssetReference,
    ) -> impl Future<Output = Result<Option<AudioBuffer>>> + Send;

    fn release(&self, reference: &AssetReference);
}

/// A successful load, released exactly once when dropped.
pub struct LoadedClip<L: AssetLoader> {
    loader: Arc<L>,
    reference: AssetReference,
    buffer: Option<AudioBuffer>,
}

impl<L: AssetLoader> LoadedClip<L> {
    /// Load `reference` through `loader`.
    ///
    /// A failed load has nothing to release, so errors come back bare.
    pub async fn load(loader: &Arc<L>, reference: &AssetReference) -> Result<Self> {
        let buffer = loader.load(reference).await?;
        Ok(Self {
            loader: loader.clone(),
            reference: reference.clone(),
            buffer,
        })
    }

    pub const fn reference(&self) -> &AssetReference {
        &self.reference
    }

    /// The loaded buffer, if the reference resolved to one.
    pub const fn buffer(&self) -> Option<&AudioBuffer> {
        self.buffer.as_ref()
    }
}

impl<L: AssetLoader> Drop for LoadedClip<L> {
    fn drop(&mut self) {
        trace!("Releasing asset {}", self.reference);
        self.loader.release(&self.reference);
    }
}

impl<L: AssetLoader> std::fmt::Debug for LoadedClip<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedClip")
            .field("reference", &self.reference)
            .field("loaded", &self.buffer.is_some())
            .finish()
    }
}

/// In-memory asset registry with per-reference ref counts.
///
/// Unknown references fail with [`Error::AssetNotFound`]. References
/// registered with [`MemoryAssetLoader::insert_unresolvable`] load as
/// `Ok(None)`.
#[derive(Debug, Default)]
pub struct MemoryAssetLoader {
    assets: DashMap<AssetReference, Option<AudioBuffer>>,
    ref_counts: DashMap<AssetReference, usize>,
    latency: RwLock<Duration>,
    loads: AtomicUsize,
    releases: AtomicUsize,
}

impl MemoryAssetLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a buffer under its source reference.
    pub fn insert(&self, buffer: AudioBuffer) {
        self.assets.insert(buffer.source().clone(), Some(buffer));
    }

    /// Register a silent clip of the given length.
    pub fn insert_silence(&self, key: &str, duration: Duration) {
        self.insert(AudioBuffer::silence(key.into(), duration, 1000, 1));
    }

    /// Register a reference that resolves to no buffer.
    pub fn insert_unresolvable(&self, key: &str) {
        self.assets.insert(key.into(), None);
    }

    /// Delay every load by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.write() = latency;
    }

    /// Outstanding loads for `reference`.
    pub fn ref_count(&self, reference: &AssetReference) -> usize {
        self.ref_counts.get(reference).map_or(0, |count| *count)
    }

    /// Outstanding loads across all references.
    pub fn outstanding(&self) -> usize {
        self.ref_counts.iter().map(|entry| *entry.value()).sum()
    }

    /// Successful loads since creation.
    pub fn total_loads(&self) -> usize {
        self.loads.load(Ordering::Acquire)
    }

    /// Releases that decremented a count since creation.
    pub fn total_releases(&self) -> usize {
        self.releases.load(Ordering::Acquire)
    }
}

impl AssetLoader for MemoryAssetLoader {
    async fn load(&self, reference: &AssetReference) -> Result<Option<AudioBuffer>> {
        let latency = *self.latency.read();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let buffer = self
            .assets
            .get(reference)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::AssetNotFound(reference.to_string()))?;

        *self.ref_counts.entry(reference.clone()).or_insert(0) += 1;
        self.loads.fetch_add(1, Ordering::AcqRel);
        debug!("Loaded asset {reference}");
        Ok(buffer)
    }

    fn release(&self, reference: &AssetReference) {
        if let Some(mut count) = self.ref_counts.get_mut(reference) {
            if *count > 0 {
                *count -= 1;
                self.releases.fetch_add(1, Ordering::AcqRel);
            }
        }
    }
}
