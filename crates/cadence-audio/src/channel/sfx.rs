//! Sound effect channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cadence_core::{ClipSelector, Cue, Result};
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, trace, warn};

use crate::clock::Clock;
use crate::emitter::{EmitterHandle, EmitterId, StopHandle};
use crate::loader::{AssetLoader, LoadedClip};
use crate::pool::EmitterPool;

/// Outcome of one SFX cue traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SfxPlayback {
    /// Emitter lease the cue played on.
    pub emitter: EmitterId,
    /// Clips that actually started.
    pub clips_played: usize,
    /// Whether a channel stop ended the traversal.
    pub interrupted: bool,
}

/// Multi-slot effects channel.
///
/// Every play runs its own traversal on its own emitter. A channel stop
/// interrupts every traversal that started before it; plays that start
/// afterwards are unaffected.
pub struct SfxChannel<L: AssetLoader> {
    pool: Arc<EmitterPool>,
    loader: Arc<L>,
    clock: Arc<Clock>,
    /// Bumped by every channel stop.
    stop_generation: watch::Sender<u64>,
    active: Mutex<Vec<EmitterHandle>>,
    enabled: AtomicBool,
}

/// Keeps an emitter tracked while a traversal runs; untracks and releases
/// it however the traversal ends.
struct ActiveEmitter<'a> {
    pool: &'a EmitterPool,
    active: &'a Mutex<Vec<EmitterHandle>>,
    handle: EmitterHandle,
}

impl Drop for ActiveEmitter<'_> {
    fn drop(&mut self) {
        let id = self.handle.id();
        self.active.lock().retain(|handle| handle.id() != id);
        self.pool.release(id);
    }
}

impl<L: AssetLoader> SfxChannel<L> {
    pub fn new(pool: Arc<EmitterPool>, loader: Arc<L>, clock: Arc<Clock>) -> Self {
        Self {
            pool,
            loader,
            clock,
            stop_generation: watch::Sender::new(0),
            active: Mutex::new(Vec::new()),
            enabled: AtomicBool::new(true),
        }
    }

    /// Play `cue`, walking its clips with the cue's selector.
    ///
    /// Resolves once the traversal ends: the selector ran out, the channel
    /// was stopped, or a load failed. Endless selectors run until stopped.
    pub async fn play(&self, cue: &Cue) -> Result<Option<SfxPlayback>> {
        self.play_with(cue, cue.selector()).await
    }

    /// Play `cue` with an explicit selector traversal.
    pub async fn play_with(
        &self,
        cue: &Cue,
        mut selector: ClipSelector<'_>,
    ) -> Result<Option<SfxPlayback>> {
        if cue.is_empty() {
            warn!("Ignoring SFX play request for a cue without clips");
            return Ok(None);
        }
        if !self.enabled.load(Ordering::Acquire) {
            debug!("SFX channel disabled, ignoring play request");
            return Ok(None);
        }

        let mut stop_rx = self.stop_generation.subscribe();
        let generation = *stop_rx.borrow_and_update();

        let active = ActiveEmitter {
            pool: &self.pool,
            active: &self.active,
            handle: self.pool.acquire()?,
        };
        self.active.lock().push(active.handle.clone());
        let handle = &active.handle;
        handle.configure(&cue.config);

        let ignore_time_scale = cue.config.ignore_time_scale;
        let mut held: Option<LoadedClip<L>> = None;
        let mut clips_played = 0;
        let mut interrupted = false;

        loop {
            if *stop_rx.borrow() != generation {
                interrupted = true;
                break;
            }
            let Some(reference) = selector.next_clip() else {
                break;
            };

            let clip = LoadedClip::load(&self.loader, reference).await?;
            let buffer = clip.buffer().cloned();
            // Replacing the held clip releases the previous one.
            held = Some(clip);

            if *stop_rx.borrow() != generation {
                interrupted = true;
                break;
            }
            let Some(buffer) = buffer else {
                warn!("SFX clip {reference} resolved to no audio, skipping");
                self.clock.tick().await;
                continue;
            };

            if !handle.play(Some(&buffer)) {
                interrupted = true;
                break;
            }
            clips_played += 1;
            trace!("SFX {reference} playing on {}", handle.id());

            tokio::select! {
                () = self.clock.wait(buffer.duration(), ignore_time_scale) => {}
                () = stop_requested(&mut stop_rx, generation) => {
                    interrupted = true;
                    break;
                }
            }
        }

        drop(held);
        let playback = SfxPlayback {
            emitter: handle.id(),
            clips_played,
            interrupted,
        };
        debug!(
            "SFX cue finished on {} after {} clips (interrupted: {})",
            playback.emitter, playback.clips_played, playback.interrupted
        );
        Ok(Some(playback))
    }

    /// Stop every running traversal without waiting for the fade-outs.
    pub fn stop(&self) -> Vec<StopHandle> {
        self.stop_generation.send_modify(|generation| *generation += 1);
        let active = std::mem::take(&mut *self.active.lock());
        debug!("Stopping {} SFX emitters", active.len());
        active.iter().map(EmitterHandle::stop).collect()
    }

    /// Emitters currently running a traversal.
    pub fn active(&self) -> Vec<EmitterHandle> {
        self.active.lock().clone()
    }

    /// Stop everything and reject further plays.
    pub fn shutdown(&self) -> Vec<StopHandle> {
        self.enabled.store(false, Ordering::Release);
        self.stop()
    }
}

async fn stop_requested(rx: &mut watch::Receiver<u64>, generation: u64) {
    // The sender lives as long as the channel, so an error cannot outlive it.
    let _ = rx.wait_for(|current| *current != generation).await;
}

impl<L: AssetLoader> std::fmt::Debug for SfxChannel<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SfxChannel")
            .field("active", &self.active.lock().len())
            .field("stop_generation", &*self.stop_generation.borrow())
            .field("enabled", &self.enabled.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}
