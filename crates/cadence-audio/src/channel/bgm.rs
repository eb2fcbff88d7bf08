//! Background music channel.

use std::sync::Arc;

use cadence_core::{Cue, Result};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::emitter::{EmitterHandle, StopHandle};
use crate::loader::{AssetLoader, LoadedClip};
use crate::pool::EmitterPool;

struct BgmState<L: AssetLoader> {
    current: Option<EmitterHandle>,
    clip: Option<LoadedClip<L>>,
    /// Stop sequences of earlier emitters that may still be fading out.
    stopping: Vec<StopHandle>,
    enabled: bool,
}

/// Single-slot music channel.
///
/// Plays are serialized: a play that arrives while another is switching
/// waits for it. Only the first clip of a cue is used, and it loops until
/// stopped.
pub struct BgmChannel<L: AssetLoader> {
    pool: Arc<EmitterPool>,
    loader: Arc<L>,
    switch: tokio::sync::Mutex<()>,
    state: Mutex<BgmState<L>>,
}

impl<L: AssetLoader> BgmChannel<L> {
    pub fn new(pool: Arc<EmitterPool>, loader: Arc<L>) -> Self {
        Self {
            pool,
            loader,
            switch: tokio::sync::Mutex::new(()),
            state: Mutex::new(BgmState {
                current: None,
                clip: None,
                stopping: Vec::new(),
                enabled: true,
            }),
        }
    }

    /// Switch to `cue`.
    ///
    /// The previous emitter is stopped first. Without crossfade every earlier
    /// fade-out, including one started by [`BgmChannel::stop`], completes
    /// before the new cue starts; with crossfade both run at once.
    /// Returns `Ok(None)` for an empty cue, a clip that resolved to nothing,
    /// or a play that was stopped before its clip finished loading.
    pub async fn play(&self, cue: &Cue) -> Result<Option<EmitterHandle>> {
        let Some(reference) = cue.first_clip() else {
            warn!("Ignoring BGM play request for a cue without clips");
            return Ok(None);
        };

        let _switch = self.switch.lock().await;

        let (previous, mut stopping) = {
            let mut state = self.state.lock();
            if !state.enabled {
                debug!("BGM channel disabled, ignoring play request");
                return Ok(None);
            }
            state.stopping.retain(|stop| !stop.is_finished());
            (state.current.take(), std::mem::take(&mut state.stopping))
        };
        if let Some(previous) = previous {
            stopping.push(previous.stop());
        }
        if cue.config.crossfade {
            self.state.lock().stopping.extend(stopping);
        } else {
            for stop in stopping {
                stop.wait().await;
            }
        }

        let handle = self.pool.acquire()?;
        self.state.lock().current = Some(handle.clone());
        handle.set_looping(true);
        handle.configure(&cue.config);

        let clip = match LoadedClip::load(&self.loader, reference).await {
            Ok(clip) => clip,
            Err(e) => {
                warn!("Failed to load BGM clip {reference}: {e}");
                self.abandon(&handle).await;
                return Err(e);
            }
        };
        if clip.buffer().is_none() {
            warn!("BGM clip {reference} resolved to no audio");
            self.abandon(&handle).await;
            return Ok(None);
        }

        let is_current = self
            .state
            .lock()
            .current
            .as_ref()
            .is_some_and(|current| current.id() == handle.id());
        if !is_current || !handle.play(clip.buffer()) {
            debug!("BGM play of {reference} superseded while loading");
            return Ok(None);
        }

        // The outgoing clip is released only once the new one is audible.
        let previous_clip = self.state.lock().clip.replace(clip);
        drop(previous_clip);

        info!("BGM playing {reference} on {}", handle.id());
        Ok(Some(handle))
    }

    /// Stop the current music without waiting for the fade-out.
    pub fn stop(&self) -> Option<StopHandle> {
        let current = self.state.lock().current.take()?;
        debug!("Stopping BGM on {}", current.id());
        let stop = current.stop();
        self.state.lock().stopping.push(stop.clone());
        Some(stop)
    }

    /// The emitter playing music, if any.
    pub fn current(&self) -> Option<EmitterHandle> {
        self.state.lock().current.clone()
    }

    /// Stop playback, release the held clip and reject further plays.
    pub fn shutdown(&self) -> Option<StopHandle> {
        self.state.lock().enabled = false;
        let stop = self.stop();
        let clip = self.state.lock().clip.take();
        drop(clip);
        stop
    }

    /// Give up on `handle` after a failed load and hand it back to the pool.
    async fn abandon(&self, handle: &EmitterHandle) {
        {
            let mut state = self.state.lock();
            if state
                .current
                .as_ref()
                .is_some_and(|current| current.id() == handle.id())
            {
                state.current = None;
            }
        }
        handle.stop().wait().await;
    }
}

impl<L: AssetLoader> std::fmt::Debug for BgmChannel<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("BgmChannel")
            .field("current", &state.current.as_ref().map(EmitterHandle::id))
            .field("clip", &state.clip)
            .field("stopping", &state.stopping.len())
            .field("enabled", &state.enabled)
            .finish_non_exhaustive()
    }
}
