//! Emitter pool.
//!
//! Slots live in an arena and are identified by index; a slot is either
//! free or leased. Emitters hand themselves back through a release queue
//! that the pool drains under its lock before every operation, so emitters
//! never hold a reference to the pool.

use std::sync::Arc;

use cadence_core::{Error, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::clock::Clock;
use crate::emitter::{Emitter, EmitterHandle, EmitterId};
use crate::events::EngineEvent;
use crate::voice::VoiceFactory;

struct Slot {
    emitter: Arc<Emitter>,
    in_use: bool,
}

/// Pool counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Emitters created over the pool's lifetime.
    pub created: usize,
    /// Successful acquisitions.
    pub acquisitions: usize,
    /// Releases that returned a leased slot to the free set.
    pub releases: usize,
}

#[derive(Default)]
struct PoolState {
    slots: Vec<Slot>,
    stats: PoolStats,
}

/// Reusable set of emitters.
pub struct EmitterPool {
    state: Mutex<PoolState>,
    factory: Arc<dyn VoiceFactory>,
    clock: Arc<Clock>,
    max_emitters: Option<usize>,
    release_tx: Sender<EmitterId>,
    release_rx: Receiver<EmitterId>,
    events: Option<Sender<EngineEvent>>,
}

impl EmitterPool {
    /// Create an empty pool. `max_emitters` of `None` lets the pool grow
    /// without bound.
    pub fn new(
        factory: Arc<dyn VoiceFactory>,
        clock: Arc<Clock>,
        max_emitters: Option<usize>,
    ) -> Self {
        Self::with_events(factory, clock, max_emitters, None)
    }

    pub(crate) fn with_events(
        factory: Arc<dyn VoiceFactory>,
        clock: Arc<Clock>,
        max_emitters: Option<usize>,
        events: Option<Sender<EngineEvent>>,
    ) -> Self {
        let (release_tx, release_rx) = unbounded();
        Self {
            state: Mutex::new(PoolState::default()),
            factory,
            clock,
            max_emitters,
            release_tx,
            release_rx,
            events,
        }
    }

    /// Lease a free emitter, creating one if none is available.
    ///
    /// Emitters that are still fading out are not handed out again until
    /// their stop completes.
    pub fn acquire(&self) -> Result<EmitterHandle> {
        let mut state = self.state.lock();
        self.drain_releases(&mut state);

        let free = state
            .slots
            .iter()
            .position(|slot| !slot.in_use && !slot.emitter.is_fading_out());

        let index = match free {
            Some(index) => index,
            None => {
                let index = state.slots.len();
                if self.max_emitters.is_some_and(|max| index >= max) {
                    warn!("Emitter pool exhausted at {index} emitters");
                    return Err(Error::PoolExhausted { max: index });
                }
                state.slots.push(self.create_slot(index));
                state.stats.created += 1;
                index
            }
        };

        let slot = &mut state.slots[index];
        slot.in_use = true;
        let id = slot.emitter.begin_lease();
        let handle = EmitterHandle::new(id, slot.emitter.clone());
        state.stats.acquisitions += 1;
        trace!("Acquired {id}");
        Ok(handle)
    }

    /// Return a lease to the pool. Stale or already released ids are ignored.
    pub fn release(&self, id: EmitterId) -> bool {
        let mut state = self.state.lock();
        self.drain_releases(&mut state);
        Self::release_locked(&mut state, id)
    }

    /// Return every leased slot without stopping playback.
    pub fn release_all(&self) {
        let mut state = self.state.lock();
        self.drain_releases(&mut state);

        let mut released = 0;
        for slot in state.slots.iter_mut().filter(|slot| slot.in_use) {
            slot.in_use = false;
            if let Some(generation) = slot.emitter.current_generation() {
                slot.emitter.end_lease(generation);
            }
            released += 1;
        }
        state.stats.releases += released;
        debug!("Released {released} emitters");
    }

    /// Pre-create emitters until the pool holds at least `count`.
    pub fn warm_up(&self, count: usize) {
        let mut state = self.state.lock();
        let target = self
            .max_emitters
            .map_or(count, |max| count.min(max));
        while state.slots.len() < target {
            let index = state.slots.len();
            state.slots.push(self.create_slot(index));
            state.stats.created += 1;
        }
        debug!("Emitter pool warmed up to {} emitters", state.slots.len());
    }

    pub fn len(&self) -> usize {
        self.state.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn in_use_count(&self) -> usize {
        let mut state = self.state.lock();
        self.drain_releases(&mut state);
        state.slots.iter().filter(|slot| slot.in_use).count()
    }

    pub fn free_count(&self) -> usize {
        let mut state = self.state.lock();
        self.drain_releases(&mut state);
        state.slots.iter().filter(|slot| !slot.in_use).count()
    }

    pub fn stats(&self) -> PoolStats {
        let mut state = self.state.lock();
        self.drain_releases(&mut state);
        state.stats
    }

    pub const fn max_emitters(&self) -> Option<usize> {
        self.max_emitters
    }

    fn create_slot(&self, index: usize) -> Slot {
        trace!("Creating emitter {index}");
        let voice = self.factory.create_voice(index);
        let emitter = Emitter::new(
            index,
            voice,
            self.clock.clone(),
            self.release_tx.clone(),
            self.events.clone(),
        );
        Slot {
            emitter: Arc::new(emitter),
            in_use: false,
        }
    }

    fn drain_releases(&self, state: &mut PoolState) {
        for id in self.release_rx.try_iter() {
            Self::release_locked(state, id);
        }
    }

    fn release_locked(state: &mut PoolState, id: EmitterId) -> bool {
        let Some(slot) = state.slots.get_mut(id.slot) else {
            return false;
        };
        if !slot.in_use || !slot.emitter.end_lease(id.generation) {
            return false;
        }
        slot.in_use = false;
        state.stats.releases += 1;
        trace!("Released {id}");
        true
    }
}

impl std::fmt::Debug for EmitterPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("EmitterPool")
            .field("len", &state.slots.len())
            .field("stats", &state.stats)
            .field("max_emitters", &self.max_emitters)
            .finish_non_exhaustive()
    }
}
