//! Audio emitters: one voice each, leased out by the pool.
//!
//! An emitter moves `Idle -> Playing -> FadingOut -> Idle`. Callers never
//! own an emitter directly; they hold an [`EmitterHandle`], which pairs the
//! emitter with the lease generation it was acquired under. Once the pool
//! hands the emitter to someone else every operation through the old
//! handle becomes a no-op.

use std::fmt;
use std::sync::Arc;

use cadence_core::{AudioBuffer, PlaybackConfig};
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::clock::Clock;
use crate::events::EngineEvent;
use crate::fade::{self, FadeSettings};
use crate::voice::Voice;

/// Identifies one lease of one pool slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EmitterId {
    pub slot: usize,
    pub generation: u64,
}

impl fmt::Display for EmitterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "emitter {}#{}", self.slot, self.generation)
    }
}

/// Lifecycle state of an emitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmitterState {
    #[default]
    Idle,
    Playing,
    FadingOut,
}

#[derive(Debug, Default)]
struct EmitterInner {
    state: EmitterState,
    generation: u64,
    leased: bool,
    fade_in: FadeSettings,
    fade_out: FadeSettings,
    /// Volume a fade-in ramps up to, fixed by the last `configure`.
    target_volume: Option<f32>,
    fade_task: Option<JoinHandle<()>>,
}

impl EmitterInner {
    const fn is_current(&self, generation: u64) -> bool {
        self.leased && self.generation == generation
    }
}

/// A pooled playback resource.
pub(crate) struct Emitter {
    slot: usize,
    voice: Mutex<Box<dyn Voice>>,
    clock: Arc<Clock>,
    inner: Mutex<EmitterInner>,
    /// Highest lease generation whose stop sequence has completed.
    retired: watch::Sender<u64>,
    release_tx: Sender<EmitterId>,
    events: Option<Sender<EngineEvent>>,
}

impl Emitter {
    pub(crate) fn new(
        slot: usize,
        voice: Box<dyn Voice>,
        clock: Arc<Clock>,
        release_tx: Sender<EmitterId>,
        events: Option<Sender<EngineEvent>>,
    ) -> Self {
        Self {
            slot,
            voice: Mutex::new(voice),
            clock,
            inner: Mutex::new(EmitterInner::default()),
            retired: watch::Sender::new(0),
            release_tx,
            events,
        }
    }

    pub(crate) fn is_fading_out(&self) -> bool {
        self.inner.lock().state == EmitterState::FadingOut
    }

    pub(crate) fn current_generation(&self) -> Option<u64> {
        let inner = self.inner.lock();
        inner.leased.then_some(inner.generation)
    }

    /// Start a new lease. Called by the pool under its lock.
    pub(crate) fn begin_lease(&self) -> EmitterId {
        let mut inner = self.inner.lock();
        inner.generation += 1;
        inner.leased = true;
        inner.state = EmitterState::Idle;
        inner.fade_in = FadeSettings::default();
        inner.fade_out = FadeSettings::default();
        inner.target_volume = None;
        self.voice.lock().set_looping(false);

        EmitterId {
            slot: self.slot,
            generation: inner.generation,
        }
    }

    /// End the lease `generation`. Returns false if it was not current.
    ///
    /// Playback is left alone. A stop sequence that is still fading keeps
    /// running and signals completion itself.
    pub(crate) fn end_lease(&self, generation: u64) -> bool {
        let mut inner = self.inner.lock();
        if !inner.is_current(generation) {
            return false;
        }
        inner.leased = false;
        if let Some(task) = inner.fade_task.take() {
            task.abort();
        }
        if inner.state != EmitterState::FadingOut {
            inner.state = EmitterState::Idle;
            drop(inner);
            self.retire(generation);
        }
        true
    }

    fn retire(&self, generation: u64) {
        self.retired.send_modify(|retired| *retired = (*retired).max(generation));
    }

    fn state(&self, generation: u64) -> Option<EmitterState> {
        let inner = self.inner.lock();
        if !inner.is_current(generation) {
            return None;
        }
        // A one-shot clip that ran out is no longer playing.
        if inner.state == EmitterState::Playing && !self.voice.lock().is_playing() {
            return Some(EmitterState::Idle);
        }
        Some(inner.state)
    }

    fn configure(&self, generation: u64, config: &PlaybackConfig) -> bool {
        let mut inner = self.inner.lock();
        if !inner.is_current(generation) {
            return false;
        }
        inner.fade_in = FadeSettings::from_secs(config.fade_in, config.ignore_time_scale);
        inner.fade_out = FadeSettings::from_secs(config.fade_out, config.ignore_time_scale);
        let config = config.clamped();
        inner.target_volume = Some(config.volume);
        self.voice.lock().configure(&config);
        true
    }

    fn set_looping(&self, generation: u64, looping: bool) -> bool {
        let inner = self.inner.lock();
        if !inner.is_current(generation) {
            return false;
        }
        self.voice.lock().set_looping(looping);
        true
    }

    fn play(self: &Arc<Self>, generation: u64, buffer: &AudioBuffer) -> bool {
        let mut inner = self.inner.lock();
        if !inner.is_current(generation) || inner.state == EmitterState::FadingOut {
            return false;
        }
        if let Some(task) = inner.fade_task.take() {
            task.abort();
        }

        let fade = inner.fade_in;
        let target = {
            let mut voice = self.voice.lock();
            // An interrupted fade-in leaves the voice part-way up; never ramp to that.
            let target = *inner.target_volume.get_or_insert_with(|| voice.volume());
            voice.set_clip(Some(buffer.clone()));
            if !fade.is_instant() {
                voice.set_volume(0.0);
            }
            voice.play();
            target
        };
        inner.state = EmitterState::Playing;

        if !fade.is_instant() {
            let emitter = self.clone();
            inner.fade_task = Some(tokio::spawn(async move {
                fade::ramp(&emitter.voice, &emitter.clock, fade, 0.0, target).await;
            }));
        }
        trace!(
            "Emitter {} playing {} (fade-in {:?})",
            self.slot,
            buffer.source(),
            fade.duration
        );
        true
    }

    fn stop(self: &Arc<Self>, id: EmitterId) -> StopHandle {
        let handle = StopHandle {
            id,
            rx: self.retired.subscribe(),
        };

        let mut inner = self.inner.lock();
        if !inner.is_current(id.generation) || inner.state == EmitterState::FadingOut {
            return handle;
        }
        inner.state = EmitterState::FadingOut;
        let fade_in = inner.fade_task.take();
        if let Some(task) = &fade_in {
            task.abort();
        }
        let fade_out = inner.fade_out;
        drop(inner);

        let emitter = self.clone();
        tokio::spawn(async move { emitter.run_stop(id, fade_in, fade_out).await });
        handle
    }

    async fn run_stop(&self, id: EmitterId, fade_in: Option<JoinHandle<()>>, fade_out: FadeSettings) {
        // Let an aborted fade-in unwind before the fade-out snapshots the volume.
        if let Some(task) = fade_in {
            let _ = task.await;
        }

        let playing = self.voice.lock().is_playing();
        if playing {
            fade::fade_out(&self.voice, &self.clock, fade_out).await;
        }
        self.voice.lock().stop();
        self.inner.lock().state = EmitterState::Idle;

        // Release first so a waiter woken by the signal can reuse the slot.
        let _ = self.release_tx.send(id);
        self.retire(id.generation);
        debug!("{id} stopped");
        if let Some(events) = &self.events {
            let _ = events.send(EngineEvent::EmitterStopped(id));
        }
    }
}

impl fmt::Debug for Emitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Emitter")
            .field("slot", &self.slot)
            .field("state", &inner.state)
            .field("generation", &inner.generation)
            .field("leased", &inner.leased)
            .finish_non_exhaustive()
    }
}

/// A lease on a pooled emitter.
#[derive(Debug, Clone)]
pub struct EmitterHandle {
    id: EmitterId,
    emitter: Arc<Emitter>,
}

impl EmitterHandle {
    pub(crate) const fn new(id: EmitterId, emitter: Arc<Emitter>) -> Self {
        Self { id, emitter }
    }

    pub const fn id(&self) -> EmitterId {
        self.id
    }

    /// Returns true while this lease has not been released.
    pub fn is_current(&self) -> bool {
        self.emitter.inner.lock().is_current(self.id.generation)
    }

    /// Apply a cue config: fade settings stay on the emitter, the rest goes
    /// to the voice.
    pub fn configure(&self, config: &PlaybackConfig) -> bool {
        self.emitter.configure(self.id.generation, config)
    }

    pub fn set_looping(&self, looping: bool) -> bool {
        self.emitter.set_looping(self.id.generation, looping)
    }

    /// Start `buffer` and ramp it in if the config asks for a fade-in.
    ///
    /// Returns once the voice has started. Returns false without touching
    /// the voice when there is no buffer, the lease is stale or a stop is
    /// in progress.
    pub fn play(&self, buffer: Option<&AudioBuffer>) -> bool {
        buffer.is_some_and(|buffer| self.emitter.play(self.id.generation, buffer))
    }

    /// Fade out, stop and hand the emitter back to the pool.
    ///
    /// Never waits. The returned handle can be awaited for completion or
    /// dropped to detach. Stopping a stale lease or an emitter that is
    /// already fading out starts nothing new. Must be called from within a
    /// tokio runtime.
    pub fn stop(&self) -> StopHandle {
        self.emitter.stop(self.id)
    }

    /// Wait until this lease's stop sequence has completed or the lease was
    /// released.
    pub async fn stopped(&self) {
        StopHandle {
            id: self.id,
            rx: self.emitter.retired.subscribe(),
        }
        .wait()
        .await;
    }

    /// State of the emitter, or `None` if the lease is stale.
    pub fn state(&self) -> Option<EmitterState> {
        self.emitter.state(self.id.generation)
    }

    pub fn is_playing(&self) -> bool {
        self.is_current() && self.emitter.voice.lock().is_playing()
    }

    pub fn is_looping(&self) -> bool {
        self.emitter.voice.lock().is_looping()
    }

    pub fn volume(&self) -> f32 {
        self.emitter.voice.lock().volume()
    }
}

/// Completion of an emitter stop sequence.
#[derive(Debug, Clone)]
pub struct StopHandle {
    id: EmitterId,
    rx: watch::Receiver<u64>,
}

impl StopHandle {
    /// The emitter lease being stopped.
    pub const fn emitter(&self) -> EmitterId {
        self.id
    }

    pub fn is_finished(&self) -> bool {
        *self.rx.borrow() >= self.id.generation
    }

    /// Wait for the fade-out and hard stop to finish.
    pub async fn wait(mut self) {
        let generation = self.id.generation;
        // A dropped sender means the pool is gone; nothing is left to wait on.
        let _ = self.rx.wait_for(|retired| *retired >= generation).await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::sim::{SimBackend, VoiceProbe};
    use crate::voice::VoiceFactory;
    use crossbeam_channel::{unbounded, Receiver};
    use std::time::Duration;
    use tokio::time::Instant;

    struct Fixture {
        emitter: Arc<Emitter>,
        probe: VoiceProbe,
        releases: Receiver<EmitterId>,
    }

    fn fixture() -> Fixture {
        let backend = SimBackend::new();
        let (release_tx, releases) = unbounded();
        let emitter = Arc::new(Emitter::new(
            0,
            backend.create_voice(0),
            Arc::new(Clock::new(Duration::from_millis(10))),
            release_tx,
            None,
        ));
        Fixture {
            emitter,
            probe: backend.probe(0).unwrap(),
            releases,
        }
    }

    fn lease(emitter: &Arc<Emitter>) -> EmitterHandle {
        EmitterHandle::new(emitter.begin_lease(), emitter.clone())
    }

    fn clip(duration_ms: u64) -> AudioBuffer {
        AudioBuffer::silence("clip".into(), Duration::from_millis(duration_ms), 1000, 1)
    }

    #[tokio::test(start_paused = true)]
    async fn test_play_without_buffer_is_noop() {
        let f = fixture();
        let handle = lease(&f.emitter);
        assert!(!handle.play(None));
        assert_eq!(handle.state(), Some(EmitterState::Idle));
        assert_eq!(f.probe.play_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_play_starts_immediately_and_fades_in() {
        let f = fixture();
        let handle = lease(&f.emitter);
        handle.configure(&PlaybackConfig::default().with_volume(0.6).with_fades(0.1, 0.0));

        assert!(handle.play(Some(&clip(1000))));
        assert!(f.probe.is_playing());
        assert_eq!(handle.state(), Some(EmitterState::Playing));
        assert!(f.probe.volume() < 1e-6);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!((f.probe.volume() - 0.6).abs() < 1e-6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_during_fade_in_keeps_configured_volume() {
        let f = fixture();
        let handle = lease(&f.emitter);
        handle.configure(&PlaybackConfig::default().with_volume(0.8).with_fades(0.2, 0.0));

        for _ in 0..6 {
            assert!(handle.play(Some(&clip(50))));
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(handle.play(Some(&clip(1000))));
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!((f.probe.volume() - 0.8).abs() < 1e-6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_resolves_after_stop_sequence() {
        let f = fixture();
        let handle = lease(&f.emitter);
        handle.configure(&PlaybackConfig::default().with_fades(0.0, 0.1));
        handle.set_looping(true);
        handle.play(Some(&clip(10)));

        let start = Instant::now();
        let waiter = handle.clone();
        let stopped = tokio::spawn(async move {
            waiter.stopped().await;
            Instant::now()
        });
        tokio::task::yield_now().await;
        assert!(!stopped.is_finished());

        let _detached = handle.stop();
        let stopped_at = stopped.await.unwrap();
        assert!(stopped_at - start >= Duration::from_millis(100));
        assert!(!f.probe.is_playing());
        assert_eq!(f.releases.try_recv().unwrap(), handle.id());

        // Resolves at once for a lease that has already finished.
        handle.stopped().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_fades_out_and_requests_release() {
        let f = fixture();
        let handle = lease(&f.emitter);
        handle.configure(&PlaybackConfig::default().with_fades(0.0, 0.05));
        handle.set_looping(true);
        handle.play(Some(&clip(10)));

        let start = Instant::now();
        let stop = handle.stop();
        assert_eq!(handle.state(), Some(EmitterState::FadingOut));
        assert!(!stop.is_finished());

        stop.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(50));
        assert!(!f.probe.is_playing());
        assert_eq!(f.releases.try_recv().unwrap(), handle.id());
        assert!(f.releases.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_fade_out_hard_stops() {
        let f = fixture();
        let handle = lease(&f.emitter);
        handle.set_looping(true);
        handle.play(Some(&clip(10)));

        let start = Instant::now();
        handle.stop().wait().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert!(!f.probe.is_playing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_stop_joins_first() {
        let f = fixture();
        let handle = lease(&f.emitter);
        handle.configure(&PlaybackConfig::default().with_fades(0.0, 0.1));
        handle.set_looping(true);
        handle.play(Some(&clip(10)));

        let first = handle.stop();
        let second = handle.stop();
        assert!(!handle.play(Some(&clip(10))));
        second.wait().await;
        assert!(first.is_finished());
        assert_eq!(f.releases.try_iter().count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_lease_is_noop() {
        let f = fixture();
        let old = lease(&f.emitter);
        assert!(f.emitter.end_lease(old.id().generation));
        let current = lease(&f.emitter);

        assert!(!old.is_current());
        assert!(!old.play(Some(&clip(100))));
        assert!(!old.set_looping(true));
        assert_eq!(old.state(), None);
        assert!(old.stop().is_finished());
        assert_eq!(f.probe.play_count(), 0);

        assert!(current.is_current());
        assert!(!f.emitter.end_lease(old.id().generation));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_fade_in() {
        let f = fixture();
        let handle = lease(&f.emitter);
        handle.configure(&PlaybackConfig::default().with_fades(1.0, 0.0));
        handle.set_looping(true);
        handle.play(Some(&clip(10)));

        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.stop().wait().await;
        let writes = f.probe.volume_writes().len();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(f.probe.volume_writes().len(), writes);
        assert!(f.probe.volume() < 0.5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_shot_reports_idle_after_clip() {
        let f = fixture();
        let handle = lease(&f.emitter);
        handle.play(Some(&clip(50)));
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(handle.state(), Some(EmitterState::Idle));
        assert!(!handle.is_playing());
    }
}
