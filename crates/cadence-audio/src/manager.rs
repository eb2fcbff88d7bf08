//! Audio manager: wires the pool, channels and mixer together.
//!
//! Hosts either call the manager directly or submit [`AudioRequest`]s
//! through a [`RequestSender`] and let [`AudioManager::serve`] dispatch
//! them. Engine events are queued on a channel the host polls.

use std::sync::Arc;

use cadence_core::{Cue, Error, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::channel::{BgmChannel, SfxChannel, SfxPlayback};
use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::emitter::{EmitterHandle, EmitterId, StopHandle};
use crate::events::{ChannelKind, EngineEvent};
use crate::loader::AssetLoader;
use crate::mixer::{MixerBus, MixerSettings};
use crate::pool::EmitterPool;
use crate::voice::VoiceFactory;

type BgmReply = oneshot::Sender<Result<Option<EmitterId>>>;
type SfxReply = oneshot::Sender<Result<Option<SfxPlayback>>>;

/// Requests served by [`AudioManager::serve`].
#[derive(Debug)]
pub enum AudioRequest {
    /// Switch the music. Requests are applied one after another.
    PlayBgm { cue: Arc<Cue>, reply: Option<BgmReply> },
    /// Start an effect traversal. Effects run concurrently.
    PlaySfx { cue: Arc<Cue>, reply: Option<SfxReply> },
    StopBgm,
    StopSfx,
    /// Stop everything and end the serve loop.
    Shutdown,
}

/// Receiving half of a request queue.
pub type RequestReceiver = mpsc::UnboundedReceiver<AudioRequest>;

/// Sending half of a request queue.
#[derive(Debug, Clone)]
pub struct RequestSender {
    tx: mpsc::UnboundedSender<AudioRequest>,
}

/// Create a request queue.
pub fn request_channel() -> (RequestSender, RequestReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (RequestSender { tx }, rx)
}

impl RequestSender {
    pub fn send(&self, request: AudioRequest) -> Result<()> {
        self.tx
            .send(request)
            .map_err(|_| Error::ChannelClosed("audio request queue".to_string()))
    }

    pub fn play_bgm(&self, cue: Arc<Cue>) -> Result<()> {
        self.send(AudioRequest::PlayBgm { cue, reply: None })
    }

    /// Queue a BGM switch and wait for it to start.
    pub async fn play_bgm_and_wait(&self, cue: Arc<Cue>) -> Result<Option<EmitterId>> {
        let (reply, rx) = oneshot::channel();
        self.send(AudioRequest::PlayBgm {
            cue,
            reply: Some(reply),
        })?;
        rx.await
            .map_err(|_| Error::ChannelClosed("BGM reply".to_string()))?
    }

    pub fn play_sfx(&self, cue: Arc<Cue>) -> Result<()> {
        self.send(AudioRequest::PlaySfx { cue, reply: None })
    }

    /// Queue an effect and wait for its traversal to end.
    pub async fn play_sfx_and_wait(&self, cue: Arc<Cue>) -> Result<Option<SfxPlayback>> {
        let (reply, rx) = oneshot::channel();
        self.send(AudioRequest::PlaySfx {
            cue,
            reply: Some(reply),
        })?;
        rx.await
            .map_err(|_| Error::ChannelClosed("SFX reply".to_string()))?
    }

    pub fn stop_bgm(&self) -> Result<()> {
        self.send(AudioRequest::StopBgm)
    }

    pub fn stop_sfx(&self) -> Result<()> {
        self.send(AudioRequest::StopSfx)
    }

    pub fn shutdown(&self) -> Result<()> {
        self.send(AudioRequest::Shutdown)
    }
}

/// Audio engine facade.
pub struct AudioManager<L: AssetLoader> {
    clock: Arc<Clock>,
    pool: Arc<EmitterPool>,
    bgm: BgmChannel<L>,
    sfx: SfxChannel<L>,
    mixer: Mutex<MixerSettings>,
    event_tx: Sender<EngineEvent>,
    event_rx: Receiver<EngineEvent>,
}

impl<L: AssetLoader> AudioManager<L> {
    /// Build an engine from `config`.
    pub fn new(
        config: &EngineConfig,
        factory: Arc<dyn VoiceFactory>,
        loader: Arc<L>,
        output: Box<dyn MixerBus>,
    ) -> Result<Self> {
        config.validate()?;

        let (event_tx, event_rx) = unbounded();
        let clock = Arc::new(Clock::new(config.tick_interval()));
        let pool = Arc::new(EmitterPool::with_events(
            factory,
            clock.clone(),
            config.pool.max_emitters,
            Some(event_tx.clone()),
        ));
        pool.warm_up(config.pool.warm_up);

        let mixer = MixerSettings::new(&config.mixer.buses, config.mixer.default_volume, output);

        info!(
            "Audio manager ready: tick {:?}, {} emitters warm, {} mixer buses",
            clock.tick_interval(),
            pool.len(),
            config.mixer.buses.len()
        );

        Ok(Self {
            bgm: BgmChannel::new(pool.clone(), loader.clone()),
            sfx: SfxChannel::new(pool.clone(), loader, clock.clone()),
            clock,
            pool,
            mixer: Mutex::new(mixer),
            event_tx,
            event_rx,
        })
    }

    /// Switch the background music to `cue`.
    pub async fn play_bgm(&self, cue: &Cue) -> Result<Option<EmitterHandle>> {
        let result = self.bgm.play(cue).await;
        match &result {
            Ok(Some(handle)) => self.emit(EngineEvent::BgmStarted(handle.id())),
            Ok(None) if cue.is_empty() => self.emit(EngineEvent::CueRejected {
                channel: ChannelKind::Bgm,
            }),
            Ok(None) => {}
            Err(e) => {
                error!("BGM play failed: {e}");
                self.emit(EngineEvent::PlayFailed {
                    channel: ChannelKind::Bgm,
                    error: e.to_string(),
                });
            }
        }
        result
    }

    pub fn stop_bgm(&self) -> Option<StopHandle> {
        self.bgm.stop()
    }

    /// Play an effect cue to completion (or until stopped).
    pub async fn play_sfx(&self, cue: &Cue) -> Result<Option<SfxPlayback>> {
        let result = self.sfx.play(cue).await;
        match &result {
            Ok(Some(playback)) => self.emit(EngineEvent::SfxFinished(*playback)),
            Ok(None) if cue.is_empty() => self.emit(EngineEvent::CueRejected {
                channel: ChannelKind::Sfx,
            }),
            Ok(None) => {}
            Err(e) => {
                error!("SFX play failed: {e}");
                self.emit(EngineEvent::PlayFailed {
                    channel: ChannelKind::Sfx,
                    error: e.to_string(),
                });
            }
        }
        result
    }

    pub fn stop_sfx(&self) -> Vec<StopHandle> {
        self.sfx.stop()
    }

    /// Stop both channels, release held clips and free every emitter.
    ///
    /// Later play requests are ignored. The returned handles complete when
    /// the fade-outs do.
    pub fn shutdown(&self) -> Vec<StopHandle> {
        info!("Shutting down audio manager");
        let mut stops: Vec<StopHandle> = self.bgm.shutdown().into_iter().collect();
        stops.extend(self.sfx.shutdown());
        self.pool.release_all();
        stops
    }

    pub fn set_bus_volume(&self, bus: &str, volume: f32) -> bool {
        self.mixer.lock().set_volume(bus, volume)
    }

    pub fn set_bus_mute(&self, bus: &str, muted: bool) -> bool {
        self.mixer.lock().set_mute(bus, muted)
    }

    pub fn bus_volume(&self, bus: &str) -> Option<f32> {
        self.mixer.lock().volume(bus)
    }

    pub fn set_time_scale(&self, scale: f32) {
        self.clock.set_time_scale(scale);
    }

    pub fn clock(&self) -> &Arc<Clock> {
        &self.clock
    }

    pub fn pool(&self) -> &Arc<EmitterPool> {
        &self.pool
    }

    pub fn current_bgm(&self) -> Option<EmitterHandle> {
        self.bgm.current()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv_event(&self) -> Option<EngineEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Event receiver for hosts that poll from another thread.
    pub fn events(&self) -> Receiver<EngineEvent> {
        self.event_rx.clone()
    }

    fn emit(&self, event: EngineEvent) {
        // The manager holds a receiver, so the queue never disconnects.
        let _ = self.event_tx.send(event);
    }

    /// Serve requests until `Shutdown` arrives or every sender is dropped.
    ///
    /// BGM switches are applied in arrival order on one worker; effects
    /// are spawned and run concurrently; stops take effect immediately.
    pub async fn serve(self: Arc<Self>, mut requests: RequestReceiver) {
        let (bgm_tx, mut bgm_rx) = mpsc::unbounded_channel::<(Arc<Cue>, Option<BgmReply>)>();
        let manager = self.clone();
        let bgm_worker = tokio::spawn(async move {
            while let Some((cue, reply)) = bgm_rx.recv().await {
                let result = manager.play_bgm(&cue).await.map(|handle| handle.map(|h| h.id()));
                if let Some(reply) = reply {
                    let _ = reply.send(result);
                }
            }
        });

        while let Some(request) = requests.recv().await {
            match request {
                AudioRequest::PlayBgm { cue, reply } => {
                    if bgm_tx.send((cue, reply)).is_err() {
                        warn!("BGM worker gone, dropping play request");
                    }
                }
                AudioRequest::PlaySfx { cue, reply } => {
                    let manager = self.clone();
                    tokio::spawn(async move {
                        let result = manager.play_sfx(&cue).await;
                        if let Some(reply) = reply {
                            let _ = reply.send(result);
                        }
                    });
                }
                AudioRequest::StopBgm => {
                    self.stop_bgm();
                }
                AudioRequest::StopSfx => {
                    self.stop_sfx();
                }
                AudioRequest::Shutdown => {
                    self.shutdown();
                    break;
                }
            }
        }

        drop(bgm_tx);
        if let Err(e) = bgm_worker.await {
            error!("BGM worker failed: {e}");
        }
        debug!("Audio request loop finished");
    }
}

impl<L: AssetLoader> std::fmt::Debug for AudioManager<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioManager")
            .field("clock", &self.clock)
            .field("pool", &self.pool)
            .field("bgm", &self.bgm)
            .field("sfx", &self.sfx)
            .finish_non_exhaustive()
    }
}
