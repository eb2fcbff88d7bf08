//! # Cadence
//!
//! Headless runner for the Cadence audio cue engine. Plays a scripted
//! session from a cue sheet on the simulated backend and logs what the
//! engine does.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use cadence_audio::{
    request_channel, AudioManager, EngineConfig, EngineEvent, MemoryAssetLoader, SimBackend,
    SimMixerBus,
};
use cadence_core::CueSheet;
use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Cue sheet used when none is given on the command line.
const DEMO_CUES: &str = include_str!("../assets/demo-cues.json");

/// Length of the silent clip registered for every referenced asset.
const CLIP_LENGTH: Duration = Duration::from_millis(1500);

/// How long each BGM cue plays before the next switch.
const SCENE_LENGTH: Duration = Duration::from_secs(3);

#[derive(Debug, Parser)]
#[command(name = "cadence", version, about = "Headless Cadence audio cue runner")]
struct Args {
    /// Cue sheet JSON to play. The built-in demo sheet is used when omitted.
    cue_sheet: Option<PathBuf>,

    /// Engine config JSON. Falls back to the default config location.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cadence=debug,cadence_app=debug,cadence_audio=info".into()),
        )
        .init();

    info!("Starting Cadence v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();
    let config = EngineConfig::load_or_default(args.config.as_deref())?;
    let sheet = match &args.cue_sheet {
        Some(path) => CueSheet::load(path)
            .with_context(|| format!("Failed to load cue sheet {}", path.display()))?,
        None => CueSheet::from_json(DEMO_CUES)?,
    };
    info!("Loaded {} cues", sheet.len());

    let loader = Arc::new(MemoryAssetLoader::new());
    for (_, cue) in sheet.iter() {
        for clip in &cue.clips {
            loader.insert_silence(clip.key(), CLIP_LENGTH);
        }
    }

    let manager = Arc::new(AudioManager::new(
        &config,
        Arc::new(SimBackend::new()),
        loader.clone(),
        Box::new(SimMixerBus::new()),
    )?);

    let event_log = {
        let manager = manager.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(100));
            loop {
                interval.tick().await;
                while let Some(event) = manager.try_recv_event() {
                    log_event(&event);
                }
            }
        })
    };

    let (requests, rx) = request_channel();
    let server = tokio::spawn(manager.clone().serve(rx));

    let (music, effects): (Vec<_>, Vec<_>) = sheet
        .iter()
        .map(|(name, cue)| (name.to_string(), Arc::new(cue.clone())))
        .partition(|(name, _)| name.starts_with("bgm"));
    if music.is_empty() {
        warn!("Cue sheet has no bgm cues, playing effects only");
    }

    for (name, cue) in &music {
        info!("Scene: {name}");
        match requests.play_bgm_and_wait(cue.clone()).await {
            Ok(Some(emitter)) => debug!("{name} playing on {emitter}"),
            Ok(None) => warn!("{name} did not start"),
            Err(e) => warn!("{name} failed: {e}"),
        }
        for (effect, cue) in &effects {
            debug!("Triggering {effect}");
            requests.play_sfx(cue.clone())?;
        }
        tokio::time::sleep(SCENE_LENGTH).await;
    }

    if music.is_empty() {
        for (_, cue) in &effects {
            requests.play_sfx(cue.clone())?;
        }
        tokio::time::sleep(SCENE_LENGTH).await;
    }

    manager.set_bus_mute("SFX", true);
    manager.set_time_scale(0.5);
    tokio::time::sleep(Duration::from_millis(500)).await;
    manager.set_bus_mute("SFX", false);
    manager.set_time_scale(1.0);

    requests.stop_sfx()?;
    requests.stop_bgm()?;
    tokio::time::sleep(Duration::from_secs(1)).await;
    requests.shutdown()?;
    server.await.context("Request server panicked")?;

    event_log.abort();
    while let Some(event) = manager.try_recv_event() {
        log_event(&event);
    }

    let stats = manager.pool().stats();
    info!(
        "Session done: {} emitters created, {} acquisitions, {} releases, {} assets still loaded",
        stats.created,
        stats.acquisitions,
        stats.releases,
        loader.outstanding()
    );
    Ok(())
}

fn log_event(event: &EngineEvent) {
    match event {
        EngineEvent::BgmStarted(emitter) => info!("BGM started on {emitter}"),
        EngineEvent::SfxFinished(playback) => info!(
            "SFX on {} finished after {} clips{}",
            playback.emitter,
            playback.clips_played,
            if playback.interrupted { " (stopped)" } else { "" }
        ),
        EngineEvent::EmitterStopped(emitter) => debug!("{emitter} stopped"),
        EngineEvent::CueRejected { channel } => warn!("{channel:?} cue rejected: no clips"),
        EngineEvent::PlayFailed { channel, error } => warn!("{channel:?} play failed: {error}"),
    }
}

