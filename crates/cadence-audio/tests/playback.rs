//! End-to-end playback scenarios on the simulated backend.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use std::sync::Arc;
use std::time::Duration;

use cadence_audio::{
    AudioManager, EmitterState, EngineConfig, MemoryAssetLoader, SimBackend, SimMixerBus,
};
use cadence_core::{AssetReference, Cue, PlaybackConfig, SelectorKind};
use tokio::time::Instant;

struct Engine {
    manager: Arc<AudioManager<MemoryAssetLoader>>,
    backend: Arc<SimBackend>,
    loader: Arc<MemoryAssetLoader>,
}

fn engine() -> Engine {
    let mut config = EngineConfig::default();
    config.tick_interval_ms = 10;
    config.pool.warm_up = 0;

    let backend = Arc::new(SimBackend::new());
    let loader = Arc::new(MemoryAssetLoader::new());
    for (key, ms) in [("town", 4000), ("dungeon", 5000), ("step-a", 100), ("step-b", 100)] {
        loader.insert_silence(key, Duration::from_millis(ms));
    }

    let manager = AudioManager::new(
        &config,
        backend.clone(),
        loader.clone(),
        Box::new(SimMixerBus::new()),
    )
    .unwrap();

    Engine {
        manager: Arc::new(manager),
        backend,
        loader,
    }
}

fn music(key: &str, fade_in: f32, fade_out: f32, crossfade: bool) -> Cue {
    Cue::single(key).with_config(
        PlaybackConfig::default()
            .with_fades(fade_in, fade_out)
            .with_crossfade(crossfade),
    )
}

#[tokio::test(start_paused = true)]
async fn test_bgm_switch_waits_for_fade_out() {
    let engine = engine();
    let first = engine
        .manager
        .play_bgm(&music("town", 0.0, 0.2, false))
        .await
        .unwrap()
        .unwrap();

    let switch_started = Instant::now();
    let second = engine
        .manager
        .play_bgm(&music("dungeon", 0.2, 0.0, false))
        .await
        .unwrap()
        .unwrap();
    assert!(switch_started.elapsed() >= Duration::from_millis(200));

    let first_probe = engine.backend.probe(first.id().slot).unwrap();
    let second_probe = engine.backend.probe(second.id().slot).unwrap();
    let first_stopped = first_probe.stopped_at().unwrap();
    assert!(second_probe.started_at().unwrap() >= first_stopped);
    assert_eq!(second_probe.clip_key().as_deref(), Some("dungeon"));

    // The outgoing emitter was returned before the new one was acquired.
    assert_eq!(first.id().slot, second.id().slot);
    assert_eq!(engine.manager.pool().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_bgm_play_after_stop_never_overlaps() {
    let engine = engine();
    let first = engine
        .manager
        .play_bgm(&music("town", 0.0, 0.5, false))
        .await
        .unwrap()
        .unwrap();
    let first_probe = engine.backend.probe(first.id().slot).unwrap();

    let stop = engine.manager.stop_bgm().unwrap();
    let switch_started = Instant::now();
    let second = engine
        .manager
        .play_bgm(&music("dungeon", 0.0, 0.0, false))
        .await
        .unwrap()
        .unwrap();
    assert!(switch_started.elapsed() >= Duration::from_millis(500));
    assert!(stop.is_finished());

    let second_probe = engine.backend.probe(second.id().slot).unwrap();
    assert!(second_probe.started_at().unwrap() >= first_probe.stopped_at().unwrap());
    assert_eq!(second_probe.clip_key().as_deref(), Some("dungeon"));
    assert_eq!(first.id().slot, second.id().slot);
    assert_eq!(engine.manager.pool().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_bgm_crossfade_overlaps() {
    let engine = engine();
    let first = engine
        .manager
        .play_bgm(&music("town", 0.0, 0.3, false))
        .await
        .unwrap()
        .unwrap();
    let second = engine
        .manager
        .play_bgm(&music("dungeon", 0.3, 0.0, true))
        .await
        .unwrap()
        .unwrap();

    assert_ne!(first.id().slot, second.id().slot);
    let first_probe = engine.backend.probe(first.id().slot).unwrap();
    let second_probe = engine.backend.probe(second.id().slot).unwrap();

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(first_probe.is_playing());
    assert!(second_probe.is_playing());
    assert!(first_probe.volume() < 1.0);
    assert!(second_probe.volume() > 0.0);

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(!first_probe.is_playing());
    assert!(second_probe.is_playing());
    assert!((second_probe.volume() - 1.0).abs() < 1e-6);
    assert_eq!(engine.manager.pool().in_use_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_bgm_loops_until_stopped() {
    let engine = engine();
    let handle = engine
        .manager
        .play_bgm(&Cue::single("town"))
        .await
        .unwrap()
        .unwrap();

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(handle.is_looping());
    assert!(handle.is_playing());
    assert_eq!(handle.state(), Some(EmitterState::Playing));

    engine.manager.stop_bgm().unwrap().wait().await;
    assert!(!engine.backend.probe(handle.id().slot).unwrap().is_playing());
    assert_eq!(engine.manager.pool().in_use_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_sfx_stop_mid_second_clip() {
    let engine = engine();
    let cue = Cue::new(
        vec![AssetReference::new("step-a"), AssetReference::new("step-b")],
        PlaybackConfig::default(),
    )
    .with_selector(SelectorKind::SequentialRepeat);

    let manager = engine.manager.clone();
    let running = tokio::spawn(async move { manager.play_sfx(&cue).await });

    tokio::time::sleep(Duration::from_millis(150)).await;
    let stops = engine.manager.stop_sfx();
    assert_eq!(stops.len(), 1);
    for stop in stops {
        stop.wait().await;
    }

    let playback = running.await.unwrap().unwrap().unwrap();
    assert!(playback.interrupted);
    assert_eq!(playback.clips_played, 2);

    tokio::time::sleep(Duration::from_secs(1)).await;
    let probe = engine.backend.probe(playback.emitter.slot).unwrap();
    assert_eq!(probe.play_count(), 2);
    assert_eq!(probe.clip_key().as_deref(), Some("step-b"));
    assert_eq!(engine.manager.pool().stats().releases, 1);
    assert_eq!(engine.manager.pool().in_use_count(), 0);
    assert_eq!(engine.loader.outstanding(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_sfx_fade_in_longer_than_clip_keeps_volume() {
    let engine = engine();
    engine.loader.insert_silence("blip", Duration::from_millis(50));
    let cue = Cue::single("blip")
        .with_config(PlaybackConfig::default().with_volume(0.9).with_fades(0.2, 0.0))
        .with_selector(SelectorKind::SequentialRepeat);

    let manager = engine.manager.clone();
    let running = tokio::spawn(async move { manager.play_sfx(&cue).await });

    // Each clip ends a quarter of the way up its ramp.
    tokio::time::sleep(Duration::from_millis(40)).await;
    let probe = engine.backend.probe(0).unwrap();
    let first_peak = probe.volume();
    tokio::time::sleep(Duration::from_millis(300)).await;
    probe.clear_volume_writes();
    tokio::time::sleep(Duration::from_millis(50)).await;
    let late_peak = probe
        .volume_writes()
        .into_iter()
        .fold(0.0_f32, f32::max);
    assert!(first_peak > 0.1);
    assert!(late_peak > 0.1);
    assert!(probe.play_count() >= 6);

    for stop in engine.manager.stop_sfx() {
        stop.wait().await;
    }
    let playback = running.await.unwrap().unwrap().unwrap();
    assert!(playback.interrupted);
}

#[tokio::test(start_paused = true)]
async fn test_sfx_waits_on_scaled_time() {
    let engine = engine();
    engine.manager.set_time_scale(0.5);

    let start = Instant::now();
    engine.manager.play_sfx(&Cue::single("step-a")).await.unwrap();
    assert!(start.elapsed() >= Duration::from_millis(200));

    let unscaled = Cue::single("step-a").with_config(PlaybackConfig {
        ignore_time_scale: true,
        ..PlaybackConfig::default()
    });
    let start = Instant::now();
    engine.manager.play_sfx(&unscaled).await.unwrap();
    assert!(start.elapsed() < Duration::from_millis(200));
}

#[tokio::test(start_paused = true)]
async fn test_empty_cues_ignored() {
    let engine = engine();
    let empty = Cue::new(Vec::new(), PlaybackConfig::default());
    assert!(engine.manager.play_bgm(&empty).await.unwrap().is_none());
    assert!(engine.manager.play_sfx(&empty).await.unwrap().is_none());
    assert!(engine.manager.pool().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_assets_released_after_session() {
    let engine = engine();
    engine
        .manager
        .play_bgm(&music("town", 0.1, 0.1, false))
        .await
        .unwrap();
    engine
        .manager
        .play_bgm(&music("dungeon", 0.1, 0.1, true))
        .await
        .unwrap();

    let sfx = Cue::new(
        vec![AssetReference::new("step-a"), AssetReference::new("step-b")],
        PlaybackConfig::default(),
    )
    .with_selector(SelectorKind::Sequential);
    engine.manager.play_sfx(&sfx).await.unwrap();

    for stop in engine.manager.shutdown() {
        stop.wait().await;
    }
    assert_eq!(engine.loader.outstanding(), 0);
    assert_eq!(engine.loader.total_loads(), 4);
    assert_eq!(engine.manager.pool().in_use_count(), 0);
}
