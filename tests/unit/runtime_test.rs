//! Tests for the tokio spawner and playback runtime

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use decay_playback::builders::DriverBuilder;
use decay_playback::core::{GenerationProcessor, ProcessError};
use decay_playback::runtime::tokio_spawner::{Spawn, TokioSpawner};
use decay_playback::runtime::PlaybackRuntime;

struct QuickCanvas;

#[async_trait]
impl GenerationProcessor for QuickCanvas {
    async fn reencode(&self, _quality: f64) -> Result<(), ProcessError> {
        tokio::time::sleep(Duration::from_millis(5)).await;
        Ok(())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tokio_spawner_spawn() {
    let spawner = TokioSpawner::new(tokio::runtime::Handle::current());

    let (tx, rx) = tokio::sync::oneshot::channel();
    spawner.spawn(async move {
        tx.send(123).unwrap();
    });

    let result = rx.await.expect("oneshot result");
    assert_eq!(result, 123);
}

#[tokio::test(start_paused = true)]
async fn test_runtime_plays_until_generation_limit() {
    let driver = DriverBuilder::new(Arc::new(QuickCanvas))
        .settings_json(r#"{"max_generations": 3, "speed": 4}"#)
        .expect("settings")
        .build()
        .expect("driver");
    let runtime = PlaybackRuntime::new(driver, TokioSpawner::current());

    runtime.start_session().await;
    assert!(runtime.is_loop_active());

    tokio::time::timeout(Duration::from_secs(30), async {
        while !runtime.snapshot().has_ended {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("session should reach its generation limit");

    let snapshot = runtime.snapshot();
    assert_eq!(snapshot.playback.generation, 3);
    assert!(!snapshot.playback.is_playing);

    // Playing an ended session starts over and revives the loop.
    assert!(runtime.play_pause().await.expect("session loaded"));
    assert_eq!(runtime.snapshot().playback.generation, 0);
    runtime.end_session();
}

#[tokio::test]
async fn test_runtime_controls_need_a_session() {
    let driver = DriverBuilder::new(Arc::new(QuickCanvas)).build().expect("driver");
    let runtime = PlaybackRuntime::new(driver, TokioSpawner::current());
    assert!(runtime.play_pause().await.is_err());
    assert!(runtime.reset(true).await.is_err());
    assert!(!runtime.is_loop_active());
}
