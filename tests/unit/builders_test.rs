//! Tests for the driver builder

use std::sync::Arc;

use async_trait::async_trait;
use decay_playback::builders::DriverBuilder;
use decay_playback::config::DriverConfig;
use decay_playback::core::{ExecutionMode, GenerationProcessor, InMemoryEventSink, ProcessError};

struct Noop;

#[async_trait]
impl GenerationProcessor for Noop {
    async fn reencode(&self, _quality: f64) -> Result<(), ProcessError> {
        Ok(())
    }
}

#[test]
fn test_build_with_defaults() {
    let driver = DriverBuilder::new(Arc::new(Noop)).build().expect("driver");
    let snapshot = driver.snapshot();
    assert!(!snapshot.has_session);
    assert!(!snapshot.playback.is_playing);
    assert_eq!(snapshot.mode, ExecutionMode::Local);
    assert_eq!(snapshot.settings.tick_ms, 120.0);
    assert_eq!(driver.config(), &DriverConfig::default());
}

#[test]
fn test_build_from_json() {
    let driver = DriverBuilder::new(Arc::new(Noop))
        .settings_json(r#"{"speed": 4, "batch": 3}"#)
        .expect("settings")
        .config_json(r#"{"max_encode_retry": 1}"#)
        .expect("config")
        .events(Box::new(InMemoryEventSink::new(16)))
        .build()
        .expect("driver");
    let snapshot = driver.snapshot();
    assert_eq!(snapshot.settings.speed, 4.0);
    assert_eq!(snapshot.settings.batch, 3);
    assert_eq!(driver.config().max_encode_retry, 1);
}

#[test]
fn test_invalid_config_is_rejected() {
    let result = DriverBuilder::new(Arc::new(Noop))
        .config(DriverConfig {
            clock_cadence_ms: 0,
            ..DriverConfig::default()
        })
        .build();
    assert!(result.is_err());

    assert!(DriverBuilder::new(Arc::new(Noop)).config_json(r#"{"max_encode_retry": 0}"#).is_err());
}
