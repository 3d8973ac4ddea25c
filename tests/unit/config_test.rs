//! Tests for session settings and driver configuration

use decay_playback::config::{
    sanitize_value, shift_speed, DriverConfig, QualityModel, SessionSettings, SettingField,
};
use decay_playback::core::{DebtCap, SchedulerTuning};
use serde_json::json;

#[test]
fn test_driver_config_defaults_are_valid() {
    let cfg = DriverConfig::default();
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.max_encode_retry, 3);
    assert_eq!(cfg.metrics_interval, 5);
    assert_eq!(cfg.offload_timeout_ms, 10_000);
    assert_eq!(cfg.offload_init_timeout_ms, 2_000);
}

#[test]
fn test_driver_config_invalid_retry() {
    let cfg = DriverConfig {
        max_encode_retry: 0,
        ..DriverConfig::default()
    };
    assert!(cfg.validate().is_err());
}

#[test]
fn test_driver_config_invalid_tuning() {
    let cfg = DriverConfig {
        tuning: SchedulerTuning {
            debt_cap: DebtCap::Fixed(0.5),
            ..SchedulerTuning::default()
        },
        ..DriverConfig::default()
    };
    assert!(cfg.validate().is_err());

    let cfg = DriverConfig {
        tuning: SchedulerTuning {
            cost_sample_weight: 0.0,
            ..SchedulerTuning::default()
        },
        ..DriverConfig::default()
    };
    assert!(cfg.validate().is_err());
}

#[test]
fn test_driver_config_from_json() {
    let cfg = DriverConfig::from_json_str(
        r#"{"max_encode_retry": 5, "tuning": {"debt_cap": {"kind": "fixed", "value": 4.0}}}"#,
    )
    .expect("valid config");
    assert_eq!(cfg.max_encode_retry, 5);
    assert_eq!(cfg.tuning.debt_cap, DebtCap::Fixed(4.0));
    assert_eq!(cfg.metrics_interval, 5);

    assert!(DriverConfig::from_json_str(r#"{"offload_timeout_ms": 0}"#).is_err());
    assert!(DriverConfig::from_json_str("not json").is_err());
}

#[test]
fn test_settings_missing_fields_take_defaults() {
    let sanitized = sanitize_value(&json!({}));
    assert!(!sanitized.has_errors());
    assert_eq!(sanitized.settings, SessionSettings::default());

    let sanitized = sanitize_value(&json!("not an object"));
    assert!(!sanitized.has_errors());
}

#[test]
fn test_settings_out_of_range_are_clamped_and_reported() {
    let sanitized = sanitize_value(&json!({
        "tick_ms": 5,
        "batch": 1000,
        "initial_quality": "high",
    }));
    assert_eq!(sanitized.settings.tick_ms, 10.0);
    assert_eq!(sanitized.settings.batch, 100);
    assert_eq!(sanitized.settings.initial_quality, 0.92);
    assert!(sanitized.errors.contains_key(&SettingField::TickMs));
    assert!(sanitized.errors.contains_key(&SettingField::Batch));
    assert!(sanitized.errors.contains_key(&SettingField::InitialQuality));
}

#[test]
fn test_settings_min_quality_not_above_initial() {
    let sanitized = sanitize_value(&json!({ "initial_quality": 0.5, "min_quality": 0.8 }));
    assert_eq!(sanitized.settings.min_quality, 0.5);
    assert!(sanitized.errors.contains_key(&SettingField::MinQuality));
}

#[test]
fn test_settings_speed_and_model() {
    let sanitized = sanitize_value(&json!({ "speed": 3, "quality_model": "linear" }));
    assert_eq!(sanitized.settings.speed, 1.0);
    assert_eq!(sanitized.settings.quality_model, QualityModel::Linear);
    assert!(sanitized.errors.contains_key(&SettingField::Speed));

    let sanitized = sanitize_value(&json!({ "quality_model": "cubic" }));
    assert_eq!(sanitized.settings.quality_model, QualityModel::Exponential);
    assert!(sanitized.errors.contains_key(&SettingField::QualityModel));
}

#[test]
fn test_settings_merge_keeps_existing_values() {
    let base = SessionSettings {
        batch: 4,
        ..SessionSettings::default()
    };
    let merged = base.merge(&json!({ "speed": 8 }));
    assert!(!merged.has_errors());
    assert_eq!(merged.settings.batch, 4);
    assert_eq!(merged.settings.speed, 8.0);
}

#[test]
fn test_settings_pacing() {
    let settings = SessionSettings {
        speed: 2.0,
        tick_ms: 100.0,
        ..SessionSettings::default()
    };
    assert!((settings.target_gen_per_sec() - 20.0).abs() < 1e-9);
    assert!((settings.tick_interval_ms(8.0) - 50.0).abs() < 1e-9);

    let fast = SessionSettings {
        speed: 50.0,
        tick_ms: 100.0,
        ..SessionSettings::default()
    };
    assert!((fast.tick_interval_ms(8.0) - 8.0).abs() < 1e-9);
}

#[test]
fn test_speed_stepping() {
    assert_eq!(shift_speed(1.0, 1), 2.0);
    assert_eq!(shift_speed(1.0, -1), 0.5);
    assert_eq!(shift_speed(16.0, 1), 16.0);
    assert_eq!(shift_speed(0.5, -1), 0.5);
    // 50x is not on the viewer list, so it steps from 1x.
    assert_eq!(shift_speed(50.0, 1), 2.0);
}

#[test]
fn test_settings_from_json_str() {
    let sanitized = SessionSettings::from_json_str(r#"{"batch": 3}"#).expect("valid json");
    assert_eq!(sanitized.settings.batch, 3);
    assert!(SessionSettings::from_json_str("{").is_err());
}

#[test]
fn test_settings_from_env() {
    std::env::set_var("DECAY_TICK_MS", "250");
    std::env::set_var("DECAY_SPEED", "warp");
    let sanitized = SessionSettings::from_env().expect("env settings");
    std::env::remove_var("DECAY_TICK_MS");
    std::env::remove_var("DECAY_SPEED");

    assert_eq!(sanitized.settings.tick_ms, 250.0);
    assert_eq!(sanitized.settings.speed, 1.0);
    assert!(sanitized.errors.contains_key(&SettingField::Speed));
}
