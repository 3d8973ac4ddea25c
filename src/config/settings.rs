//! Session settings: decay model, pacing, and their validation.
//!
//! Settings arrive from untrusted sources (saved JSON, environment, UI edits),
//! so every entry point funnels through [`sanitize_value`], which never fails:
//! it clamps or replaces bad values and reports what it corrected.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::error::{AppResult, PlaybackError};

/// Every speed multiplier a session may use.
pub const SPEED_PRESETS: [f64; 8] = [0.1, 0.5, 1.0, 2.0, 4.0, 8.0, 16.0, 50.0];

/// Speed multipliers reachable from the viewer's faster/slower controls.
pub const VIEWER_SPEED_PRESETS: [f64; 6] = [0.5, 1.0, 2.0, 4.0, 8.0, 16.0];

/// Prefix for environment overrides, e.g. `DECAY_TICK_MS`.
pub const ENV_PREFIX: &str = "DECAY_";

/// How quality falls as generations accumulate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityModel {
    /// Always encode at the initial quality.
    Fixed,
    /// Subtract `linear_decay` per generation.
    Linear,
    /// Multiply by `exponential_decay` per generation.
    #[default]
    Exponential,
}

impl QualityModel {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "fixed" => Some(Self::Fixed),
            "linear" => Some(Self::Linear),
            "exponential" => Some(Self::Exponential),
            _ => None,
        }
    }
}

/// Settings for one decay session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Quality of the first re-encode, in `[0.1, 1]`.
    pub initial_quality: f64,
    /// Floor the decay model never goes below, in `[0.01, 1]`.
    pub min_quality: f64,
    /// Per-generation decrement for the linear model.
    pub linear_decay: f64,
    /// Per-generation factor for the exponential model.
    pub exponential_decay: f64,
    /// Nominal duration of one generation at 1x speed, in milliseconds.
    pub tick_ms: f64,
    /// Maximum generations per tick.
    pub batch: u32,
    /// Generation count at which the session ends.
    pub max_generations: u32,
    /// Playback speed multiplier, one of [`SPEED_PRESETS`].
    pub speed: f64,
    /// Decay model.
    pub quality_model: QualityModel,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            initial_quality: 0.92,
            min_quality: 0.1,
            linear_decay: 0.002,
            exponential_decay: 0.995,
            tick_ms: 120.0,
            batch: 1,
            max_generations: 2000,
            speed: 1.0,
            quality_model: QualityModel::Exponential,
        }
    }
}

/// A settings field that can carry a correction message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingField {
    /// `initial_quality`
    InitialQuality,
    /// `min_quality`
    MinQuality,
    /// `linear_decay`
    LinearDecay,
    /// `exponential_decay`
    ExponentialDecay,
    /// `tick_ms`
    TickMs,
    /// `batch`
    Batch,
    /// `max_generations`
    MaxGenerations,
    /// `speed`
    Speed,
    /// `quality_model`
    QualityModel,
}

impl SettingField {
    /// JSON key of the field.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::InitialQuality => "initial_quality",
            Self::MinQuality => "min_quality",
            Self::LinearDecay => "linear_decay",
            Self::ExponentialDecay => "exponential_decay",
            Self::TickMs => "tick_ms",
            Self::Batch => "batch",
            Self::MaxGenerations => "max_generations",
            Self::Speed => "speed",
            Self::QualityModel => "quality_model",
        }
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::InitialQuality => "Initial Q",
            Self::MinQuality => "Min Q",
            Self::LinearDecay => "Linear Decay",
            Self::ExponentialDecay => "Exponential Decay",
            Self::TickMs => "Tick (ms)",
            Self::Batch => "Batch",
            Self::MaxGenerations => "Max Generations",
            Self::Speed => "Speed",
            Self::QualityModel => "Quality Model",
        }
    }

    const ALL: [Self; 9] = [
        Self::InitialQuality,
        Self::MinQuality,
        Self::LinearDecay,
        Self::ExponentialDecay,
        Self::TickMs,
        Self::Batch,
        Self::MaxGenerations,
        Self::Speed,
        Self::QualityModel,
    ];
}

impl fmt::Display for SettingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Inclusive bounds for a numeric setting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SettingLimit {
    /// Lower bound.
    pub min: f64,
    /// Upper bound.
    pub max: f64,
    /// UI step size.
    pub step: f64,
}

/// Bounds for every numeric field.
#[must_use]
pub const fn setting_limit(field: SettingField) -> Option<SettingLimit> {
    let (min, max, step) = match field {
        SettingField::InitialQuality => (0.1, 1.0, 0.01),
        SettingField::MinQuality => (0.01, 1.0, 0.01),
        SettingField::LinearDecay => (0.0, 0.1, 0.001),
        SettingField::ExponentialDecay => (0.9, 1.0, 0.001),
        SettingField::TickMs => (10.0, 2000.0, 10.0),
        SettingField::Batch => (1.0, 100.0, 1.0),
        SettingField::MaxGenerations => (1.0, 100_000.0, 100.0),
        SettingField::Speed | SettingField::QualityModel => return None,
    };
    Some(SettingLimit { min, max, step })
}

/// Correction messages keyed by field.
pub type SettingsErrors = BTreeMap<SettingField, String>;

/// Outcome of sanitizing settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SanitizedSettings {
    /// Settings safe to use.
    pub settings: SessionSettings,
    /// What had to be corrected; empty when the input was valid.
    pub errors: SettingsErrors,
}

impl SanitizedSettings {
    /// Whether anything was corrected.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Sanitize arbitrary JSON into valid settings.
///
/// Missing fields take defaults silently. Non-numeric values fall back to the
/// default and out-of-range values are clamped; both are reported. Anything
/// other than an object is treated as an empty object.
#[must_use]
pub fn sanitize_value(input: &Value) -> SanitizedSettings {
    let defaults = SessionSettings::default();
    let empty = Map::new();
    let candidate = input.as_object().unwrap_or(&empty);
    let mut errors = SettingsErrors::new();

    let mut numeric = |field: SettingField, fallback: f64| -> f64 {
        match candidate.get(field.key()) {
            None => fallback,
            Some(value) => sanitize_numeric(field, value, fallback, &mut errors),
        }
    };

    let initial_quality = numeric(SettingField::InitialQuality, defaults.initial_quality);
    let min_quality = numeric(SettingField::MinQuality, defaults.min_quality);
    let linear_decay = numeric(SettingField::LinearDecay, defaults.linear_decay);
    let exponential_decay = numeric(SettingField::ExponentialDecay, defaults.exponential_decay);
    let tick_ms = numeric(SettingField::TickMs, defaults.tick_ms);
    let batch = round_count(numeric(SettingField::Batch, f64::from(defaults.batch)));
    let max_generations = round_count(numeric(
        SettingField::MaxGenerations,
        f64::from(defaults.max_generations),
    ));

    let speed = match candidate.get(SettingField::Speed.key()) {
        None => defaults.speed,
        Some(value) => match value.as_f64().filter(|speed| is_speed_preset(*speed)) {
            Some(speed) => speed,
            None => {
                errors.insert(
                    SettingField::Speed,
                    "Speed was not a supported preset; the default was applied.".into(),
                );
                defaults.speed
            }
        },
    };

    let quality_model = match candidate.get(SettingField::QualityModel.key()) {
        None => defaults.quality_model,
        Some(value) => match value.as_str().and_then(QualityModel::parse) {
            Some(model) => model,
            None => {
                errors.insert(
                    SettingField::QualityModel,
                    "Quality Model was not recognized; the default was applied.".into(),
                );
                defaults.quality_model
            }
        },
    };

    let mut settings = SessionSettings {
        initial_quality,
        min_quality,
        linear_decay,
        exponential_decay,
        tick_ms,
        batch,
        max_generations,
        speed,
        quality_model,
    };

    if settings.min_quality > settings.initial_quality {
        settings.min_quality = settings.initial_quality;
        errors.insert(
            SettingField::MinQuality,
            "Min Q must not exceed Initial Q.".into(),
        );
    }

    SanitizedSettings { settings, errors }
}

fn sanitize_numeric(
    field: SettingField,
    value: &Value,
    fallback: f64,
    errors: &mut SettingsErrors,
) -> f64 {
    let Some(limit) = setting_limit(field) else {
        return fallback;
    };
    let Some(number) = value.as_f64().filter(|n| n.is_finite()) else {
        errors.insert(field, format!("{} must be a number.", field.label()));
        return fallback;
    };
    if number < limit.min || number > limit.max {
        errors.insert(
            field,
            format!(
                "{} must be between {} and {}.",
                field.label(),
                limit.min,
                limit.max
            ),
        );
        return number.clamp(limit.min, limit.max);
    }
    number
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn round_count(value: f64) -> u32 {
    // callers pass values already clamped to a positive range
    value.round().max(0.0) as u32
}

/// Whether `speed` is one of [`SPEED_PRESETS`].
#[must_use]
pub fn is_speed_preset(speed: f64) -> bool {
    SPEED_PRESETS.iter().any(|preset| (preset - speed).abs() < f64::EPSILON)
}

/// Step `current` one viewer preset faster (`direction > 0`) or slower.
///
/// Speeds outside the viewer list step from 1x. The result stays within the
/// list, so stepping past either end returns the end value.
#[must_use]
pub fn shift_speed(current: f64, direction: i32) -> f64 {
    let current_index = VIEWER_SPEED_PRESETS
        .iter()
        .position(|preset| (preset - current).abs() < f64::EPSILON)
        .or_else(|| VIEWER_SPEED_PRESETS.iter().position(|preset| (*preset - 1.0).abs() < f64::EPSILON))
        .unwrap_or(0);
    let next_index = match direction.signum() {
        1 => (current_index + 1).min(VIEWER_SPEED_PRESETS.len() - 1),
        -1 => current_index.saturating_sub(1),
        _ => current_index,
    };
    VIEWER_SPEED_PRESETS[next_index]
}

impl SessionSettings {
    /// Re-validate these settings.
    #[must_use]
    pub fn sanitize(&self) -> SanitizedSettings {
        sanitize_value(&self.to_value())
    }

    /// Apply a partial JSON object on top of these settings and re-validate.
    #[must_use]
    pub fn merge(&self, partial: &Value) -> SanitizedSettings {
        let mut merged = match self.to_value() {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        if let Some(patch) = partial.as_object() {
            for (key, value) in patch {
                merged.insert(key.clone(), value.clone());
            }
        }
        sanitize_value(&Value::Object(merged))
    }

    /// Parse settings from JSON text and sanitize them.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::InvalidSettings` when the text is not JSON.
    pub fn from_json_str(input: &str) -> Result<SanitizedSettings, PlaybackError> {
        let value: Value = serde_json::from_str(input)
            .map_err(|e| PlaybackError::InvalidSettings(format!("parse error: {e}")))?;
        Ok(sanitize_value(&value))
    }

    /// Load settings from `DECAY_*` environment variables, reading `.env` first.
    ///
    /// Unset variables keep their defaults; unparsable ones are reported as
    /// corrections rather than failing.
    ///
    /// # Errors
    ///
    /// Fails only when a `.env` file exists but cannot be read.
    pub fn from_env() -> AppResult<SanitizedSettings> {
        if let Err(err) = dotenvy::dotenv() {
            if !err.not_found() {
                return Err(anyhow::Error::new(err).context("failed to load .env"));
            }
        }

        let mut map = Map::new();
        for field in SettingField::ALL {
            let var = format!("{ENV_PREFIX}{}", field.key().to_ascii_uppercase());
            let Ok(raw) = std::env::var(&var) else {
                continue;
            };
            let value = match field {
                SettingField::QualityModel => Value::String(raw.trim().to_ascii_lowercase()),
                _ => raw
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map_or(Value::String(raw), Value::Number),
            };
            map.insert(field.key().to_string(), value);
        }

        let sanitized = sanitize_value(&Value::Object(map));
        if sanitized.has_errors() {
            tracing::warn!(
                corrected = sanitized.errors.len(),
                "environment settings corrected"
            );
        }
        Ok(sanitized)
    }

    /// Requested generations per second: `speed` generations per `tick_ms`.
    #[must_use]
    pub fn target_gen_per_sec(&self) -> f64 {
        if self.tick_ms <= 0.0 {
            return 0.0;
        }
        self.speed * 1000.0 / self.tick_ms
    }

    /// Wall-clock delay between ticks at this speed, never below `min_tick_ms`.
    #[must_use]
    pub fn tick_interval_ms(&self, min_tick_ms: f64) -> f64 {
        if self.speed <= 0.0 {
            return self.tick_ms.max(min_tick_ms);
        }
        (self.tick_ms / self.speed).max(min_tick_ms)
    }

    fn to_value(self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
