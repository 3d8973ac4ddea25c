//! Quality decay model: which quality each generation is encoded at.

use crate::config::settings::{QualityModel, SessionSettings};

/// Quality for the given generation (1-based) under `settings`.
///
/// The result always lies in `[min_quality, 1]`.
#[must_use]
pub fn compute_quality(settings: &SessionSettings, generation: u64) -> f64 {
    let SessionSettings {
        initial_quality,
        min_quality,
        linear_decay,
        exponential_decay,
        quality_model,
        ..
    } = *settings;
    let upper = 1.0_f64.max(min_quality);

    #[allow(clippy::cast_precision_loss)]
    let g = generation as f64;
    let raw = match quality_model {
        QualityModel::Fixed => initial_quality,
        QualityModel::Linear => initial_quality - linear_decay * g,
        QualityModel::Exponential => initial_quality * exponential_decay.powf(g),
    };
    raw.clamp(min_quality, upper)
}

/// Qualities for the `steps` generations following `base_generation`.
#[must_use]
pub fn plan_qualities(settings: &SessionSettings, base_generation: u64, steps: u32) -> Vec<f64> {
    (1..=u64::from(steps))
        .map(|step| compute_quality(settings, base_generation + step))
        .collect()
}
