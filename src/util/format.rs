//! Display formatting for playback status.

use serde::Serialize;

use crate::core::playback::PlaybackState;

/// Status row identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusMetricId {
    /// Generation count.
    Generation,
    /// Current quality.
    Quality,
    /// Simulated elapsed time.
    Elapsed,
    /// Achieved generations per second.
    Fps,
    /// Peak signal-to-noise ratio.
    Psnr,
    /// Structural similarity.
    Ssim,
}

/// One labelled status value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusMetric {
    /// Row identifier.
    pub id: StatusMetricId,
    /// Label.
    pub label: &'static str,
    /// Formatted value.
    pub value: String,
}

/// `mm:ss`, truncating partial seconds.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn format_elapsed(elapsed_ms: f64) -> String {
    let total_sec = if elapsed_ms.is_finite() && elapsed_ms > 0.0 {
        (elapsed_ms / 1000.0).floor() as u64
    } else {
        0
    };
    format!("{:02}:{:02}", total_sec / 60, total_sec % 60)
}

fn format_seconds(elapsed_ms: f64) -> String {
    format!("{:.1}s", elapsed_ms / 1000.0)
}

fn format_psnr(value: Option<f64>) -> String {
    match value {
        None => "--".into(),
        Some(v) if v.is_nan() => "--".into(),
        Some(v) if v.is_infinite() => "∞".into(),
        Some(v) => format!("{v:.2} dB"),
    }
}

fn format_ssim(value: Option<f64>) -> String {
    match value {
        Some(v) if !v.is_nan() => format!("{v:.4}"),
        _ => "--".into(),
    }
}

/// Status rows for a viewer.
#[must_use]
pub fn build_status_metrics(playback: &PlaybackState) -> Vec<StatusMetric> {
    vec![
        StatusMetric {
            id: StatusMetricId::Generation,
            label: "Generation",
            value: playback.generation.to_string(),
        },
        StatusMetric {
            id: StatusMetricId::Quality,
            label: "Quality",
            value: format!("{:.3}", playback.current_quality),
        },
        StatusMetric {
            id: StatusMetricId::Elapsed,
            label: "Elapsed",
            value: format_seconds(playback.elapsed_ms),
        },
        StatusMetric {
            id: StatusMetricId::Fps,
            label: "FPS",
            value: format!("{:.1}", playback.fps),
        },
        StatusMetric {
            id: StatusMetricId::Psnr,
            label: "PSNR",
            value: format_psnr(playback.psnr),
        },
        StatusMetric {
            id: StatusMetricId::Ssim,
            label: "SSIM",
            value: format_ssim(playback.ssim),
        },
    ]
}
