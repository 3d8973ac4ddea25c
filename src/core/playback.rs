//! Observable playback state and the bookkeeping applied after each tick.

use serde::{Deserialize, Serialize};

use super::processor::QualityMetrics;

/// Weight of the previous FPS reading in the smoothed value.
const FPS_PREV_WEIGHT: f64 = 0.7;
/// Weight of the newest FPS reading in the smoothed value.
const FPS_NEXT_WEIGHT: f64 = 0.3;

/// Where generations are executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// On the driver's own task.
    #[default]
    Local,
    /// On an offload worker.
    Offloaded,
}

/// Playback progress as seen by a viewer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaybackState {
    /// Whether the driver loop should keep ticking.
    pub is_playing: bool,
    /// Generations applied so far.
    pub generation: u64,
    /// Simulated playback time: `generation * tick_ms`.
    pub elapsed_ms: f64,
    /// Quality of the most recent generation.
    pub current_quality: f64,
    /// Smoothed generations per second actually achieved.
    pub fps: f64,
    /// Latest PSNR sample.
    pub psnr: Option<f64>,
    /// Latest SSIM sample.
    pub ssim: Option<f64>,
}

impl PlaybackState {
    /// Fresh state at generation zero.
    #[must_use]
    pub const fn new(initial_quality: f64, is_playing: bool) -> Self {
        Self {
            is_playing,
            generation: 0,
            elapsed_ms: 0.0,
            current_quality: initial_quality,
            fps: 0.0,
            psnr: None,
            ssim: None,
        }
    }
}

/// Facts about one finished tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    /// Generations applied.
    pub processed: u32,
    /// Quality of the last applied generation.
    pub last_quality: Option<f64>,
    /// Real time since the previous tick ended, in milliseconds.
    pub elapsed_delta_ms: f64,
    /// Nominal duration of one generation.
    pub tick_ms: f64,
    /// Fresh metrics, when they were sampled this tick.
    pub metrics: Option<QualityMetrics>,
    /// Whether playback must stop after this tick.
    pub stop: bool,
}

/// Fold a tick into the playback state.
#[must_use]
pub fn apply_tick(prev: PlaybackState, report: TickReport) -> PlaybackState {
    let processed = f64::from(report.processed);
    let fps = if report.processed == 0 {
        prev.fps
    } else {
        let instant = if report.elapsed_delta_ms > 0.0 {
            processed * 1000.0 / report.elapsed_delta_ms
        } else {
            prev.fps
        };
        let smooth = if prev.fps == 0.0 {
            instant
        } else {
            prev.fps * FPS_PREV_WEIGHT + instant * FPS_NEXT_WEIGHT
        };
        if smooth.is_finite() {
            smooth
        } else {
            prev.fps
        }
    };

    let (psnr, ssim) = report
        .metrics
        .map_or((prev.psnr, prev.ssim), |m| (m.psnr, m.ssim));

    PlaybackState {
        is_playing: prev.is_playing && !report.stop,
        generation: prev.generation + u64::from(report.processed),
        elapsed_ms: processed.mul_add(report.tick_ms, prev.elapsed_ms),
        current_quality: if report.processed > 0 {
            report.last_quality.unwrap_or(prev.current_quality)
        } else {
            prev.current_quality
        },
        fps,
        psnr,
        ssim,
    }
}

/// Whether quality metrics should be sampled after reaching `generation`.
#[must_use]
pub const fn should_sample_metrics(generation: u64, interval: u64) -> bool {
    generation == 1 || (interval > 0 && generation > 0 && generation % interval == 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(processed: u32, elapsed_delta_ms: f64) -> TickReport {
        TickReport {
            processed,
            last_quality: Some(0.5),
            elapsed_delta_ms,
            tick_ms: 120.0,
            metrics: None,
            stop: false,
        }
    }

    #[test]
    fn test_first_sample_taken_as_is() {
        let next = apply_tick(PlaybackState::new(0.92, true), report(2, 100.0));
        assert!((next.fps - 20.0).abs() < 1e-9);
        assert_eq!(next.generation, 2);
        assert!((next.elapsed_ms - 240.0).abs() < 1e-9);
        assert_eq!(next.current_quality, 0.5);
    }

    #[test]
    fn test_fps_is_smoothed() {
        let prev = PlaybackState {
            fps: 10.0,
            ..PlaybackState::new(0.92, true)
        };
        let next = apply_tick(prev, report(2, 100.0));
        assert!((next.fps - (10.0 * 0.7 + 20.0 * 0.3)).abs() < 1e-9);
    }

    #[test]
    fn test_empty_tick_keeps_progress() {
        let prev = PlaybackState {
            fps: 12.0,
            generation: 7,
            ..PlaybackState::new(0.8, true)
        };
        let next = apply_tick(
            prev,
            TickReport {
                stop: true,
                ..report(0, 50.0)
            },
        );
        assert_eq!(next.fps, 12.0);
        assert_eq!(next.generation, 7);
        assert_eq!(next.current_quality, 0.8);
        assert!(!next.is_playing);
    }

    #[test]
    fn test_metrics_replace_previous() {
        let prev = PlaybackState {
            psnr: Some(40.0),
            ..PlaybackState::new(0.9, true)
        };
        let next = apply_tick(
            prev,
            TickReport {
                metrics: Some(QualityMetrics { psnr: Some(31.0), ssim: Some(0.9) }),
                ..report(1, 10.0)
            },
        );
        assert_eq!(next.psnr, Some(31.0));
        assert_eq!(next.ssim, Some(0.9));
    }

    #[test]
    fn test_metrics_cadence() {
        assert!(should_sample_metrics(1, 5));
        assert!(!should_sample_metrics(2, 5));
        assert!(should_sample_metrics(10, 5));
        assert!(!should_sample_metrics(0, 5));
    }
}
