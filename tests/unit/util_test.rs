//! Tests for utility functions

use decay_playback::core::PlaybackState;
use decay_playback::util::{build_status_metrics, format_elapsed, init_tracing, StatusMetricId};

#[test]
fn test_format_elapsed_minutes() {
    assert_eq!(format_elapsed(59_999.0), "00:59");
    assert_eq!(format_elapsed(600_000.0), "10:00");
    assert_eq!(format_elapsed(f64::NAN), "00:00");
}

#[test]
fn test_status_metrics_order() {
    let rows = build_status_metrics(&PlaybackState::new(0.92, false));
    let ids: Vec<_> = rows.iter().map(|r| r.id).collect();
    assert_eq!(
        ids,
        [
            StatusMetricId::Generation,
            StatusMetricId::Quality,
            StatusMetricId::Elapsed,
            StatusMetricId::Fps,
            StatusMetricId::Psnr,
            StatusMetricId::Ssim,
        ]
    );
    assert_eq!(rows[0].value, "0");
    assert_eq!(rows[4].value, "--");
}

#[test]
fn test_init_tracing_is_idempotent() {
    init_tracing();
    init_tracing();
}
