//! Tests for the observational wall clock

use std::borrow::Cow;

use decay_playback::core::WallClockState;

#[test]
fn test_anchored_clock_tracks_elapsed() {
    let clock = WallClockState::new(Some(10_000));
    assert!(clock.is_anchored());
    assert_eq!(clock.now_ms, Some(10_000));

    let next = clock.advance(12_500).into_owned();
    assert_eq!(next.session_started_at_ms, Some(10_000));
    assert_eq!(next.now_ms, Some(12_500));
    assert_eq!(next.elapsed_real_ms, 2_500);
}

#[test]
fn test_clock_before_anchor_saturates() {
    let clock = WallClockState::new(Some(10_000));
    let next = clock.advance(9_000).into_owned();
    assert_eq!(next.elapsed_real_ms, 0);
    assert_eq!(next.now_ms, Some(9_000));
}

#[test]
fn test_unanchored_advance_is_a_no_op() {
    let clock = WallClockState::new(None);
    assert!(matches!(clock.advance(5_000), Cow::Borrowed(_)));
    assert_eq!(clock.advance(5_000).into_owned(), clock);
}
