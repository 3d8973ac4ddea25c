//! Tests for error types

use decay_playback::core::{PlaybackError, ProcessError};

#[test]
fn test_playback_error_display() {
    assert_eq!(
        PlaybackError::ProcessFailed { attempts: 3 }.to_string(),
        "re-encode failed after 3 attempts"
    );
    assert_eq!(PlaybackError::Timeout(10_000).to_string(), "timed out after 10000 ms");
    assert_eq!(PlaybackError::NoSession.to_string(), "no active session");
    assert_eq!(
        PlaybackError::InvalidSettings("bad".into()).to_string(),
        "invalid settings: bad"
    );
}

#[test]
fn test_process_error_display() {
    assert_eq!(
        ProcessError::Encode("toBlob returned null".into()).to_string(),
        "encode failed: toBlob returned null"
    );
    assert_eq!(
        ProcessError::Unavailable("worker exited".into()).to_string(),
        "processor unavailable: worker exited"
    );
}

#[test]
fn test_errors_convert_to_anyhow() {
    let err: anyhow::Error = PlaybackError::Offload("worker crashed".into()).into();
    assert!(err.to_string().contains("worker crashed"));
}
