//! Observational wall clock for a viewing session.
//!
//! This clock answers "how long has the session been open". It is advanced on
//! a slow external cadence and is never consulted for scheduler debt, which is
//! driven by the driver loop's own monotonic tick deltas.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Wall-clock state owned by a playback session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WallClockState {
    /// Session anchor in milliseconds since the epoch; `None` before any media is loaded.
    pub session_started_at_ms: Option<u64>,
    /// Last observed time in milliseconds since the epoch.
    pub now_ms: Option<u64>,
    /// Real time elapsed since the anchor.
    pub elapsed_real_ms: u64,
}

impl WallClockState {
    /// Create a clock, anchored at `started_at_ms` when given.
    #[must_use]
    pub const fn new(started_at_ms: Option<u64>) -> Self {
        match started_at_ms {
            Some(started) => Self {
                session_started_at_ms: Some(started),
                now_ms: Some(started),
                elapsed_real_ms: 0,
            },
            None => Self {
                session_started_at_ms: None,
                now_ms: None,
                elapsed_real_ms: 0,
            },
        }
    }

    /// Whether a session anchor is set.
    #[must_use]
    pub const fn is_anchored(&self) -> bool {
        self.session_started_at_ms.is_some()
    }

    /// Advance the clock to `now_ms`.
    ///
    /// Without an anchor this borrows `self` back unchanged so callers can
    /// detect the no-op with `matches!(.., Cow::Borrowed(_))`. A `now_ms`
    /// earlier than the anchor yields zero elapsed time.
    #[must_use]
    pub fn advance(&self, now_ms: u64) -> Cow<'_, Self> {
        let Some(started) = self.session_started_at_ms else {
            return Cow::Borrowed(self);
        };

        Cow::Owned(Self {
            now_ms: Some(now_ms),
            elapsed_real_ms: now_ms.saturating_sub(started),
            ..*self
        })
    }
}
