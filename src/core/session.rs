//! Session epochs for cancelling in-flight ticks.
//!
//! Every reset, pause, or teardown bumps the epoch. Work that suspends captures
//! an [`EpochToken`] first and checks it again before committing, so a result
//! that lands after the session moved on is dropped instead of applied.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Monotonically increasing session counter, shared between a driver and its handles.
#[derive(Debug, Clone, Default)]
pub struct SessionEpoch {
    current: Arc<AtomicU64>,
}

/// Epoch captured at the start of a unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EpochToken(u64);

impl EpochToken {
    /// Raw epoch value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl SessionEpoch {
    /// Create a counter at epoch zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture the current epoch.
    #[must_use]
    pub fn token(&self) -> EpochToken {
        EpochToken(self.current.load(Ordering::Acquire))
    }

    /// Invalidate all outstanding tokens and return the new epoch's token.
    pub fn advance(&self) -> EpochToken {
        EpochToken(self.current.fetch_add(1, Ordering::AcqRel) + 1)
    }

    /// Whether `token` still belongs to the current epoch.
    #[must_use]
    pub fn is_current(&self, token: EpochToken) -> bool {
        self.current.load(Ordering::Acquire) == token.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_valid_until_advance() {
        let epoch = SessionEpoch::new();
        let token = epoch.token();
        assert!(epoch.is_current(token));

        let next = epoch.advance();
        assert!(!epoch.is_current(token));
        assert!(epoch.is_current(next));
        assert_eq!(next.value(), token.value() + 1);
    }

    #[test]
    fn test_clones_share_counter() {
        let epoch = SessionEpoch::new();
        let handle = epoch.clone();
        let token = epoch.token();
        handle.advance();
        assert!(!epoch.is_current(token));
    }
}
