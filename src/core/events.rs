//! Session event sinks.
//!
//! The driver records what happened to a session (started, stalled, fell back
//! to local processing, ...) so a UI can derive notices without the driver
//! knowing anything about presentation.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::util::clock::now_ms;

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackEventKind {
    /// A new image was loaded and playback began.
    SessionStarted,
    /// Playback returned to the first frame.
    SessionReset,
    /// Playback was paused.
    Paused,
    /// Playback resumed.
    Resumed,
    /// A generation failed after exhausting retries; playback stopped.
    EncodeFailed,
    /// A tick planned work but processed nothing; playback stopped.
    Stalled,
    /// The configured generation limit was reached.
    ReachedMaxGenerations,
    /// The offloaded path failed; processing continues locally.
    OffloadFallback,
    /// Settings were corrected during validation.
    SettingsCorrected,
    /// The session was closed.
    SessionEnded,
}

impl PlaybackEventKind {
    /// Whether the event should be surfaced as a warning.
    #[must_use]
    pub const fn is_warning(self) -> bool {
        matches!(
            self,
            Self::EncodeFailed
                | Self::Stalled
                | Self::ReachedMaxGenerations
                | Self::OffloadFallback
                | Self::SettingsCorrected
        )
    }
}

/// A recorded session event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackEvent {
    /// Event identifier.
    pub event_id: String,
    /// Session epoch the event belongs to.
    pub epoch: u64,
    /// Event kind.
    pub kind: PlaybackEventKind,
    /// Generation count when the event was recorded.
    pub generation: u64,
    /// Human-readable detail.
    pub message: String,
    /// Timestamp milliseconds.
    pub created_at_ms: u128,
}

/// Event sink abstraction.
pub trait EventSink: Send {
    /// Record an event.
    fn record(&mut self, event: PlaybackEvent);
}

/// Bounded in-memory sink; the oldest events are dropped first.
pub struct InMemoryEventSink {
    events: VecDeque<PlaybackEvent>,
    max_events: usize,
}

impl InMemoryEventSink {
    /// Create a sink holding at most `max_events` events.
    #[must_use]
    pub fn new(max_events: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(max_events.min(1024)),
            max_events: max_events.max(1),
        }
    }

    /// Snapshot of stored events, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<PlaybackEvent> {
        self.events.iter().cloned().collect()
    }

    /// Most recent event, if any.
    #[must_use]
    pub fn latest(&self) -> Option<&PlaybackEvent> {
        self.events.back()
    }
}

impl EventSink for InMemoryEventSink {
    fn record(&mut self, event: PlaybackEvent) {
        if self.events.len() >= self.max_events {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }
}

/// Sink that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn record(&mut self, event: PlaybackEvent) {
        if event.kind.is_warning() {
            tracing::warn!(epoch = event.epoch, kind = ?event.kind, generation = event.generation, "{}", event.message);
        } else {
            tracing::info!(epoch = event.epoch, kind = ?event.kind, generation = event.generation, "{}", event.message);
        }
    }
}

/// Build an event stamped with a fresh id and the current time.
pub fn build_playback_event(
    epoch: u64,
    kind: PlaybackEventKind,
    generation: u64,
    message: impl Into<String>,
) -> PlaybackEvent {
    PlaybackEvent {
        event_id: uuid::Uuid::new_v4().to_string(),
        epoch,
        kind,
        generation,
        message: message.into(),
        created_at_ms: now_ms(),
    }
}
