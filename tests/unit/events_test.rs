//! Tests for session event sinks

use decay_playback::core::{
    build_playback_event, EventSink, InMemoryEventSink, PlaybackEventKind, TracingEventSink,
};

#[test]
fn test_in_memory_sink_keeps_order() {
    let mut sink = InMemoryEventSink::new(10);
    sink.record(build_playback_event(1, PlaybackEventKind::SessionStarted, 0, "started"));
    sink.record(build_playback_event(1, PlaybackEventKind::Paused, 4, "paused"));

    let kinds: Vec<_> = sink.events().iter().map(|e| e.kind).collect();
    assert_eq!(kinds, [PlaybackEventKind::SessionStarted, PlaybackEventKind::Paused]);
    assert_eq!(sink.latest().map(|e| e.generation), Some(4));
}

#[test]
fn test_zero_capacity_keeps_latest() {
    let mut sink = InMemoryEventSink::new(0);
    sink.record(build_playback_event(2, PlaybackEventKind::Stalled, 9, "stalled"));
    sink.record(build_playback_event(2, PlaybackEventKind::SessionEnded, 9, "closed"));
    assert_eq!(sink.events().len(), 1);
    assert_eq!(sink.latest().map(|e| e.kind), Some(PlaybackEventKind::SessionEnded));
}

#[test]
fn test_event_serializes_snake_case() {
    let event = build_playback_event(3, PlaybackEventKind::OffloadFallback, 12, "fell back");
    let value = serde_json::to_value(&event).expect("serialize");
    assert_eq!(value["kind"], "offload_fallback");
    assert_eq!(value["epoch"], 3);
    assert_eq!(value["message"], "fell back");
}

#[test]
fn test_tracing_sink_accepts_events() {
    let mut sink = TracingEventSink;
    sink.record(build_playback_event(1, PlaybackEventKind::EncodeFailed, 1, "failed"));
}
