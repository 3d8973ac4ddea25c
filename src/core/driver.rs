//! Driver loop: turns scheduler plans into processed generations.
//!
//! One tick is: plan against the time since the previous tick, run up to
//! `steps_to_run` generations through the processor, settle the scheduler with
//! what actually happened, then compute when the next tick should fire.
//!
//! # Concurrency
//!
//! Session state sits behind a `parking_lot::Mutex` that is only ever held for
//! short, synchronous sections and never across an `.await`. A tick never
//! overlaps another tick (the `processing` flag), and every commit after a
//! suspension re-validates the [`EpochToken`] captured at tick entry, so a
//! reset, pause, or new upload that lands mid-tick makes the tick's results
//! disappear instead of leaking into the next session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::settings::{shift_speed, SanitizedSettings, SessionSettings};
use crate::config::DriverConfig;

use super::error::PlaybackError;
use super::events::{build_playback_event, EventSink, PlaybackEventKind, TracingEventSink};
use super::playback::{apply_tick, should_sample_metrics, ExecutionMode, PlaybackState, TickReport};
use super::processor::{reencode_with_retry, BatchOutcome, GenerationProcessor, OffloadedProcessor};
use super::quality::plan_qualities;
use super::scheduler::{SchedulerPlan, SchedulerState};
use super::session::{EpochToken, SessionEpoch};
use super::wall_clock::WallClockState;

/// Result of one call to [`PlaybackDriver::tick`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// Nothing to do: no session, or playback is paused.
    Idle,
    /// Another tick is still in flight.
    Busy,
    /// The session changed while this tick was suspended; results were discarded.
    Stale,
    /// The tick completed and its results were committed.
    Ran {
        /// Plan produced for this tick.
        plan: SchedulerPlan,
        /// Generations actually applied.
        processed: u32,
        /// Delay before the next tick, or `None` when playback stopped.
        next_delay: Option<Duration>,
    },
}

/// Point-in-time copy of a session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriverSnapshot {
    /// Whether an image is loaded.
    pub has_session: bool,
    /// Whether the session ended (failure or generation limit).
    pub has_ended: bool,
    /// Viewer-facing progress.
    pub playback: PlaybackState,
    /// Scheduler state retained between ticks.
    pub scheduler: SchedulerState,
    /// Observational wall clock.
    pub wall_clock: WallClockState,
    /// Where generations currently run.
    pub mode: ExecutionMode,
    /// Active settings.
    pub settings: SessionSettings,
    /// Current session epoch.
    pub epoch: u64,
}

impl DriverSnapshot {
    /// Image time: the session anchor plus simulated playback time.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn simulated_now_ms(&self) -> Option<u64> {
        self.wall_clock
            .session_started_at_ms
            .map(|started| started.saturating_add(self.playback.elapsed_ms.max(0.0) as u64))
    }
}

struct SessionState {
    settings: SessionSettings,
    scheduler: SchedulerState,
    wall_clock: WallClockState,
    playback: PlaybackState,
    mode: ExecutionMode,
    has_session: bool,
    has_ended: bool,
    fallback_notified: bool,
    /// Start of the previous tick (or the moment playback resumed).
    last_plan_at: Option<Instant>,
    /// End of the previous tick (or the moment playback resumed).
    last_tick_end: Option<Instant>,
}

impl SessionState {
    fn idle(settings: SessionSettings) -> Self {
        Self {
            settings,
            scheduler: SchedulerState::new(settings.tick_ms),
            wall_clock: WallClockState::new(None),
            playback: PlaybackState::new(settings.initial_quality, false),
            mode: ExecutionMode::Local,
            has_session: false,
            has_ended: false,
            fallback_notified: false,
            last_plan_at: None,
            last_tick_end: None,
        }
    }

    /// Rewind to generation zero, keeping the wall-clock anchor.
    fn rewind(&mut self, auto_play: bool) {
        self.scheduler = SchedulerState::new(self.settings.tick_ms);
        self.playback = PlaybackState::new(self.settings.initial_quality, auto_play);
        self.has_ended = false;
        self.anchor_timers(auto_play);
    }

    fn anchor_timers(&mut self, playing: bool) {
        if playing {
            let now = Instant::now();
            self.last_plan_at = Some(now);
            self.last_tick_end = Some(now);
        } else {
            self.last_plan_at = None;
            self.last_tick_end = None;
        }
    }
}

/// Clears the in-flight flag when a tick ends, however it ends.
struct ProcessingGuard<'a>(&'a AtomicBool);

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

struct DriverShared<P> {
    config: DriverConfig,
    processor: Arc<P>,
    offload: Option<Arc<dyn OffloadedProcessor>>,
    epoch: SessionEpoch,
    processing: AtomicBool,
    state: Mutex<SessionState>,
    events: Mutex<Box<dyn EventSink>>,
}

/// Playback driver for one viewer. Cheap to clone; clones share the session.
pub struct PlaybackDriver<P>
where
    P: GenerationProcessor,
{
    inner: Arc<DriverShared<P>>,
}

impl<P> Clone for PlaybackDriver<P>
where
    P: GenerationProcessor,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P> PlaybackDriver<P>
where
    P: GenerationProcessor,
{
    /// Create a driver with no session loaded.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::InvalidSettings` if `config` is invalid.
    pub fn new(
        settings: SessionSettings,
        config: DriverConfig,
        processor: Arc<P>,
        offload: Option<Arc<dyn OffloadedProcessor>>,
        events: Box<dyn EventSink>,
    ) -> Result<Self, PlaybackError> {
        config.validate().map_err(PlaybackError::InvalidSettings)?;
        let sanitized = settings.sanitize();
        let driver = Self {
            inner: Arc::new(DriverShared {
                config,
                processor,
                offload,
                epoch: SessionEpoch::new(),
                processing: AtomicBool::new(false),
                state: Mutex::new(SessionState::idle(sanitized.settings)),
                events: Mutex::new(events),
            }),
        };
        if sanitized.has_errors() {
            driver.record(PlaybackEventKind::SettingsCorrected, 0, "settings were corrected");
        }
        Ok(driver)
    }

    /// Driver with defaults, local processing only, logging events via tracing.
    ///
    /// # Errors
    ///
    /// See [`PlaybackDriver::new`].
    pub fn local(settings: SessionSettings, processor: Arc<P>) -> Result<Self, PlaybackError> {
        Self::new(
            settings,
            DriverConfig::default(),
            processor,
            None,
            Box::new(TracingEventSink),
        )
    }

    /// Driver configuration.
    #[must_use]
    pub fn config(&self) -> &DriverConfig {
        &self.inner.config
    }

    /// Current session snapshot.
    #[must_use]
    pub fn snapshot(&self) -> DriverSnapshot {
        let state = self.inner.state.lock();
        DriverSnapshot {
            has_session: state.has_session,
            has_ended: state.has_ended,
            playback: state.playback,
            scheduler: state.scheduler,
            wall_clock: state.wall_clock,
            mode: state.mode,
            settings: state.settings,
            epoch: self.inner.epoch.token().value(),
        }
    }

    /// Whether the loop should keep ticking.
    #[must_use]
    pub fn is_playing(&self) -> bool {
        let state = self.inner.state.lock();
        state.has_session && state.playback.is_playing
    }

    /// Load a new image: invalidate everything in flight, start from
    /// generation zero, anchor the wall clock at `now_ms`, and start playing.
    pub async fn start_session(&self, now_ms: u64) {
        let token = self.inner.epoch.advance();
        {
            let mut state = self.inner.state.lock();
            state.has_session = true;
            state.mode = ExecutionMode::Local;
            state.wall_clock = WallClockState::new(Some(now_ms));
            state.rewind(true);
        }
        info!(epoch = token.value(), "session started");
        self.record(PlaybackEventKind::SessionStarted, 0, "playback started");
        self.sync_offload(token).await;
    }

    /// Return to the first frame, optionally resuming playback.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::NoSession` when no image is loaded.
    pub async fn reset(&self, auto_play: bool) -> Result<(), PlaybackError> {
        let token = self.inner.epoch.advance();
        {
            let mut state = self.inner.state.lock();
            if !state.has_session {
                return Err(PlaybackError::NoSession);
            }
            state.mode = ExecutionMode::Local;
            state.rewind(auto_play);
        }
        info!(epoch = token.value(), auto_play, "session reset");

        if let Err(e) = self.inner.processor.reset_frame().await {
            warn!(error = %e, "failed to restore the original frame");
        }
        if !self.inner.epoch.is_current(token) {
            return Ok(());
        }
        self.record(PlaybackEventKind::SessionReset, 0, "returned to the first frame");
        self.sync_offload(token).await;
        Ok(())
    }

    /// Toggle playback. Playing after the session ended starts over.
    ///
    /// Returns whether playback is now running.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::NoSession` when no image is loaded.
    pub async fn play_pause(&self) -> Result<bool, PlaybackError> {
        let (playing, ended, generation) = {
            let state = self.inner.state.lock();
            if !state.has_session {
                return Err(PlaybackError::NoSession);
            }
            (state.playback.is_playing, state.has_ended, state.playback.generation)
        };

        if playing {
            self.inner.epoch.advance();
            {
                let mut state = self.inner.state.lock();
                state.playback.is_playing = false;
                state.anchor_timers(false);
            }
            self.record(PlaybackEventKind::Paused, generation, "paused");
            return Ok(false);
        }

        if ended {
            self.reset(true).await?;
            return Ok(true);
        }

        {
            let mut state = self.inner.state.lock();
            state.playback.is_playing = true;
            state.anchor_timers(true);
        }
        self.record(PlaybackEventKind::Resumed, generation, "resumed");
        Ok(true)
    }

    /// Close the session and go back to having no image.
    pub fn end_session(&self) {
        let token = self.inner.epoch.advance();
        let generation = {
            let mut state = self.inner.state.lock();
            let generation = state.playback.generation;
            let settings = state.settings;
            *state = SessionState::idle(settings);
            generation
        };
        info!(epoch = token.value(), "session ended");
        self.record(PlaybackEventKind::SessionEnded, generation, "session closed");
    }

    /// Step the speed one viewer preset faster or slower; returns the speed now in effect.
    pub fn shift_speed(&self, direction: i32) -> f64 {
        let current = self.inner.state.lock().settings.speed;
        let next = shift_speed(current, direction);
        if (next - current).abs() <= f64::EPSILON {
            return current;
        }
        self.update_settings(&serde_json::json!({ "speed": next })).settings.speed
    }

    /// Merge a partial settings object into the active settings.
    ///
    /// Takes effect from the next tick; the scheduler's cost estimate is kept.
    pub fn update_settings(&self, partial: &Value) -> SanitizedSettings {
        let (sanitized, generation) = {
            let mut state = self.inner.state.lock();
            let sanitized = state.settings.merge(partial);
            state.settings = sanitized.settings;
            if state.playback.generation == 0 {
                state.playback.current_quality = sanitized.settings.initial_quality;
            }
            (sanitized, state.playback.generation)
        };
        if sanitized.has_errors() {
            self.record(
                PlaybackEventKind::SettingsCorrected,
                generation,
                "settings were corrected",
            );
        }
        sanitized
    }

    /// Advance the observational wall clock; returns whether it changed.
    pub fn advance_clock(&self, now_ms: u64) -> bool {
        let mut state = self.inner.state.lock();
        let next = match state.wall_clock.advance(now_ms) {
            std::borrow::Cow::Borrowed(_) => return false,
            std::borrow::Cow::Owned(next) => next,
        };
        let changed = next != state.wall_clock;
        state.wall_clock = next;
        changed
    }

    /// Run one tick.
    pub async fn tick(&self) -> TickOutcome {
        if self.inner.processing.swap(true, Ordering::AcqRel) {
            return TickOutcome::Busy;
        }
        let _guard = ProcessingGuard(&self.inner.processing);

        let token = self.inner.epoch.token();
        let tick_start = Instant::now();
        let cfg = &self.inner.config;

        let (settings, plan, steps, base_generation, mode) = {
            let mut state = self.inner.state.lock();
            if !state.has_session || !state.playback.is_playing {
                return TickOutcome::Idle;
            }
            let delta_ms = state
                .last_plan_at
                .map_or(0.0, |last| millis(tick_start.saturating_duration_since(last)));
            state.last_plan_at = Some(tick_start);

            let settings = state.settings;
            let plan = cfg.tuning.plan_tick(
                state.scheduler,
                delta_ms,
                settings.target_gen_per_sec(),
                settings.batch,
            );
            let remaining = u64::from(settings.max_generations).saturating_sub(state.playback.generation);
            let steps = u32::try_from(remaining).map_or(plan.steps_to_run, |r| plan.steps_to_run.min(r));
            (settings, plan, steps, state.playback.generation, state.mode)
        };

        debug!(
            epoch = token.value(),
            steps,
            debt = plan.scheduler.generation_debt,
            effective_gen_per_sec = plan.effective_gen_per_sec,
            "planned tick"
        );

        let qualities = plan_qualities(&settings, base_generation, steps);
        let mut outcome = BatchOutcome::default();
        let mut ran_offloaded = false;

        if mode == ExecutionMode::Offloaded && !qualities.is_empty() {
            if let Some(offload) = self.inner.offload.as_ref() {
                let budget = Duration::from_millis(cfg.offload_timeout_ms);
                let failure = match tokio::time::timeout(budget, offload.process(qualities.clone(), cfg.max_encode_retry)).await {
                    Ok(Ok(result)) => {
                        outcome = result;
                        ran_offloaded = true;
                        None
                    }
                    Ok(Err(e)) => Some(e.to_string()),
                    Err(_) => Some(PlaybackError::Timeout(cfg.offload_timeout_ms).to_string()),
                };
                if let Some(reason) = failure {
                    if !self.fall_back_to_local(token, &reason, base_generation) {
                        debug!(epoch = token.value(), "discarding stale tick after offload failure");
                        return TickOutcome::Stale;
                    }
                }
            } else if !self.fall_back_to_local(token, "no offload worker configured", base_generation) {
                return TickOutcome::Stale;
            }
        }

        if !ran_offloaded {
            for &quality in &qualities {
                if !self.inner.epoch.is_current(token) || !self.is_playing() {
                    break;
                }
                if !reencode_with_retry(self.inner.processor.as_ref(), quality, cfg.max_encode_retry).await {
                    outcome.failed = true;
                    break;
                }
                outcome.processed += 1;
                outcome.last_quality = Some(quality);
            }
        }

        let tick_end = Instant::now();
        let tick_cost_ms = millis(tick_end.saturating_duration_since(tick_start));

        if !self.inner.epoch.is_current(token) {
            debug!(epoch = token.value(), processed = outcome.processed, "discarding stale tick");
            return TickOutcome::Stale;
        }

        if let Some(frame) = outcome.frame.take() {
            if let Err(e) = self.inner.processor.adopt_frame(frame).await {
                warn!(error = %e, "failed to adopt the offloaded frame");
                if !self.fall_back_to_local(token, &e.to_string(), base_generation) {
                    return TickOutcome::Stale;
                }
            }
        }

        let next_generation = base_generation + u64::from(outcome.processed);
        let metrics = if outcome.processed > 0 && should_sample_metrics(next_generation, cfg.metrics_interval) {
            self.inner.processor.measure_quality().await
        } else {
            None
        };

        let reached_limit = next_generation >= u64::from(settings.max_generations);
        let stalled = steps > 0 && outcome.processed == 0 && !outcome.failed;
        let stop = outcome.failed || stalled || reached_limit;

        {
            let mut state = self.inner.state.lock();
            if !self.inner.epoch.is_current(token) {
                debug!(epoch = token.value(), "discarding stale tick after metrics");
                return TickOutcome::Stale;
            }
            let elapsed_delta_ms = state
                .last_tick_end
                .map_or(0.0, |last| millis(tick_end.saturating_duration_since(last)));
            state.last_tick_end = Some(tick_end);

            state.scheduler = cfg.tuning.settle_after_process(plan.scheduler, outcome.processed, tick_cost_ms);
            state.playback = apply_tick(
                state.playback,
                TickReport {
                    processed: outcome.processed,
                    last_quality: outcome.last_quality,
                    elapsed_delta_ms,
                    tick_ms: settings.tick_ms,
                    metrics,
                    stop,
                },
            );
            if outcome.failed || reached_limit {
                state.has_ended = true;
            }
        }

        if outcome.failed {
            self.record(
                PlaybackEventKind::EncodeFailed,
                next_generation,
                format!("re-encode failed {} times; playback stopped", cfg.max_encode_retry),
            );
        } else if reached_limit {
            self.record(
                PlaybackEventKind::ReachedMaxGenerations,
                next_generation,
                format!("reached {} generations", settings.max_generations),
            );
        } else if stalled {
            self.record(PlaybackEventKind::Stalled, next_generation, "no generation could be applied");
        }

        let next_delay = if stop || !self.is_playing() {
            None
        } else {
            let interval_ms = settings.tick_interval_ms(cfg.min_tick_interval_ms);
            Some(duration_from_ms((interval_ms - tick_cost_ms).max(0.0)))
        };

        TickOutcome::Ran {
            plan,
            processed: outcome.processed,
            next_delay,
        }
    }

    /// Tick until playback stops, sleeping between ticks as planned.
    pub async fn run(&self) {
        let idle_retry = duration_from_ms(self.inner.config.min_tick_interval_ms);
        loop {
            match self.tick().await {
                TickOutcome::Ran { next_delay: Some(delay), .. } => tokio::time::sleep(delay).await,
                TickOutcome::Ran { next_delay: None, .. } | TickOutcome::Idle => break,
                TickOutcome::Busy | TickOutcome::Stale => {
                    if !self.is_playing() {
                        break;
                    }
                    tokio::time::sleep(idle_retry).await;
                }
            }
        }
        debug!("driver loop exited");
    }

    /// Advance the wall clock on its cadence while a session is loaded.
    ///
    /// `now_ms` supplies the current time in milliseconds since the epoch.
    pub async fn run_wall_clock<F>(&self, mut now_ms: F)
    where
        F: FnMut() -> u64 + Send,
    {
        let mut interval = tokio::time::interval(Duration::from_millis(self.inner.config.clock_cadence_ms));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if !self.snapshot().has_session {
                break;
            }
            self.advance_clock(now_ms());
        }
    }

    async fn sync_offload(&self, token: EpochToken) {
        let Some(offload) = self.inner.offload.as_ref() else {
            return;
        };
        let budget = Duration::from_millis(self.inner.config.offload_init_timeout_ms);
        let ready = matches!(tokio::time::timeout(budget, offload.resync()).await, Ok(Ok(())));

        let mut state = self.inner.state.lock();
        if !self.inner.epoch.is_current(token) {
            return;
        }
        if ready {
            state.mode = ExecutionMode::Offloaded;
            state.fallback_notified = false;
            info!(epoch = token.value(), "offload worker ready");
        } else {
            state.mode = ExecutionMode::Local;
            debug!(epoch = token.value(), "offload worker unavailable; processing locally");
        }
    }

    /// Switch to local processing for the session `token` belongs to.
    ///
    /// Returns `false` without touching anything when `token` is stale.
    fn fall_back_to_local(&self, token: EpochToken, reason: &str, generation: u64) -> bool {
        let notify = {
            let mut state = self.inner.state.lock();
            if !self.inner.epoch.is_current(token) {
                return false;
            }
            state.mode = ExecutionMode::Local;
            !std::mem::replace(&mut state.fallback_notified, true)
        };
        warn!(epoch = token.value(), reason, "offloaded processing failed; falling back to local");
        if notify {
            self.record_at(
                token,
                PlaybackEventKind::OffloadFallback,
                generation,
                format!("offloaded processing failed ({reason}); continuing locally"),
            );
        }
        true
    }

    fn record(&self, kind: PlaybackEventKind, generation: u64, message: impl Into<String>) {
        self.record_at(self.inner.epoch.token(), kind, generation, message);
    }

    fn record_at(&self, token: EpochToken, kind: PlaybackEventKind, generation: u64, message: impl Into<String>) {
        let event = build_playback_event(token.value(), kind, generation, message);
        self.inner.events.lock().record(event);
    }
}

#[allow(clippy::cast_precision_loss)]
fn millis(duration: Duration) -> f64 {
    duration.as_nanos() as f64 / 1_000_000.0
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn duration_from_ms(ms: f64) -> Duration {
    if !ms.is_finite() || ms <= 0.0 {
        return Duration::ZERO;
    }
    // the cast saturates
    Duration::from_nanos((ms * 1_000_000.0).round() as u64)
}
