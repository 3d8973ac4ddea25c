//! Generation-debt scheduler.
//!
//! The scheduler integrates elapsed time multiplied by the effective rate into
//! a pool of owed generations ("debt"), hands out a bounded number of steps per
//! tick, and learns the real cost of a generation from what the driver reports
//! back. Both transitions are pure: they take a state by value and return the
//! next one, so the driver owns the only authoritative copy.
//!
//! ```rust
//! use decay_playback::core::scheduler::{plan_tick, settle_after_process, SchedulerState};
//!
//! let state = SchedulerState::new(100.0);
//! let plan = plan_tick(state, 1000.0, 1.0, 10);
//! assert_eq!(plan.steps_to_run, 1);
//!
//! let next = settle_after_process(plan.scheduler, 1, 50.0);
//! assert!((next.avg_generation_cost_ms - 90.0).abs() < 1e-9);
//! assert_eq!(next.generation_debt, 0.0);
//! ```

use serde::{Deserialize, Serialize};

use super::rate_policy::{
    compute_effective_gen_per_sec, sanitize_cost, sanitize_rate, RatePolicyInput,
    MIN_GENERATION_COST_MS,
};

/// Default weight given to the newest cost sample in the moving average.
pub const DEFAULT_COST_SAMPLE_WEIGHT: f64 = 0.2;

/// Resident scheduler state, threaded through `plan_tick` and `settle_after_process`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SchedulerState {
    /// Fractional generations owed to the driver. Never negative.
    pub generation_debt: f64,
    /// Smoothed cost of one generation in milliseconds. Never below 1.
    pub avg_generation_cost_ms: f64,
}

impl SchedulerState {
    /// Create a state with no debt, seeding the cost estimate from a nominal
    /// tick duration so the first tick does not assume free processing.
    #[must_use]
    pub fn new(nominal_cost_ms: f64) -> Self {
        Self {
            generation_debt: 0.0,
            avg_generation_cost_ms: sanitize_cost(nominal_cost_ms),
        }
    }
}

/// Result of planning one tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SchedulerPlan {
    /// Throughput-clamped rate used for this tick.
    pub effective_gen_per_sec: f64,
    /// Generations the driver may attempt this tick.
    pub steps_to_run: u32,
    /// State to keep until the tick is settled.
    pub scheduler: SchedulerState,
}

/// Upper bound on how much debt may accumulate between ticks.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum DebtCap {
    /// `max(batch, target_gen_per_sec)`: one second of requested playback, or
    /// one full batch when the target is slower than that.
    #[default]
    BatchOrTarget,
    /// Fixed ceiling in generations; never below one batch.
    Fixed(f64),
}

impl DebtCap {
    fn limit(self, batch: u32, target_gen_per_sec: f64) -> f64 {
        let batch = f64::from(batch);
        match self {
            Self::BatchOrTarget => {
                let target = if target_gen_per_sec.is_finite() {
                    target_gen_per_sec
                } else {
                    0.0
                };
                batch.max(target)
            }
            Self::Fixed(limit) if limit.is_finite() => batch.max(limit),
            Self::Fixed(_) => batch,
        }
    }
}

/// Tunable scheduler policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SchedulerTuning {
    /// Debt accumulation ceiling.
    #[serde(default)]
    pub debt_cap: DebtCap,
    /// Weight of the newest per-generation cost sample, in `(0, 1]`.
    #[serde(default = "default_cost_sample_weight")]
    pub cost_sample_weight: f64,
}

const fn default_cost_sample_weight() -> f64 {
    DEFAULT_COST_SAMPLE_WEIGHT
}

impl Default for SchedulerTuning {
    fn default() -> Self {
        Self {
            debt_cap: DebtCap::default(),
            cost_sample_weight: DEFAULT_COST_SAMPLE_WEIGHT,
        }
    }
}

impl SchedulerTuning {
    /// Validate tuning values.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.cost_sample_weight > 0.0 && self.cost_sample_weight <= 1.0) {
            return Err("cost_sample_weight must be in (0, 1]".into());
        }
        if let DebtCap::Fixed(limit) = self.debt_cap {
            if !limit.is_finite() || limit < 1.0 {
                return Err("fixed debt cap must be a finite value >= 1".into());
            }
        }
        Ok(())
    }

    fn sample_weight(&self) -> f64 {
        if self.cost_sample_weight > 0.0 && self.cost_sample_weight <= 1.0 {
            self.cost_sample_weight
        } else {
            DEFAULT_COST_SAMPLE_WEIGHT
        }
    }

    /// Plan a tick under this tuning. See [`plan_tick`].
    #[must_use]
    pub fn plan_tick(
        &self,
        scheduler: SchedulerState,
        delta_ms: f64,
        target_gen_per_sec: f64,
        batch: u32,
    ) -> SchedulerPlan {
        let safe_batch = batch.max(1);
        let safe_delta_ms = if delta_ms.is_finite() { delta_ms.max(0.0) } else { 0.0 };
        let safe_target = sanitize_rate(target_gen_per_sec);

        let effective_gen_per_sec = compute_effective_gen_per_sec(RatePolicyInput {
            target_gen_per_sec: safe_target,
            avg_generation_cost_ms: scheduler.avg_generation_cost_ms,
        });

        let raw_debt = scheduler.generation_debt.max(0.0)
            + (safe_delta_ms / 1000.0) * effective_gen_per_sec;
        let generation_debt = raw_debt.min(self.debt_cap.limit(safe_batch, safe_target));
        let steps_to_run = whole_steps(generation_debt).min(safe_batch);

        SchedulerPlan {
            effective_gen_per_sec,
            steps_to_run,
            scheduler: SchedulerState {
                generation_debt,
                ..scheduler
            },
        }
    }

    /// Settle a tick under this tuning. See [`settle_after_process`].
    #[must_use]
    pub fn settle_after_process(
        &self,
        scheduler: SchedulerState,
        processed: u32,
        tick_cost_ms: f64,
    ) -> SchedulerState {
        if processed == 0 {
            return scheduler;
        }

        let processed = f64::from(processed);
        let generation_debt = (scheduler.generation_debt - processed).max(0.0);
        let safe_tick_cost = if tick_cost_ms.is_finite() { tick_cost_ms } else { 0.0 };
        let generation_cost_ms = (safe_tick_cost / processed).max(MIN_GENERATION_COST_MS);
        let weight = self.sample_weight();
        let avg_generation_cost_ms =
            scheduler.avg_generation_cost_ms * (1.0 - weight) + generation_cost_ms * weight;

        SchedulerState {
            generation_debt,
            avg_generation_cost_ms,
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn whole_steps(debt: f64) -> u32 {
    // debt is finite and non-negative here; the cast saturates anyway
    debt.floor() as u32
}

/// Accumulate debt for `delta_ms` of elapsed time and decide how many
/// generations to run, using the default tuning.
///
/// `batch` is a hard ceiling on `steps_to_run`; negative or non-finite
/// `delta_ms` counts as zero. Only the debt field of the returned state
/// changes.
#[must_use]
pub fn plan_tick(
    scheduler: SchedulerState,
    delta_ms: f64,
    target_gen_per_sec: f64,
    batch: u32,
) -> SchedulerPlan {
    SchedulerTuning::default().plan_tick(scheduler, delta_ms, target_gen_per_sec, batch)
}

/// Pay down debt for `processed` generations and fold the observed
/// per-generation cost into the moving average (80/20).
///
/// A tick that processed nothing returns the state unchanged.
#[must_use]
pub fn settle_after_process(
    scheduler: SchedulerState,
    processed: u32,
    tick_cost_ms: f64,
) -> SchedulerState {
    SchedulerTuning::default().settle_after_process(scheduler, processed, tick_cost_ms)
}
