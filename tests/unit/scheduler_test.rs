//! Randomized invariant checks for the rate policy and scheduler

use decay_playback::core::{
    compute_effective_gen_per_sec, plan_tick, settle_after_process, DebtCap, RatePolicyInput,
    SchedulerState, SchedulerTuning,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const ROUNDS: usize = 2_000;
const EPS: f64 = 1e-9;

#[test]
fn test_effective_rate_never_exceeds_request_or_capacity() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for _ in 0..ROUNDS {
        let target = rng.random_range(0.0..1_000.0);
        let cost = rng.random_range(0.0..5_000.0);
        let rate = compute_effective_gen_per_sec(RatePolicyInput {
            target_gen_per_sec: target,
            avg_generation_cost_ms: cost,
        });
        assert!(rate.is_finite());
        assert!(rate >= 0.0);
        assert!(rate <= target + EPS);
        assert!(rate <= 1000.0 / f64::max(cost, 1.0) + EPS);
    }
}

#[test]
fn test_plan_respects_batch_and_cap() {
    let mut rng = StdRng::seed_from_u64(42);
    let mut state = SchedulerState::new(120.0);
    for _ in 0..ROUNDS {
        let delta_ms = rng.random_range(0.0..3_000.0);
        let target = rng.random_range(0.0..200.0);
        let batch = rng.random_range(1..=16_u32);

        let plan = plan_tick(state, delta_ms, target, batch);
        let debt = plan.scheduler.generation_debt;
        assert!(debt >= 0.0);
        assert!(debt <= f64::from(batch).max(target) + EPS);
        assert!(plan.steps_to_run <= batch);
        assert!(f64::from(plan.steps_to_run) <= debt + EPS);
        assert_eq!(
            plan.scheduler.avg_generation_cost_ms,
            state.avg_generation_cost_ms
        );

        let processed = rng.random_range(0..=plan.steps_to_run);
        let tick_cost = rng.random_range(0.0..400.0);
        let next = settle_after_process(plan.scheduler, processed, tick_cost);
        assert!(next.generation_debt >= 0.0);
        assert!(next.avg_generation_cost_ms >= 1.0);
        assert!(
            (next.generation_debt - (debt - f64::from(processed))).abs() < EPS,
            "debt must drop by exactly the generations processed"
        );
        state = next;
    }
}

#[test]
fn test_long_run_rate_tracks_target_when_cheap() {
    // 60 fps ticks at 10 gen/s with 2 ms generations: 600 generations in a minute.
    let mut state = SchedulerState::new(2.0);
    let mut total = 0_u32;
    for _ in 0..3_600 {
        let plan = plan_tick(state, 1000.0 / 60.0, 10.0, 4);
        total += plan.steps_to_run;
        state = settle_after_process(plan.scheduler, plan.steps_to_run, 2.0 * f64::from(plan.steps_to_run));
    }
    assert!((599..=600).contains(&total), "ran {total} generations");
}

#[test]
fn test_slow_processor_degrades_rate() {
    // Each generation costs 250 ms, so at most 4 gen/s regardless of a 20 gen/s target.
    let mut state = SchedulerState::new(250.0);
    let mut total = 0_u32;
    for _ in 0..40 {
        let plan = plan_tick(state, 250.0, 20.0, 8);
        assert!(plan.effective_gen_per_sec <= 4.0 + EPS);
        total += plan.steps_to_run;
        state = settle_after_process(plan.scheduler, plan.steps_to_run, 250.0 * f64::from(plan.steps_to_run));
    }
    // 10 seconds of wall time at 4 gen/s.
    assert!((39..=40).contains(&total), "ran {total} generations");
}

#[test]
fn test_fixed_cap_bounds_catch_up() {
    let tuning = SchedulerTuning {
        debt_cap: DebtCap::Fixed(3.0),
        ..SchedulerTuning::default()
    };
    let plan = tuning.plan_tick(SchedulerState::new(1.0), 60_000.0, 100.0, 2);
    assert_eq!(plan.scheduler.generation_debt, 3.0);
    assert_eq!(plan.steps_to_run, 2);
}
