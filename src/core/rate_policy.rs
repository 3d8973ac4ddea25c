//! Throughput clamp converting a requested rate into a sustainable one.

use serde::{Deserialize, Serialize};

/// Smallest per-generation cost the policy will believe, in milliseconds.
pub const MIN_GENERATION_COST_MS: f64 = 1.0;

/// Inputs to the rate policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatePolicyInput {
    /// Requested generations per second.
    pub target_gen_per_sec: f64,
    /// Measured average cost of one generation in milliseconds.
    pub avg_generation_cost_ms: f64,
}

/// Clamp `target_gen_per_sec` to the capacity implied by the measured cost.
///
/// Negative or NaN targets count as zero and costs below one millisecond count
/// as one millisecond, so the result is always finite and never exceeds either
/// the request or `1000 / avg_generation_cost_ms`.
#[must_use]
pub fn compute_effective_gen_per_sec(input: RatePolicyInput) -> f64 {
    let safe_target = sanitize_rate(input.target_gen_per_sec);
    let safe_cost = sanitize_cost(input.avg_generation_cost_ms);
    let capacity_gen_per_sec = 1000.0 / safe_cost;
    safe_target.min(capacity_gen_per_sec)
}

/// Non-finite or negative rates collapse to zero; `+inf` is kept so the
/// capacity bound can take over.
pub(crate) fn sanitize_rate(rate: f64) -> f64 {
    if rate.is_nan() {
        0.0
    } else {
        rate.max(0.0)
    }
}

pub(crate) fn sanitize_cost(cost_ms: f64) -> f64 {
    if cost_ms.is_finite() {
        cost_ms.max(MIN_GENERATION_COST_MS)
    } else if cost_ms == f64::INFINITY {
        f64::MAX
    } else {
        MIN_GENERATION_COST_MS
    }
}
