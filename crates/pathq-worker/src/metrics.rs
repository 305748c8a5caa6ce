//! Pipeline and planning metrics.
//!
//! Only the `metrics` facade is used here; no recorder is installed by the
//! library, so these calls are free unless the embedding process installs one.

use metrics::{counter, histogram};
use pathq_models::Stage;

/// Metric names as constants for consistency.
pub mod names {
    pub const STAGE_CACHE_HITS: &str = "pathq_stage_cache_hits_total";
    pub const STAGE_CACHE_MISSES: &str = "pathq_stage_cache_misses_total";
    pub const STAGE_FAILURES: &str = "pathq_stage_failures_total";
    pub const STAGE_DURATION_SECONDS: &str = "pathq_stage_duration_seconds";

    pub const PLANS_BUILT: &str = "pathq_plans_built_total";
    pub const PLAN_BOUND_VIOLATIONS: &str = "pathq_plan_bound_violations_total";
}

pub fn record_stage_cache_hit(stage: Stage) {
    counter!(names::STAGE_CACHE_HITS, "stage" => stage.as_str()).increment(1);
}

pub fn record_stage_cache_miss(stage: Stage) {
    counter!(names::STAGE_CACHE_MISSES, "stage" => stage.as_str()).increment(1);
}

pub fn record_stage_failure(stage: Stage) {
    counter!(names::STAGE_FAILURES, "stage" => stage.as_str()).increment(1);
}

pub fn record_stage_duration(stage: Stage, duration_secs: f64) {
    histogram!(names::STAGE_DURATION_SECONDS, "stage" => stage.as_str()).record(duration_secs);
}

/// Record a written plan and any bound violations it carries.
pub fn record_plan_built(predicate: &str, violations: usize) {
    let labels = [("predicate", predicate.to_string())];
    counter!(names::PLANS_BUILT, &labels).increment(1);
    if violations > 0 {
        counter!(names::PLAN_BOUND_VIOLATIONS, &labels).increment(violations as u64);
    }
}
