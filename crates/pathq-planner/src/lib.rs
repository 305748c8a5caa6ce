//! Cost-aware plan search.
//!
//! This crate provides:
//! - Query accuracy scoring of produced tracks against ground truth
//! - The quality sampler (q -> accuracy, cost)
//! - `plan_q` and the filter/uncertainty/refine threshold search
//! - The filter, uncertainty and refine stage logic shared with the executor
//! - [`PlanBuilder`], which assembles a complete [`pathq_models::Plan`]

pub mod builder;
pub mod error;
pub mod planner;
pub mod sampler;
pub mod scoring;
pub mod stages;

pub use builder::PlanBuilder;
pub use error::{PlannerError, PlannerResult};
pub use planner::{plan_q, Planned, ThresholdPlanner, ThresholdSearch};
pub use sampler::{default_q_grid, QualitySampler};
pub use scoring::{QueryAccuracy, TrackMatcher};
