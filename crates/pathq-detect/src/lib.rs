//! Object model collaborators.
//!
//! This crate provides:
//! - The [`ObjectModel`] trait the planner and executor score frames through
//! - An IoU tracker that turns per-frame detections into tracks
//! - [`RecordedModel`], serving pre-computed detections from JSON
//! - [`CountingModel`], an invocation-counting, memoizing wrapper
//! - A scripted model for tests

pub mod counting;
pub mod error;
pub mod model;
pub mod recorded;
pub mod testing;
pub mod tracker;

pub use counting::CountingModel;
pub use error::{ModelError, ModelResult};
pub use model::{detect_frames, ObjectModel};
pub use recorded::RecordedModel;
pub use tracker::IouTracker;

/// Metric names emitted by model wrappers.
pub mod names {
    pub const MODEL_INVOCATIONS: &str = "pathq_model_invocations_total";
    pub const MODEL_CACHE_HITS: &str = "pathq_model_cache_hits_total";
}
