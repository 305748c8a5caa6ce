//! Shared data models for PathQ.
//!
//! This crate provides Serde-serializable types for:
//! - Geometry (points, rectangles, polygons)
//! - Detections and tracks, including per-frame densification
//! - Quality curves and execution plans
//! - Pipeline stages and their persisted artifacts
//! - Dataset and model configuration

pub mod artifact;
pub mod config;
pub mod geometry;
pub mod plan;
pub mod quality;
pub mod stage;
pub mod track;

// Re-export common types
pub use artifact::{
    ArtifactKey, DetectOutput, FilterDecision, FilterOutput, FinalOutput, RefineAction,
    RefineDecision, RefineOutput, StageArtifact, TrackOutput, UncertaintyOutput,
    UncertaintyScore, ARTIFACT_VERSION,
};
pub use config::{DatasetConfig, FrameRange, ModelConfig, TrackerConfig};
pub use geometry::{GeometryError, Point, Polygon, Rect};
pub use plan::{refine_rate, BoundViolationNote, FilterPlan, Plan, RefinePlan};
pub use quality::{AccuracyMetric, QualityCurve, QualitySample};
pub use stage::{Stage, StageParseError};
pub use track::{Detection, FrameDetections, Track, TrackError};
