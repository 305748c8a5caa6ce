//! Dataset and model configuration.
//!
//! Both are read-only inputs to planning and execution. Missing fields fall
//! back to the defaults below so catalogue files only need to name what
//! differs.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::quality::AccuracyMetric;
use crate::track::Track;

/// Half-open frame interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FrameRange {
    pub start: u64,
    pub end: u64,
}

impl FrameRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, frame_idx: u64) -> bool {
        frame_idx >= self.start && frame_idx < self.end
    }

    /// Every `stride`-th frame starting at `start`. A zero stride is treated as 1.
    pub fn sampled(&self, stride: u32) -> impl Iterator<Item = u64> {
        (self.start..self.end).step_by(stride.max(1) as usize)
    }
}

/// Held-out data used to measure accuracy while planning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DatasetConfig {
    pub name: String,
    /// Query predicate evaluated on this dataset
    pub predicate: String,
    /// Frames used for quality sampling
    pub validation: FrameRange,
    /// Ground-truth tracks over the validation range
    #[serde(default)]
    pub ground_truth: Vec<Track>,
}

/// IoU tracker parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TrackerConfig {
    /// Minimum IoU to associate a detection with a track
    #[serde(default = "default_iou_threshold")]
    pub iou_threshold: f64,
    /// Sampled frames a track may go unmatched before it is closed
    #[serde(default = "default_max_gap")]
    pub max_gap: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            iou_threshold: default_iou_threshold(),
            max_gap: default_max_gap(),
        }
    }
}

/// Detection model and planning search parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ModelConfig {
    pub name: String,
    /// Confidence floor for the detect stage
    #[serde(default = "default_base_confidence")]
    pub base_confidence: f64,
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub metric: AccuracyMetric,
    /// IoU needed for a predicted detection to count as the ground-truth object
    #[serde(default = "default_match_iou")]
    pub match_iou: f64,
    /// Candidate filter thresholds, ascending
    #[serde(default = "default_filter_grid")]
    pub filter_grid: Vec<f64>,
    /// Candidate uncertainty thresholds, ascending
    #[serde(default = "default_uncertainty_grid")]
    pub uncertainty_grid: Vec<f64>,
    /// Candidate refine-pass confidences
    #[serde(default = "default_refine_grid")]
    pub refine_grid: Vec<f64>,
    /// Upper bound on concurrent quality samples (model capacity)
    #[serde(default = "default_max_parallel_samples")]
    pub max_parallel_samples: usize,
}

impl ModelConfig {
    /// Defaults for a named model.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_confidence: default_base_confidence(),
            tracker: TrackerConfig::default(),
            metric: AccuracyMetric::default(),
            match_iou: default_match_iou(),
            filter_grid: default_filter_grid(),
            uncertainty_grid: default_uncertainty_grid(),
            refine_grid: default_refine_grid(),
            max_parallel_samples: default_max_parallel_samples(),
        }
    }
}

fn default_iou_threshold() -> f64 {
    0.3
}

fn default_max_gap() -> u32 {
    2
}

fn default_base_confidence() -> f64 {
    0.1
}

fn default_match_iou() -> f64 {
    0.5
}

fn default_filter_grid() -> Vec<f64> {
    (0..10).map(|i| i as f64 / 10.0).collect()
}

fn default_uncertainty_grid() -> Vec<f64> {
    (0..=10).map(|i| i as f64 / 10.0).collect()
}

fn default_refine_grid() -> Vec<f64> {
    vec![0.1, 0.25, 0.5]
}

fn default_max_parallel_samples() -> usize {
    4
}
