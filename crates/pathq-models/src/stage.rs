//! Pipeline stage definitions.
//!
//! The executor runs these stages strictly in order for one plan:
//!
//! - `Detect`: per-frame detection at the plan's sampling rate
//! - `Track`: associate detections into tracks
//! - `Filter`: drop low-confidence tracks
//! - `EstimateUncertainty`: score surviving tracks, flag uncertain ones
//! - `Refine`: re-score flagged tracks with a denser pass
//! - `Final`: evaluate the query predicate over refined tracks

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Detect,
    Track,
    Filter,
    EstimateUncertainty,
    Refine,
    Final,
}

impl Stage {
    /// All stages in execution order.
    pub const ALL: &'static [Stage] = &[
        Stage::Detect,
        Stage::Track,
        Stage::Filter,
        Stage::EstimateUncertainty,
        Stage::Refine,
        Stage::Final,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Detect => "detect",
            Stage::Track => "track",
            Stage::Filter => "filter",
            Stage::EstimateUncertainty => "estimate_uncertainty",
            Stage::Refine => "refine",
            Stage::Final => "final",
        }
    }

    /// File name of the stage's persisted artifact.
    pub fn artifact_name(&self) -> &'static str {
        match self {
            Stage::Detect => "detect.json",
            Stage::Track => "track.json",
            Stage::Filter => "filter.json",
            Stage::EstimateUncertainty => "uncertainty.json",
            Stage::Refine => "refine.json",
            Stage::Final => "final.json",
        }
    }

    /// Stage whose artifact this stage consumes.
    pub fn predecessor(&self) -> Option<Stage> {
        match self {
            Stage::Detect => None,
            Stage::Track => Some(Stage::Detect),
            Stage::Filter => Some(Stage::Track),
            Stage::EstimateUncertainty => Some(Stage::Filter),
            Stage::Refine => Some(Stage::EstimateUncertainty),
            Stage::Final => Some(Stage::Refine),
        }
    }

    /// Returns true if this stage invokes the detection model.
    pub fn invokes_model(&self) -> bool {
        matches!(self, Stage::Detect | Stage::Refine)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Stage {
    type Err = StageParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "detect" => Ok(Stage::Detect),
            "track" => Ok(Stage::Track),
            "filter" => Ok(Stage::Filter),
            "estimate_uncertainty" | "uncertainty" => Ok(Stage::EstimateUncertainty),
            "refine" => Ok(Stage::Refine),
            "final" => Ok(Stage::Final),
            _ => Err(StageParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown pipeline stage: {0}")]
pub struct StageParseError(String);
