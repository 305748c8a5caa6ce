//! Persisted pipeline stage artifacts.
//!
//! Every stage output is wrapped in a [`StageArtifact`] that records the
//! format version, the stage, and the plan key it was produced for. A
//! stored artifact is only reused when all three match; anything else is a
//! cache miss and the stage recomputes.
//!
//! Artifacts carry no timestamps so identical inputs serialize to identical
//! bytes.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::stage::Stage;
use crate::track::{FrameDetections, Track};

/// Version of the artifact format.
/// Increment this when a payload changes shape to invalidate old artifacts.
pub const ARTIFACT_VERSION: u32 = 1;

/// Identity of one run's artifacts: `(query, freq, bound)` plus the
/// predicate the plan evaluates.
///
/// Queries sharing a predicate still read different sources, so the query
/// name is part of the identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ArtifactKey {
    pub query: String,
    pub predicate: String,
    pub freq: u32,
    pub bound: f64,
}

impl ArtifactKey {
    pub fn new(
        query: impl Into<String>,
        predicate: impl Into<String>,
        freq: u32,
        bound: f64,
    ) -> Self {
        Self {
            query: query.into(),
            predicate: predicate.into(),
            freq,
            bound,
        }
    }
}

/// Versioned, keyed envelope around a stage payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StageArtifact<T> {
    pub version: u32,
    pub stage: Stage,
    pub key: ArtifactKey,
    pub payload: T,
}

impl<T> StageArtifact<T> {
    pub fn new(stage: Stage, key: ArtifactKey, payload: T) -> Self {
        Self {
            version: ARTIFACT_VERSION,
            stage,
            key,
            payload,
        }
    }

    /// Check that this artifact was produced by `stage` for `key` in the current format.
    pub fn is_valid_for(&self, stage: Stage, key: &ArtifactKey) -> bool {
        self.version == ARTIFACT_VERSION && self.stage == stage && &self.key == key
    }

    pub fn into_payload(self) -> T {
        self.payload
    }
}

/// Output of the `Detect` stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DetectOutput {
    /// Sampling rate the frames were scored at
    pub freq: u32,
    pub frames: Vec<FrameDetections>,
}

/// Output of the `Track` stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TrackOutput {
    pub tracks: Vec<Track>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FilterDecision {
    pub track_id: u64,
    /// Track confidence the threshold was compared against
    pub confidence: f64,
    pub keep: bool,
}

/// Output of the `Filter` stage: one decision per input track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FilterOutput {
    pub decisions: Vec<FilterDecision>,
}

impl FilterOutput {
    /// Ids of tracks that survived the filter.
    pub fn kept_ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.decisions.iter().filter(|d| d.keep).map(|d| d.track_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct UncertaintyScore {
    pub track_id: u64,
    pub score: f64,
    /// True when the track needs the refine pass
    pub flagged: bool,
}

/// Output of the `EstimateUncertainty` stage: one score per kept track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct UncertaintyOutput {
    pub scores: Vec<UncertaintyScore>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RefineAction {
    /// Not flagged; carried through unchanged
    Passed,
    /// Flagged, re-scored, and no better evidence found
    Confirmed,
    /// Flagged and replaced by the refined track
    Replaced,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RefineDecision {
    pub track_id: u64,
    pub action: RefineAction,
    /// Model invocations spent on this track
    pub frames_scored: u64,
}

/// Output of the `Refine` stage: decisions plus the refined track set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RefineOutput {
    pub decisions: Vec<RefineDecision>,
    pub tracks: Vec<Track>,
}

/// Final query result: refined tracks that satisfy the predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FinalOutput {
    pub predicate: String,
    pub tracks: Vec<Track>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_validity() {
        let key = ArtifactKey::new("shibuya", "shibuya", 16, 0.9);
        let artifact = StageArtifact::new(Stage::Track, key.clone(), TrackOutput { tracks: vec![] });

        assert!(artifact.is_valid_for(Stage::Track, &key));
        assert!(!artifact.is_valid_for(Stage::Filter, &key));
        assert!(!artifact.is_valid_for(
            Stage::Track,
            &ArtifactKey::new("shibuya", "shibuya", 16, 0.8)
        ));
        assert!(!artifact.is_valid_for(
            Stage::Track,
            &ArtifactKey::new("shibuya-night", "shibuya", 16, 0.9)
        ));

        let mut stale = artifact.clone();
        stale.version = ARTIFACT_VERSION + 1;
        assert!(!stale.is_valid_for(Stage::Track, &key));
    }

    #[test]
    fn test_filter_kept_ids() {
        let output = FilterOutput {
            decisions: vec![
                FilterDecision { track_id: 1, confidence: 0.9, keep: true },
                FilterDecision { track_id: 2, confidence: 0.1, keep: false },
                FilterDecision { track_id: 3, confidence: 0.5, keep: true },
            ],
        };
        assert_eq!(output.kept_ids().collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn test_refine_action_serde() {
        let json = serde_json::to_string(&RefineAction::Replaced).unwrap();
        assert_eq!(json, "\"replaced\"");
    }
}
