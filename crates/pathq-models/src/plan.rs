//! Execution plans.
//!
//! A [`Plan`] is the single source of truth for one execution run. It is
//! written once by the planner and never edited; re-planning produces a new
//! plan, optionally seeded with an older plan's quality samples.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::artifact::ArtifactKey;
use crate::quality::QualityCurve;

/// Chosen filter stage configuration and its measured quality.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FilterPlan {
    /// Minimum mean track confidence to keep a track
    pub threshold: f64,
    pub accuracy: f64,
    pub cost: f64,
}

/// Chosen uncertainty/refine configuration and its measured quality.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RefinePlan {
    /// Tracks scoring above this are re-verified
    pub uncertainty_threshold: f64,
    /// Model confidence used during the refine pass
    pub refine_threshold: f64,
    pub accuracy: f64,
    pub cost: f64,
}

/// Record of a planning step that could not meet the bound and was accepted anyway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BoundViolationNote {
    /// Planning step that fell short (`"q"` or `"filter_refine"`)
    pub step: String,
    pub achieved_accuracy: f64,
}

/// Refine pass stride for a detect stride `freq` and effective rate `q`.
///
/// Uses `q` when it is denser than the detect stride, otherwise halves
/// the detect stride.
pub fn refine_rate(freq: u32, q: u32) -> u32 {
    if q >= 1 && q < freq {
        q
    } else {
        (freq / 2).max(1)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Plan {
    /// Catalogue query the plan was built for
    pub query: String,
    /// Registered query predicate name
    pub predicate: String,
    /// Detect stage sampling frequency (one frame in `freq`)
    pub freq: u32,
    /// Required accuracy bound
    pub bound: f64,
    /// Quality curves keyed by the sampling frequency they were built for
    pub q_samples: BTreeMap<u32, QualityCurve>,
    /// Effective sampling rate chosen from the quality curve
    pub q: u32,
    pub filter: FilterPlan,
    pub refine: RefinePlan,
    /// Bound violations the operator accepted
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bound_violations: Vec<BoundViolationNote>,
    pub created_at: DateTime<Utc>,
}

impl Plan {
    pub fn filter_threshold(&self) -> f64 {
        self.filter.threshold
    }

    pub fn uncertainty_threshold(&self) -> f64 {
        self.refine.uncertainty_threshold
    }

    pub fn refine_threshold(&self) -> f64 {
        self.refine.refine_threshold
    }

    /// Key used to address this plan's stage artifacts.
    pub fn key(&self) -> ArtifactKey {
        ArtifactKey::new(self.query.clone(), self.predicate.clone(), self.freq, self.bound)
    }

    /// The same parameters applied to another query over the same predicate.
    pub fn for_query(&self, query: &str) -> Plan {
        Plan {
            query: query.to_string(),
            ..self.clone()
        }
    }

    /// Frame stride of the refine pass.
    pub fn refine_rate(&self) -> u32 {
        refine_rate(self.freq, self.q)
    }

    /// Quality curve sampled for this plan's frequency, if any.
    pub fn curve(&self) -> Option<&QualityCurve> {
        self.q_samples.get(&self.freq)
    }

    /// Returns true if any planning step missed the bound.
    pub fn is_degraded(&self) -> bool {
        !self.bound_violations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::QualitySample;

    fn sample_plan(freq: u32, q: u32) -> Plan {
        let mut q_samples = BTreeMap::new();
        q_samples.insert(
            freq,
            QualityCurve::from_samples([
                QualitySample::new(1, 0.99, 10.0),
                QualitySample::new(2, 0.95, 5.0),
            ]),
        );
        Plan {
            query: "shibuya".to_string(),
            predicate: "shibuya".to_string(),
            freq,
            bound: 0.9,
            q_samples,
            q,
            filter: FilterPlan { threshold: 0.3, accuracy: 0.93, cost: 40.0 },
            refine: RefinePlan {
                uncertainty_threshold: 0.4,
                refine_threshold: 0.25,
                accuracy: 0.92,
                cost: 55.0,
            },
            bound_violations: vec![],
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_plan_roundtrip() {
        let plan = sample_plan(16, 2);
        let json = serde_json::to_string_pretty(&plan).unwrap();
        let parsed: Plan = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.q_samples, plan.q_samples);
        assert_eq!(parsed.filter_threshold(), 0.3);
        assert_eq!(parsed.uncertainty_threshold(), 0.4);
        assert_eq!(parsed.refine_threshold(), 0.25);
        assert_eq!(parsed, plan);
    }

    #[test]
    fn test_refine_rate() {
        assert_eq!(sample_plan(16, 2).refine_rate(), 2);
        assert_eq!(sample_plan(16, 32).refine_rate(), 8);
        assert_eq!(sample_plan(1, 2).refine_rate(), 1);
    }

    #[test]
    fn test_plan_key() {
        let key = sample_plan(8, 1).key();
        assert_eq!(key, ArtifactKey::new("shibuya", "shibuya", 8, 0.9));

        let night = sample_plan(8, 1).for_query("shibuya-night");
        assert_eq!(night.key(), ArtifactKey::new("shibuya-night", "shibuya", 8, 0.9));
        assert_eq!(night.q, 1);
    }
}
