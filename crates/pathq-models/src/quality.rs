//! Quality curves: measured accuracy/cost at candidate operating points.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// One measured point on a quality curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QualitySample {
    /// Operating parameter (effective sampling rate: one frame in `param_value`)
    pub param_value: u32,
    /// Accuracy under the configured metric (0.0-1.0)
    pub accuracy: f64,
    /// Cost in model invocations
    pub cost: f64,
}

impl QualitySample {
    pub fn new(param_value: u32, accuracy: f64, cost: f64) -> Self {
        Self {
            param_value,
            accuracy,
            cost,
        }
    }
}

/// Samples ordered by parameter value, at most one per value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct QualityCurve {
    samples: Vec<QualitySample>,
}

impl QualityCurve {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a curve from unordered samples. Later duplicates win.
    pub fn from_samples(samples: impl IntoIterator<Item = QualitySample>) -> Self {
        let mut curve = Self::new();
        for sample in samples {
            curve.insert(sample);
        }
        curve
    }

    /// Insert a sample, replacing any existing sample with the same parameter.
    pub fn insert(&mut self, sample: QualitySample) {
        match self
            .samples
            .binary_search_by_key(&sample.param_value, |s| s.param_value)
        {
            Ok(i) => self.samples[i] = sample,
            Err(i) => self.samples.insert(i, sample),
        }
    }

    pub fn samples(&self) -> &[QualitySample] {
        &self.samples
    }

    pub fn get(&self, param_value: u32) -> Option<&QualitySample> {
        self.samples
            .binary_search_by_key(&param_value, |s| s.param_value)
            .ok()
            .map(|i| &self.samples[i])
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// How precision and recall are folded into a single accuracy number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum AccuracyMetric {
    Precision,
    Recall,
    F1,
    /// Both precision and recall must clear the bound.
    #[default]
    MinPrecisionRecall,
}

impl AccuracyMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccuracyMetric::Precision => "precision",
            AccuracyMetric::Recall => "recall",
            AccuracyMetric::F1 => "f1",
            AccuracyMetric::MinPrecisionRecall => "min_precision_recall",
        }
    }

    /// Combine precision and recall into an accuracy score.
    pub fn score(&self, precision: f64, recall: f64) -> f64 {
        match self {
            AccuracyMetric::Precision => precision,
            AccuracyMetric::Recall => recall,
            AccuracyMetric::F1 => {
                if precision + recall <= 0.0 {
                    0.0
                } else {
                    2.0 * precision * recall / (precision + recall)
                }
            }
            AccuracyMetric::MinPrecisionRecall => precision.min(recall),
        }
    }
}

impl fmt::Display for AccuracyMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AccuracyMetric {
    type Err = AccuracyMetricParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "precision" => Ok(AccuracyMetric::Precision),
            "recall" => Ok(AccuracyMetric::Recall),
            "f1" | "f_measure" => Ok(AccuracyMetric::F1),
            "min_precision_recall" | "min" => Ok(AccuracyMetric::MinPrecisionRecall),
            _ => Err(AccuracyMetricParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown accuracy metric: {0}")]
pub struct AccuracyMetricParseError(String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_curve_sorted_and_last_write_wins() {
        let curve = QualityCurve::from_samples([
            QualitySample::new(4, 0.8, 2.0),
            QualitySample::new(1, 0.99, 10.0),
            QualitySample::new(4, 0.7, 3.0),
        ]);

        let params: Vec<u32> = curve.samples().iter().map(|s| s.param_value).collect();
        assert_eq!(params, vec![1, 4]);
        assert_eq!(curve.get(4).unwrap().accuracy, 0.7);
    }

    #[test]
    fn test_curve_serializes_as_list() {
        let curve = QualityCurve::from_samples([QualitySample::new(2, 0.9, 5.0)]);
        let json = serde_json::to_string(&curve).unwrap();
        assert_eq!(json, r#"[{"param_value":2,"accuracy":0.9,"cost":5.0}]"#);
    }

    #[test]
    fn test_metric_scores() {
        assert_eq!(AccuracyMetric::Precision.score(0.9, 0.5), 0.9);
        assert_eq!(AccuracyMetric::Recall.score(0.9, 0.5), 0.5);
        assert_eq!(AccuracyMetric::MinPrecisionRecall.score(0.9, 0.5), 0.5);
        assert!((AccuracyMetric::F1.score(1.0, 0.5) - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(AccuracyMetric::F1.score(0.0, 0.0), 0.0);
    }

    #[test]
    fn test_metric_parse() {
        assert_eq!("f1".parse::<AccuracyMetric>().unwrap(), AccuracyMetric::F1);
        assert_eq!(
            "min".parse::<AccuracyMetric>().unwrap(),
            AccuracyMetric::MinPrecisionRecall
        );
        assert!("accuracy".parse::<AccuracyMetric>().is_err());
    }
}
