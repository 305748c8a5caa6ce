//! Query accuracy against ground truth.
//!
//! Produced tracks and ground-truth tracks are both filtered by the query
//! predicate; the two result sets are then matched one-to-one. A produced
//! track matches a ground-truth track when, on the majority of frames where
//! both have a box, the boxes overlap with IoU at least `match_iou`.

use pathq_models::{AccuracyMetric, Track};
use pathq_predicate::Predicate;

/// Precision and recall of one query result set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryAccuracy {
    pub precision: f64,
    pub recall: f64,
    pub matched: usize,
    pub predicted: usize,
    pub expected: usize,
}

impl QueryAccuracy {
    /// An empty side counts as perfect for its ratio.
    pub fn new(matched: usize, predicted: usize, expected: usize) -> Self {
        let ratio = |num: usize, den: usize| if den == 0 { 1.0 } else { num as f64 / den as f64 };
        Self {
            precision: ratio(matched, predicted),
            recall: ratio(matched, expected),
            matched,
            predicted,
            expected,
        }
    }

    pub fn score(&self, metric: AccuracyMetric) -> f64 {
        metric.score(self.precision, self.recall)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TrackMatcher {
    match_iou: f64,
}

impl TrackMatcher {
    pub fn new(match_iou: f64) -> Self {
        Self { match_iou }
    }

    /// Fraction of overlapping frames with a matching box, or `None` when
    /// the tracks do not match.
    ///
    /// `truth` should already be densified.
    pub fn overlap(&self, predicted: &Track, truth: &Track) -> Option<f64> {
        let mut shared = 0usize;
        let mut agreeing = 0usize;
        for detection in predicted.detections() {
            if let Some(expected) = truth.at_frame(detection.frame_idx) {
                shared += 1;
                if detection.bounds.iou(&expected.bounds) >= self.match_iou {
                    agreeing += 1;
                }
            }
        }
        if shared > 0 && agreeing * 2 > shared {
            Some(agreeing as f64 / shared as f64)
        } else {
            None
        }
    }

    /// Greedy one-to-one matching, best overlap first.
    pub fn match_count(&self, predicted: &[&Track], truth: &[Track]) -> usize {
        let dense: Vec<Track> = truth.iter().map(Track::densify).collect();

        let mut candidates: Vec<(f64, usize, usize)> = Vec::new();
        for (i, p) in predicted.iter().enumerate() {
            for (j, t) in dense.iter().enumerate() {
                if let Some(frac) = self.overlap(p, t) {
                    candidates.push((frac, i, j));
                }
            }
        }
        candidates.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));

        let mut used_predicted = vec![false; predicted.len()];
        let mut used_truth = vec![false; dense.len()];
        let mut matched = 0;
        for (_, i, j) in candidates {
            if !used_predicted[i] && !used_truth[j] {
                used_predicted[i] = true;
                used_truth[j] = true;
                matched += 1;
            }
        }
        matched
    }

    /// Accuracy of `predicted` as an answer to `predicate`.
    pub fn evaluate(&self, predicate: &Predicate, predicted: &[Track], truth: &[Track]) -> QueryAccuracy {
        let answered: Vec<&Track> = predicted
            .iter()
            .filter(|t| predicate.matches(std::slice::from_ref(*t)))
            .collect();
        let expected: Vec<Track> = truth
            .iter()
            .filter(|t| predicate.matches(std::slice::from_ref(*t)))
            .cloned()
            .collect();

        let matched = self.match_count(&answered, &expected);
        QueryAccuracy::new(matched, answered.len(), expected.len())
    }
}
