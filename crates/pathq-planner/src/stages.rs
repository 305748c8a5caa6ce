//! Filter, uncertainty and refine stage logic.
//!
//! The executor persists the output of each of these; the threshold search
//! runs them in memory for every candidate configuration. Both go through
//! the same functions so a plan measures exactly what execution will do.

use std::collections::{BTreeMap, HashSet};

use pathq_detect::{ModelResult, ObjectModel};
use pathq_models::{
    Detection, FilterDecision, FilterOutput, RefineAction, RefineDecision, RefineOutput, Track,
    UncertaintyOutput, UncertaintyScore,
};
use pathq_predicate::predecessor_by_time;

/// Keep tracks whose mean detection score reaches `threshold`.
pub fn filter_tracks(tracks: &[Track], threshold: f64) -> FilterOutput {
    FilterOutput {
        decisions: tracks
            .iter()
            .map(|track| {
                let confidence = track.mean_score();
                FilterDecision {
                    track_id: track.id,
                    confidence,
                    keep: confidence >= threshold,
                }
            })
            .collect(),
    }
}

/// Tracks that survived `filter`, in input order.
pub fn kept_tracks(tracks: &[Track], filter: &FilterOutput) -> Vec<Track> {
    let kept: HashSet<u64> = filter.kept_ids().collect();
    tracks.iter().filter(|t| kept.contains(&t.id)).cloned().collect()
}

/// Uncertainty of a track in `[0, 1]`.
///
/// The larger of the score standard deviation and the largest jump from a
/// box center to its predecessor's, measured in box diagonals. A track seen once is
/// maximally uncertain.
pub fn uncertainty_score(track: &Track) -> f64 {
    let detections = track.detections();
    match detections.len() {
        0 => return 0.0,
        1 => return 1.0,
        _ => {}
    }

    let mean = track.mean_score();
    let variance = detections
        .iter()
        .map(|d| (d.score - mean).powi(2))
        .sum::<f64>()
        / detections.len() as f64;

    let max_jump = (1..detections.len())
        .filter_map(|i| {
            let prev = &detections[predecessor_by_time(track, i, 0)?];
            let curr = &detections[i];
            let scale = prev.bounds.diagonal().max(curr.bounds.diagonal());
            Some(if scale > 0.0 {
                prev.center().distance(&curr.center()) / scale
            } else {
                1.0
            })
        })
        .fold(0.0_f64, f64::max);

    variance.sqrt().max(max_jump).min(1.0)
}

/// Score every track and flag those above `threshold`.
pub fn estimate_uncertainty(tracks: &[Track], threshold: f64) -> UncertaintyOutput {
    UncertaintyOutput {
        scores: tracks
            .iter()
            .map(|track| {
                let score = uncertainty_score(track);
                UncertaintyScore {
                    track_id: track.id,
                    score,
                    flagged: score > threshold,
                }
            })
            .collect(),
    }
}

/// Refine pass parameters.
#[derive(Debug, Clone, Copy)]
pub struct RefineParams {
    /// Frame stride of the re-scoring pass
    pub rate: u32,
    /// Model confidence for the re-scoring pass
    pub confidence: f64,
    /// IoU a new detection needs with the track's interpolated box
    pub iou_threshold: f64,
}

/// Re-score flagged tracks densely and replace them with what the model sees.
///
/// Each flagged track's span is re-scored every `rate` frames. At every
/// frame the detection best overlapping the track's interpolated box is
/// taken. If any are found the track is rebuilt from them (keeping the
/// original detections at frames that were not re-scored); otherwise the
/// original track is kept. Unflagged tracks pass through untouched.
pub async fn refine_tracks<M>(
    model: &M,
    tracks: &[Track],
    uncertainty: &UncertaintyOutput,
    params: RefineParams,
) -> ModelResult<RefineOutput>
where
    M: ObjectModel + ?Sized,
{
    let flagged: HashSet<u64> = uncertainty
        .scores
        .iter()
        .filter(|s| s.flagged)
        .map(|s| s.track_id)
        .collect();

    let mut decisions = Vec::with_capacity(tracks.len());
    let mut refined = Vec::with_capacity(tracks.len());

    for track in tracks {
        if !flagged.contains(&track.id) {
            decisions.push(RefineDecision {
                track_id: track.id,
                action: RefineAction::Passed,
                frames_scored: 0,
            });
            refined.push(track.clone());
            continue;
        }

        let Some((first, last)) = track.span() else {
            decisions.push(RefineDecision {
                track_id: track.id,
                action: RefineAction::Confirmed,
                frames_scored: 0,
            });
            refined.push(track.clone());
            continue;
        };

        let dense = track.densify();
        let mut found: BTreeMap<u64, Detection> = BTreeMap::new();
        let mut frames_scored = 0u64;

        for frame_idx in (first..=last).step_by(params.rate.max(1) as usize) {
            let Some(expected) = dense.at_frame(frame_idx) else {
                continue;
            };
            let detections = model.score(frame_idx, params.confidence).await?;
            frames_scored += 1;

            let best = detections
                .into_iter()
                .map(|d| (d.bounds.iou(&expected.bounds), d))
                .filter(|(iou, _)| *iou >= params.iou_threshold)
                .max_by(|a, b| a.0.total_cmp(&b.0));
            if let Some((_, detection)) = best {
                found.insert(frame_idx, detection);
            }
        }

        if found.is_empty() {
            decisions.push(RefineDecision {
                track_id: track.id,
                action: RefineAction::Confirmed,
                frames_scored,
            });
            refined.push(track.clone());
            continue;
        }

        for detection in track.detections() {
            found.entry(detection.frame_idx).or_insert(*detection);
        }
        let replacement = Track::new(track.id, found.into_values().collect())?;
        decisions.push(RefineDecision {
            track_id: track.id,
            action: RefineAction::Replaced,
            frames_scored,
        });
        refined.push(replacement);
    }

    Ok(RefineOutput {
        decisions,
        tracks: refined,
    })
}

/// Model invocations the refine pass spent.
pub fn refine_cost(output: &RefineOutput) -> u64 {
    output.decisions.iter().map(|d| d.frames_scored).sum()
}
