//! Predicates over object trajectories.
//!
//! A predicate receives the tracks grouped for one logical object (normally a
//! single track) and decides whether the object's path matches the query.
//! Empty input is a legitimate "no match", never an error.

use std::sync::Arc;

use pathq_models::{Polygon, Track};

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// First detection starts in `start`, last detection ends in `end`.
    StartEnd { start: Polygon, end: Polygon },
    /// Every region is visited at least once, in any order.
    PointSet(Vec<Polygon>),
    /// Regions are visited in the given order.
    Waypoint(Vec<Polygon>),
    /// Any member matches.
    Or(Vec<Arc<Predicate>>),
}

impl Predicate {
    /// Evaluate against one object's tracks.
    pub fn matches(&self, tracks: &[Track]) -> bool {
        match self {
            Predicate::Or(members) => members.iter().any(|p| p.matches(tracks)),
            _ => match tracks.first() {
                Some(track) => self.matches_track(track),
                None => false,
            },
        }
    }

    /// Evaluate against a single track.
    pub fn matches_track(&self, track: &Track) -> bool {
        match self {
            Predicate::StartEnd { start, end } => match (track.first(), track.last()) {
                (Some(first), Some(last)) => {
                    start.contains(first.center()) && end.contains(last.center())
                }
                _ => false,
            },
            Predicate::PointSet(regions) => point_set(regions, track),
            Predicate::Waypoint(regions) => waypoint(regions, track),
            Predicate::Or(members) => members.iter().any(|p| p.matches_track(track)),
        }
    }
}

fn point_set(regions: &[Polygon], track: &Track) -> bool {
    if regions.is_empty() || track.is_empty() {
        return false;
    }
    let dense = track.densify();
    regions.iter().all(|region| {
        dense
            .detections()
            .iter()
            .any(|d| region.contains(d.center()))
    })
}

// Forward scan with a cursor that only advances; a detection inside a later
// region than the current target does not count.
fn waypoint(regions: &[Polygon], track: &Track) -> bool {
    if regions.is_empty() {
        return false;
    }
    let dense = track.densify();
    let mut cursor = 0;
    for detection in dense.detections() {
        if regions[cursor].contains(detection.center()) {
            cursor += 1;
            if cursor == regions.len() {
                return true;
            }
        }
    }
    false
}

/// Closest earlier detection that lies more than `nframes` frames before `idx`.
///
/// Scans backward from `idx - 1` and returns the first index whose frame is
/// strictly less than `frame[idx] - nframes`. Returns `None` when the track
/// does not reach that far back or `idx` is out of range.
pub fn predecessor_by_time(track: &Track, idx: usize, nframes: u64) -> Option<usize> {
    let detections = track.detections();
    let limit = detections.get(idx)?.frame_idx.checked_sub(nframes)?;
    (0..idx).rev().find(|&i| detections[i].frame_idx < limit)
}

/// Closest earlier detection whose center is at least `distance` away from `idx`'s.
///
/// No built-in stage calls this; it serves callers that analyse trajectories
/// themselves, such as finding where a parked object started to move.
pub fn predecessor_by_distance(track: &Track, idx: usize, distance: f64) -> Option<usize> {
    let detections = track.detections();
    let target = detections.get(idx)?.center();
    (0..idx)
        .rev()
        .find(|&i| detections[i].center().distance(&target) >= distance)
}
