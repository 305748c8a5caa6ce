//! Detections and tracks.
//!
//! A [`Track`] is the time-ordered list of detections believed to be the same
//! physical object. Tracks are never mutated after construction; downstream
//! stages filter them or derive densified copies.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::{Point, Rect};

/// One bounding-box observation of one object in one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Detection {
    /// Frame index in the source video
    pub frame_idx: u64,
    /// Track the detection was associated with, if tracking has run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_id: Option<u64>,
    /// Bounding box in pixel coordinates
    pub bounds: Rect,
    /// Model confidence (0.0-1.0)
    pub score: f64,
}

impl Detection {
    /// Create an untracked detection.
    pub fn new(frame_idx: u64, bounds: Rect, score: f64) -> Self {
        Self {
            frame_idx,
            track_id: None,
            bounds,
            score,
        }
    }

    /// Copy of this detection assigned to a track.
    pub fn with_track(mut self, track_id: u64) -> Self {
        self.track_id = Some(track_id);
        self
    }

    /// Center of the bounding box.
    #[inline]
    pub fn center(&self) -> Point {
        self.bounds.center()
    }
}

/// All detections the model reported for a single frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FrameDetections {
    pub frame_idx: u64,
    pub detections: Vec<Detection>,
}

impl FrameDetections {
    pub fn new(frame_idx: u64, detections: Vec<Detection>) -> Self {
        Self {
            frame_idx,
            detections,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackError {
    #[error("Track {track_id} has two detections in frame {frame_idx}")]
    DuplicateFrame { track_id: u64, frame_idx: u64 },
}

/// Time-ordered detections sharing one track id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Track {
    pub id: u64,
    detections: Vec<Detection>,
}

impl Track {
    /// Build a track, ordering detections by frame.
    ///
    /// Every detection is stamped with `id`. Two detections in the same frame
    /// are rejected.
    pub fn new(id: u64, mut detections: Vec<Detection>) -> Result<Self, TrackError> {
        detections.sort_by_key(|d| d.frame_idx);
        for pair in detections.windows(2) {
            if pair[0].frame_idx == pair[1].frame_idx {
                return Err(TrackError::DuplicateFrame {
                    track_id: id,
                    frame_idx: pair[0].frame_idx,
                });
            }
        }
        for detection in &mut detections {
            detection.track_id = Some(id);
        }
        Ok(Self { id, detections })
    }

    pub fn detections(&self) -> &[Detection] {
        &self.detections
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    pub fn first(&self) -> Option<&Detection> {
        self.detections.first()
    }

    pub fn last(&self) -> Option<&Detection> {
        self.detections.last()
    }

    /// Inclusive `(first_frame, last_frame)` range, or `None` for an empty track.
    pub fn span(&self) -> Option<(u64, u64)> {
        Some((self.first()?.frame_idx, self.last()?.frame_idx))
    }

    /// Detection at an exact frame, if the track has one.
    pub fn at_frame(&self, frame_idx: u64) -> Option<&Detection> {
        self.detections
            .binary_search_by_key(&frame_idx, |d| d.frame_idx)
            .ok()
            .map(|i| &self.detections[i])
    }

    /// Mean model confidence; zero for an empty track.
    pub fn mean_score(&self) -> f64 {
        if self.detections.is_empty() {
            return 0.0;
        }
        self.detections.iter().map(|d| d.score).sum::<f64>() / self.detections.len() as f64
    }

    /// Derived copy with exactly one detection per frame.
    ///
    /// Gaps between consecutive detections are filled by linearly
    /// interpolating the box and score.
    pub fn densify(&self) -> Track {
        if self.detections.len() < 2 {
            return self.clone();
        }

        let mut dense = Vec::new();
        for pair in self.detections.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            let gap = (b.frame_idx - a.frame_idx) as f64;
            for frame_idx in a.frame_idx..b.frame_idx {
                let t = (frame_idx - a.frame_idx) as f64 / gap;
                dense.push(Detection {
                    frame_idx,
                    track_id: Some(self.id),
                    bounds: a.bounds.lerp(&b.bounds, t),
                    score: a.score + (b.score - a.score) * t,
                });
            }
        }
        if let Some(last) = self.detections.last() {
            dense.push(*last);
        }

        Track {
            id: self.id,
            detections: dense,
        }
    }
}
