//! IoU-based tracker for maintaining object identity across sampled frames.
//!
//! Uses greedy matching by Intersection over Union to associate detections
//! with the tracks seen in earlier frames. Tracks are kept in id order so
//! the same input always yields the same ids.

use std::collections::BTreeMap;

use pathq_models::{Detection, FrameDetections, Rect, Track, TrackerConfig};

use crate::error::ModelResult;

/// Open track state.
#[derive(Debug, Clone)]
struct OpenTrack {
    /// Last known bounding box
    bounds: Rect,
    /// Sampled frames since last detection
    age: u32,
}

pub struct IouTracker {
    /// IoU threshold for matching
    iou_threshold: f64,
    /// Maximum unmatched frames before a track is closed
    max_gap: u32,
    open: BTreeMap<u64, OpenTrack>,
    next_track_id: u64,
}

impl IouTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            iou_threshold: config.iou_threshold,
            max_gap: config.max_gap,
            open: BTreeMap::new(),
            next_track_id: 0,
        }
    }

    /// Assign track ids to one frame's detections.
    ///
    /// Returns the detections stamped with their track id, in input order.
    pub fn update(&mut self, detections: &[Detection]) -> Vec<Detection> {
        let mut unmatched_tracks: Vec<u64> = self.open.keys().copied().collect();
        let mut assigned = Vec::with_capacity(detections.len());

        for detection in detections {
            let mut best_iou = self.iou_threshold;
            let mut best_track: Option<u64> = None;

            for &track_id in &unmatched_tracks {
                if let Some(track) = self.open.get(&track_id) {
                    let iou = detection.bounds.iou(&track.bounds);
                    if iou > best_iou {
                        best_iou = iou;
                        best_track = Some(track_id);
                    }
                }
            }

            let track_id = match best_track {
                Some(track_id) => {
                    unmatched_tracks.retain(|&id| id != track_id);
                    track_id
                }
                None => {
                    let track_id = self.next_track_id;
                    self.next_track_id += 1;
                    track_id
                }
            };

            self.open.insert(
                track_id,
                OpenTrack {
                    bounds: detection.bounds,
                    age: 0,
                },
            );
            assigned.push(detection.with_track(track_id));
        }

        // Age unmatched tracks
        for track_id in unmatched_tracks {
            let expired = match self.open.get_mut(&track_id) {
                Some(track) => {
                    track.age += 1;
                    track.age > self.max_gap
                }
                None => false,
            };
            if expired {
                self.open.remove(&track_id);
            }
        }

        assigned
    }

    /// Track a whole frame sequence and group the result per track id.
    ///
    /// Frames are processed in frame order regardless of input order. The
    /// returned tracks are sorted by id.
    pub fn track_frames(&mut self, frames: &[FrameDetections]) -> ModelResult<Vec<Track>> {
        let mut ordered: Vec<&FrameDetections> = frames.iter().collect();
        ordered.sort_by_key(|f| f.frame_idx);

        let mut grouped: BTreeMap<u64, Vec<Detection>> = BTreeMap::new();
        for frame in ordered {
            for detection in self.update(&frame.detections) {
                let track_id = detection.track_id.unwrap_or_default();
                grouped.entry(track_id).or_default().push(detection);
            }
        }

        let mut tracks = Vec::with_capacity(grouped.len());
        for (id, detections) in grouped {
            tracks.push(Track::new(id, detections)?);
        }
        Ok(tracks)
    }

    /// Reset the tracker state.
    pub fn reset(&mut self) {
        self.open.clear();
        self.next_track_id = 0;
    }

    pub fn open_track_count(&self) -> usize {
        self.open.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(frame_idx: u64, x: f64, y: f64) -> Detection {
        Detection::new(frame_idx, Rect::new(x, y, x + 50.0, y + 50.0), 0.9)
    }

    fn tracker(max_gap: u32) -> IouTracker {
        IouTracker::new(TrackerConfig {
            iou_threshold: 0.3,
            max_gap,
        })
    }

    #[test]
    fn test_tracker_new_detections() {
        let mut tracker = tracker(10);
        let tracked = tracker.update(&[det(0, 100.0, 100.0), det(0, 200.0, 200.0)]);
        assert_eq!(tracked.len(), 2);
        assert_eq!(tracked[0].track_id, Some(0));
        assert_eq!(tracked[1].track_id, Some(1));
    }

    #[test]
    fn test_tracker_matching() {
        let mut tracker = tracker(10);
        let first = tracker.update(&[det(0, 100.0, 100.0)]);
        let second = tracker.update(&[det(1, 105.0, 105.0)]);
        assert_eq!(second[0].track_id, first[0].track_id);
    }

    #[test]
    fn test_tracker_gap_handling() {
        let mut tracker = tracker(2);
        tracker.update(&[det(0, 100.0, 100.0)]);

        tracker.update(&[]);
        tracker.update(&[]);
        // age = 2, max_gap = 2
        assert_eq!(tracker.open_track_count(), 1);

        tracker.update(&[]);
        assert_eq!(tracker.open_track_count(), 0);

        // A reappearing object after the gap gets a fresh id.
        let tracked = tracker.update(&[det(4, 100.0, 100.0)]);
        assert_eq!(tracked[0].track_id, Some(1));
    }

    #[test]
    fn test_track_frames_groups_by_id() {
        let frames = vec![
            FrameDetections::new(4, vec![det(4, 110.0, 100.0), det(4, 500.0, 500.0)]),
            FrameDetections::new(0, vec![det(0, 100.0, 100.0)]),
            FrameDetections::new(2, vec![det(2, 105.0, 100.0)]),
        ];
        let tracks = tracker(2).track_frames(&frames).unwrap();

        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].id, 0);
        assert_eq!(tracks[0].span(), Some((0, 4)));
        assert_eq!(tracks[0].len(), 3);
        assert_eq!(tracks[1].id, 1);
        assert_eq!(tracks[1].span(), Some((4, 4)));
    }

    #[test]
    fn test_track_frames_deterministic() {
        let frames: Vec<FrameDetections> = (0..10)
            .map(|f| {
                FrameDetections::new(
                    f,
                    vec![det(f, f as f64 * 3.0, 0.0), det(f, 300.0 - f as f64 * 3.0, 0.0)],
                )
            })
            .collect();
        let a = tracker(2).track_frames(&frames).unwrap();
        let b = tracker(2).track_frames(&frames).unwrap();
        assert_eq!(a, b);
    }
}
