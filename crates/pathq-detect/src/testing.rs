//! Deterministic model for tests.
//!
//! [`ScriptedModel`] renders a fixed set of tracks into per-frame
//! detections. Every frame a scripted track spans produces one detection
//! (interpolated between keyframes). Failures can be injected per frame.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use pathq_models::{Detection, Track};

use crate::error::{ModelError, ModelResult};
use crate::model::ObjectModel;

pub struct ScriptedModel {
    name: String,
    tracks: Vec<Track>,
    failing_frames: HashSet<u64>,
    invocations: AtomicU64,
}

impl ScriptedModel {
    /// Model whose detections follow `tracks`, densified.
    pub fn new(tracks: Vec<Track>) -> Self {
        Self {
            name: "scripted".to_string(),
            tracks: tracks.iter().map(Track::densify).collect(),
            failing_frames: HashSet::new(),
            invocations: AtomicU64::new(0),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Fail every invocation for `frame_idx`.
    pub fn failing_on(mut self, frame_idx: u64) -> Self {
        self.failing_frames.insert(frame_idx);
        self
    }

    pub fn invocations(&self) -> u64 {
        self.invocations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectModel for ScriptedModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn score(&self, frame_idx: u64, confidence: f64) -> ModelResult<Vec<Detection>> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        if self.failing_frames.contains(&frame_idx) {
            return Err(ModelError::invocation_failed(
                &self.name,
                frame_idx,
                "injected failure",
            ));
        }

        Ok(self
            .tracks
            .iter()
            .filter_map(|track| track.at_frame(frame_idx))
            .filter(|d| d.score >= confidence)
            .map(|d| Detection::new(d.frame_idx, d.bounds, d.score))
            .collect())
    }
}
