//! Model backed by pre-computed detections.
//!
//! The detections file is a JSON list of per-frame results:
//!
//! ```json
//! [{"frame_idx": 0, "detections": [{"frame_idx": 0,
//!   "bounds": {"left": 1, "top": 2, "right": 3, "bottom": 4}, "score": 0.8}]}]
//! ```
//!
//! Detections were recorded at a low confidence floor; `score` filters them
//! to the requested confidence. Frames inside the recorded range with no
//! entry have no detections.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use pathq_models::{Detection, FrameDetections, FrameRange};
use tracing::info;

use crate::error::{ModelError, ModelResult};
use crate::model::ObjectModel;

#[derive(Debug, Clone)]
pub struct RecordedModel {
    name: String,
    frames: BTreeMap<u64, Vec<Detection>>,
    coverage: FrameRange,
}

impl RecordedModel {
    /// Build from in-memory frames. Coverage spans the first to the last frame.
    pub fn from_frames(name: impl Into<String>, frames: Vec<FrameDetections>) -> Self {
        let frames: BTreeMap<u64, Vec<Detection>> = frames
            .into_iter()
            .map(|f| (f.frame_idx, f.detections))
            .collect();
        let coverage = match (frames.keys().next(), frames.keys().next_back()) {
            (Some(&first), Some(&last)) => FrameRange::new(first, last + 1),
            _ => FrameRange::new(0, 0),
        };
        Self {
            name: name.into(),
            frames,
            coverage,
        }
    }

    /// Load a detections file.
    pub async fn load(name: impl Into<String>, path: impl AsRef<Path>) -> ModelResult<Self> {
        let path = path.as_ref();
        if !tokio::fs::try_exists(path).await? {
            return Err(ModelError::SourceNotFound(path.to_path_buf()));
        }
        let content = tokio::fs::read_to_string(path).await?;
        let frames: Vec<FrameDetections> = serde_json::from_str(&content)?;

        let model = Self::from_frames(name, frames);
        info!(
            model = %model.name,
            path = %path.display(),
            frames = model.frames.len(),
            "Loaded recorded detections"
        );
        Ok(model)
    }

    /// Override the frame range the recording is known to cover.
    pub fn with_coverage(mut self, coverage: FrameRange) -> Self {
        self.coverage = coverage;
        self
    }

    pub fn coverage(&self) -> FrameRange {
        self.coverage
    }
}

#[async_trait]
impl ObjectModel for RecordedModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn score(&self, frame_idx: u64, confidence: f64) -> ModelResult<Vec<Detection>> {
        if !self.coverage.contains(frame_idx) {
            return Err(ModelError::FrameOutOfRange { frame_idx });
        }
        Ok(self
            .frames
            .get(&frame_idx)
            .map(|detections| {
                detections
                    .iter()
                    .filter(|d| d.score >= confidence)
                    .map(|d| Detection::new(frame_idx, d.bounds, d.score))
                    .collect()
            })
            .unwrap_or_default())
    }
}
