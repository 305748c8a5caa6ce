//! Object model trait.
//!
//! The detector is an opaque, expensive scoring function. Timeouts and
//! retries belong to implementations; callers treat any error as a stage
//! failure.

use async_trait::async_trait;
use pathq_models::{Detection, FrameDetections, Track, TrackerConfig};

use crate::error::ModelResult;
use crate::tracker::IouTracker;

/// Core trait for detection models.
#[async_trait]
pub trait ObjectModel: Send + Sync {
    /// Human-readable model name for logging.
    fn name(&self) -> &str;

    /// Detect objects in one frame, keeping detections scoring at least `confidence`.
    async fn score(&self, frame_idx: u64, confidence: f64) -> ModelResult<Vec<Detection>>;

    /// Associate per-frame detections into tracks sorted by id.
    async fn track(
        &self,
        frames: &[FrameDetections],
        config: &TrackerConfig,
    ) -> ModelResult<Vec<Track>> {
        IouTracker::new(*config).track_frames(frames)
    }
}

/// Score each frame in order and collect the per-frame results.
///
/// Stops at the first failure.
pub async fn detect_frames<M>(
    model: &M,
    frames: impl IntoIterator<Item = u64>,
    confidence: f64,
) -> ModelResult<Vec<FrameDetections>>
where
    M: ObjectModel + ?Sized,
{
    let mut scored = Vec::new();
    for frame_idx in frames {
        let detections = model.score(frame_idx, confidence).await?;
        scored.push(FrameDetections::new(frame_idx, detections));
    }
    Ok(scored)
}
