//! Invocation-counting, memoizing model wrapper.
//!
//! A frame is scored by the inner model once, at the floor confidence; later
//! requests for the same frame at any confidence at or above the floor are
//! answered by filtering the cached response. Requests below the floor go
//! straight to the inner model.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use metrics::counter;
use pathq_models::{Detection, FrameDetections, Track, TrackerConfig};
use tokio::sync::Mutex;

use crate::error::ModelResult;
use crate::model::ObjectModel;
use crate::names;

pub struct CountingModel {
    inner: Arc<dyn ObjectModel>,
    floor: f64,
    cache: Mutex<HashMap<u64, Arc<Vec<Detection>>>>,
    invocations: AtomicU64,
    cache_hits: AtomicU64,
}

impl CountingModel {
    pub fn new(inner: Arc<dyn ObjectModel>, floor: f64) -> Self {
        Self {
            inner,
            floor,
            cache: Mutex::new(HashMap::new()),
            invocations: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
        }
    }

    /// Calls that reached the inner model.
    pub fn invocations(&self) -> u64 {
        self.invocations.load(Ordering::SeqCst)
    }

    /// Calls answered from the cache.
    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::SeqCst)
    }

    async fn invoke(&self, frame_idx: u64, confidence: f64) -> ModelResult<Vec<Detection>> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        counter!(names::MODEL_INVOCATIONS, "model" => self.inner.name().to_string()).increment(1);
        self.inner.score(frame_idx, confidence).await
    }
}

#[async_trait]
impl ObjectModel for CountingModel {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn score(&self, frame_idx: u64, confidence: f64) -> ModelResult<Vec<Detection>> {
        if confidence < self.floor {
            return self.invoke(frame_idx, confidence).await;
        }

        let cached = self.cache.lock().await.get(&frame_idx).cloned();
        let detections = match cached {
            Some(detections) => {
                self.cache_hits.fetch_add(1, Ordering::SeqCst);
                counter!(names::MODEL_CACHE_HITS, "model" => self.inner.name().to_string())
                    .increment(1);
                detections
            }
            None => {
                let detections = Arc::new(self.invoke(frame_idx, self.floor).await?);
                self.cache
                    .lock()
                    .await
                    .insert(frame_idx, Arc::clone(&detections));
                detections
            }
        };

        Ok(detections
            .iter()
            .filter(|d| d.score >= confidence)
            .copied()
            .collect())
    }

    async fn track(
        &self,
        frames: &[FrameDetections],
        config: &TrackerConfig,
    ) -> ModelResult<Vec<Track>> {
        self.inner.track(frames, config).await
    }
}
