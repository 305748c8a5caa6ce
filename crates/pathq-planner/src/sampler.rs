//! Quality curve sampling.
//!
//! For each candidate effective sampling rate `q`, the detector is run on
//! every `q`-th validation frame, the detections are tracked, and the query
//! result is scored against ground truth. Grid points are independent and
//! run concurrently, bounded by the model's capacity.

use std::sync::Arc;

use futures::future::join_all;
use pathq_detect::{detect_frames, ObjectModel};
use pathq_models::{DatasetConfig, ModelConfig, QualityCurve, QualitySample};
use pathq_predicate::{Predicate, PredicateRegistry};
use tokio::sync::Semaphore;
use tracing::{debug, info};

use crate::error::{PlannerError, PlannerResult};
use crate::scoring::TrackMatcher;

/// Candidate rates for a detect stride: powers of two from 1 to `2 * freq`.
pub fn default_q_grid(freq: u32) -> Vec<u32> {
    let max = freq.max(1).saturating_mul(2);
    std::iter::successors(Some(1u32), |q| q.checked_mul(2))
        .take_while(|q| *q <= max)
        .collect()
}

#[derive(Clone)]
pub struct QualitySampler {
    model: Arc<dyn ObjectModel>,
    registry: Arc<PredicateRegistry>,
}

impl QualitySampler {
    pub fn new(model: Arc<dyn ObjectModel>, registry: Arc<PredicateRegistry>) -> Self {
        Self { model, registry }
    }

    /// Measure accuracy and cost at every grid point.
    ///
    /// A supplied `seed` curve is returned as is without invoking the model.
    pub async fn sample_curve(
        &self,
        grid: &[u32],
        dataset: &DatasetConfig,
        model_cfg: &ModelConfig,
        seed: Option<&QualityCurve>,
    ) -> PlannerResult<QualityCurve> {
        if let Some(seed) = seed {
            info!(
                predicate = %dataset.predicate,
                samples = seed.len(),
                "Reusing existing quality curve"
            );
            return Ok(seed.clone());
        }

        if grid.is_empty() {
            return Err(PlannerError::EmptyGrid("q"));
        }
        if grid.contains(&0) {
            return Err(PlannerError::configuration("q grid values must be positive"));
        }

        let predicate = self.registry.get(&dataset.predicate)?;
        let matcher = TrackMatcher::new(model_cfg.match_iou);
        let semaphore = Semaphore::new(model_cfg.max_parallel_samples.max(1));

        info!(
            predicate = %dataset.predicate,
            model = %model_cfg.name,
            grid = ?grid,
            parallel = model_cfg.max_parallel_samples,
            "Sampling quality curve"
        );

        let futures: Vec<_> = grid
            .iter()
            .map(|&q| {
                let semaphore = &semaphore;
                let predicate = predicate.as_ref();
                let matcher = &matcher;
                async move {
                    let _permit = semaphore
                        .acquire()
                        .await
                        .map_err(|_| PlannerError::configuration("sampling pool closed"))?;
                    self.sample_point(q, predicate, matcher, dataset, model_cfg).await
                }
            })
            .collect();

        let results = join_all(futures).await;

        let mut curve = QualityCurve::new();
        for result in results {
            curve.insert(result?);
        }

        info!(
            predicate = %dataset.predicate,
            samples = curve.len(),
            "Quality curve sampled"
        );
        Ok(curve)
    }

    async fn sample_point(
        &self,
        q: u32,
        predicate: &Predicate,
        matcher: &TrackMatcher,
        dataset: &DatasetConfig,
        model_cfg: &ModelConfig,
    ) -> PlannerResult<QualitySample> {
        let frames = detect_frames(
            self.model.as_ref(),
            dataset.validation.sampled(q),
            model_cfg.base_confidence,
        )
        .await
        .map_err(|e| PlannerError::stage_failure("sample", e))?;

        let tracks = self
            .model
            .track(&frames, &model_cfg.tracker)
            .await
            .map_err(|e| PlannerError::stage_failure("sample", e))?;

        let accuracy = matcher
            .evaluate(predicate, &tracks, &dataset.ground_truth)
            .score(model_cfg.metric);
        let cost = frames.len() as f64;

        debug!(q, accuracy, cost, tracks = tracks.len(), "Sampled quality point");
        Ok(QualitySample::new(q, accuracy, cost))
    }
}
