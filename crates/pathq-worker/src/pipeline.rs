//! Resumable pipeline executor.
//!
//! Runs `Detect → Track → Filter → EstimateUncertainty → Refine → Final` for
//! one plan. Each stage's output is persisted under the plan's directory;
//! on a later run a stage whose artifact is present and current is skipped
//! entirely, so an interrupted run resumes from the last completed stage and
//! a repeated run makes no model calls.
//!
//! A stage that fails persists nothing and stops the run.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use pathq_detect::{detect_frames, ObjectModel};
use pathq_models::{
    ArtifactKey, DetectOutput, FilterOutput, FinalOutput, FrameRange, ModelConfig, Plan,
    RefineOutput, Stage, StageArtifact, Track, TrackOutput, UncertaintyOutput,
};
use pathq_planner::stages::{
    estimate_uncertainty, filter_tracks, kept_tracks, refine_tracks, RefineParams,
};
use pathq_predicate::PredicateRegistry;
use pathq_storage::{ArtifactStore, StagePaths};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::Instrument;

use crate::error::{WorkerError, WorkerResult};
use crate::logging::RunLogger;
use crate::metrics;

/// Executes plans. Cheap to clone; clones share the model and registry.
#[derive(Clone)]
pub struct PipelineExecutor {
    model: Arc<dyn ObjectModel>,
    registry: Arc<PredicateRegistry>,
    store: ArtifactStore,
}

impl PipelineExecutor {
    pub fn new(
        model: Arc<dyn ObjectModel>,
        registry: Arc<PredicateRegistry>,
        store: ArtifactStore,
    ) -> Self {
        Self {
            model,
            registry,
            store,
        }
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Run `plan` over the `source` frames and return the tracks that
    /// satisfy its predicate, ordered by track id.
    pub async fn execute(
        &self,
        source: FrameRange,
        model_cfg: &ModelConfig,
        plan: &Plan,
        paths: &StagePaths,
    ) -> WorkerResult<Vec<Track>> {
        if plan.freq == 0 {
            return Err(WorkerError::configuration("plan freq must be positive"));
        }
        // Unknown predicates fail before any model call.
        let predicate = self.registry.get(&plan.predicate)?;

        let logger = RunLogger::for_plan(plan);
        let span = logger.create_span();
        let key = plan.key();

        async move {
            logger.log_start(&format!("frames {}..{}", source.start, source.end));

            let detect: DetectOutput = self
                .run_stage(Stage::Detect, paths, &key, &logger, async {
                    let frames = detect_frames(
                        self.model.as_ref(),
                        source.sampled(plan.freq),
                        model_cfg.base_confidence,
                    )
                    .await
                    .map_err(|e| WorkerError::stage_failure(Stage::Detect, e))?;
                    Ok(DetectOutput {
                        freq: plan.freq,
                        frames,
                    })
                })
                .await?;

            let tracked: TrackOutput = self
                .run_stage(Stage::Track, paths, &key, &logger, async {
                    let mut tracks = self
                        .model
                        .track(&detect.frames, &model_cfg.tracker)
                        .await
                        .map_err(|e| WorkerError::stage_failure(Stage::Track, e))?;
                    tracks.sort_by_key(|t| t.id);
                    Ok(TrackOutput { tracks })
                })
                .await?;

            let filter: FilterOutput = self
                .run_stage(Stage::Filter, paths, &key, &logger, async {
                    Ok(filter_tracks(&tracked.tracks, plan.filter_threshold()))
                })
                .await?;
            let kept = kept_tracks(&tracked.tracks, &filter);
            logger.log_progress(&format!(
                "{} of {} tracks kept",
                kept.len(),
                tracked.tracks.len()
            ));

            let uncertainty: UncertaintyOutput = self
                .run_stage(Stage::EstimateUncertainty, paths, &key, &logger, async {
                    Ok(estimate_uncertainty(&kept, plan.uncertainty_threshold()))
                })
                .await?;

            let refined: RefineOutput = self
                .run_stage(Stage::Refine, paths, &key, &logger, async {
                    let params = RefineParams {
                        rate: plan.refine_rate(),
                        confidence: plan.refine_threshold(),
                        iou_threshold: model_cfg.tracker.iou_threshold,
                    };
                    refine_tracks(self.model.as_ref(), &kept, &uncertainty, params)
                        .await
                        .map_err(|e| WorkerError::stage_failure(Stage::Refine, e))
                })
                .await?;

            let output: FinalOutput = self
                .run_stage(Stage::Final, paths, &key, &logger, async {
                    let mut tracks: Vec<Track> = refined
                        .tracks
                        .iter()
                        .filter(|t| predicate.matches(std::slice::from_ref(*t)))
                        .cloned()
                        .collect();
                    tracks.sort_by_key(|t| t.id);
                    Ok(FinalOutput {
                        predicate: plan.predicate.clone(),
                        tracks,
                    })
                })
                .await?;

            logger.log_completion(&format!("{} tracks match", output.tracks.len()));
            Ok(output.tracks)
        }
        .instrument(span)
        .await
    }

    /// Load `stage`'s artifact if current, otherwise compute and persist it.
    ///
    /// `compute` is only polled on a miss.
    async fn run_stage<T>(
        &self,
        stage: Stage,
        paths: &StagePaths,
        key: &ArtifactKey,
        logger: &RunLogger,
        compute: impl Future<Output = WorkerResult<T>>,
    ) -> WorkerResult<T>
    where
        T: Serialize + DeserializeOwned,
    {
        if let Some(artifact) = self.store.read_stage::<T>(paths, stage, key).await {
            metrics::record_stage_cache_hit(stage);
            logger.log_stage_skipped(stage);
            return Ok(artifact.into_payload());
        }
        metrics::record_stage_cache_miss(stage);

        let started = Instant::now();
        let payload = match compute.await {
            Ok(payload) => payload,
            Err(e) => {
                metrics::record_stage_failure(stage);
                logger.log_error(&format!("stage {stage} failed: {e}"));
                return Err(e);
            }
        };

        let artifact = StageArtifact::new(stage, key.clone(), payload);
        self.store.write_stage(paths, &artifact).await?;

        let elapsed = started.elapsed();
        metrics::record_stage_duration(stage, elapsed.as_secs_f64());
        logger.log_stage_completed(stage, elapsed);
        Ok(artifact.into_payload())
    }
}
