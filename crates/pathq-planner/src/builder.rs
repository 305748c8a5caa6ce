//! Assembles a complete plan from the individual searches.

use std::sync::Arc;

use chrono::Utc;
use pathq_detect::ObjectModel;
use pathq_models::{BoundViolationNote, DatasetConfig, ModelConfig, Plan};
use pathq_predicate::PredicateRegistry;
use tracing::{info, warn};

use crate::error::{PlannerError, PlannerResult};
use crate::planner::{plan_q, Planned, ThresholdPlanner};
use crate::sampler::{default_q_grid, QualitySampler};

/// Builds a [`Plan`]: sample the quality curve, choose `q`, then search the
/// filter and refine thresholds at that `q`.
///
/// By default a step that cannot meet the bound fails the build. With
/// [`accept_degraded`](Self::accept_degraded) the best configuration found is
/// used instead and the shortfall is recorded on the plan.
#[derive(Clone)]
pub struct PlanBuilder {
    registry: Arc<PredicateRegistry>,
    sampler: QualitySampler,
    thresholds: ThresholdPlanner,
    accept_degraded: bool,
}

impl PlanBuilder {
    pub fn new(model: Arc<dyn ObjectModel>, registry: Arc<PredicateRegistry>) -> Self {
        Self {
            sampler: QualitySampler::new(Arc::clone(&model), Arc::clone(&registry)),
            thresholds: ThresholdPlanner::new(model, Arc::clone(&registry)),
            registry,
            accept_degraded: false,
        }
    }

    pub fn accept_degraded(mut self, accept: bool) -> Self {
        self.accept_degraded = accept;
        self
    }

    /// Plan `dataset.predicate` at detect stride `freq` for accuracy `bound`.
    ///
    /// Quality curves stored on `seed` are reused, so re-planning a known
    /// frequency skips sampling.
    pub async fn build(
        &self,
        dataset: &DatasetConfig,
        model_cfg: &ModelConfig,
        freq: u32,
        bound: f64,
        seed: Option<&Plan>,
    ) -> PlannerResult<Plan> {
        if freq == 0 {
            return Err(PlannerError::configuration("freq must be positive"));
        }
        if !(0.0..=1.0).contains(&bound) {
            return Err(PlannerError::configuration(format!(
                "bound must be within [0, 1], got {bound}"
            )));
        }
        self.registry.get(&dataset.predicate)?;

        let grid = default_q_grid(freq);
        let seed_curve = seed.and_then(|plan| plan.q_samples.get(&freq));
        let curve = self
            .sampler
            .sample_curve(&grid, dataset, model_cfg, seed_curve)
            .await?;

        let mut violations = Vec::new();
        let sample = self.accept(plan_q(&curve, bound)?, "q", bound, &mut violations)?;
        info!(
            predicate = %dataset.predicate,
            freq,
            q = sample.param_value,
            accuracy = sample.accuracy,
            cost = sample.cost,
            "Chose effective sampling rate"
        );

        let search = self
            .thresholds
            .plan_filter_refine(dataset, model_cfg, freq, sample.param_value, bound)
            .await?;
        let search = self.accept(search, "filter_refine", bound, &mut violations)?;

        let mut q_samples = seed.map(|plan| plan.q_samples.clone()).unwrap_or_default();
        q_samples.insert(freq, curve);

        Ok(Plan {
            query: dataset.name.clone(),
            predicate: dataset.predicate.clone(),
            freq,
            bound,
            q_samples,
            q: sample.param_value,
            filter: search.filter,
            refine: search.refine,
            bound_violations: violations,
            created_at: Utc::now(),
        })
    }

    fn accept<T>(
        &self,
        planned: Planned<T>,
        step: &str,
        bound: f64,
        violations: &mut Vec<BoundViolationNote>,
    ) -> PlannerResult<T> {
        match planned {
            Planned::Met(value) => Ok(value),
            Planned::BoundViolation {
                fallback,
                achieved_accuracy,
            } if self.accept_degraded => {
                warn!(
                    step,
                    bound,
                    achieved_accuracy,
                    "Accepting plan below the accuracy bound"
                );
                violations.push(BoundViolationNote {
                    step: step.to_string(),
                    achieved_accuracy,
                });
                Ok(fallback)
            }
            violation => violation.into_result(bound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pathq_detect::testing::ScriptedModel;
    use pathq_models::{Detection, FrameRange, QualityCurve, QualitySample, Rect, Track};
    use pathq_predicate::Predicate;
    use tokio_test::assert_ok;

    fn everywhere() -> Arc<PredicateRegistry> {
        let region = Rect::new(-1e4, -1e4, 1e4, 1e4).to_polygon();
        let registry = PredicateRegistry::builder()
            .primitive("everywhere", Predicate::PointSet(vec![region]))
            .unwrap()
            .build();
        Arc::new(registry)
    }

    fn moving(id: u64, y: f64, score: f64) -> Track {
        Track::new(
            id,
            (0..40)
                .map(|f| {
                    let x = f as f64 * 2.0;
                    Detection::new(f, Rect::new(x, y, x + 20.0, y + 20.0), score)
                })
                .collect(),
        )
        .unwrap()
    }

    /// Three real objects; with `ghost_score`, two more the model reports
    /// that are not in the ground truth.
    fn scenario(ghost_score: Option<f64>) -> (Arc<ScriptedModel>, DatasetConfig, ModelConfig) {
        let truth: Vec<Track> = (0..3).map(|i| moving(i, i as f64 * 100.0, 0.75)).collect();
        let ghosts = ghost_score
            .into_iter()
            .flat_map(|score| (3..5).map(move |i| moving(i, i as f64 * 100.0, score)));
        let model = Arc::new(ScriptedModel::new(truth.iter().cloned().chain(ghosts).collect()));

        let dataset = DatasetConfig {
            name: "synthetic".to_string(),
            predicate: "everywhere".to_string(),
            validation: FrameRange::new(0, 40),
            ground_truth: truth,
        };
        let mut model_cfg = ModelConfig::named("scripted");
        model_cfg.filter_grid = vec![0.0, 0.2, 0.4, 0.6, 0.8];
        (model, dataset, model_cfg)
    }

    #[tokio::test]
    async fn test_build_plan() {
        let (model, dataset, model_cfg) = scenario(None);
        let builder = PlanBuilder::new(model, everywhere());

        let plan = assert_ok!(builder.build(&dataset, &model_cfg, 2, 0.9, None).await);
        assert_eq!(plan.query, "synthetic");
        assert_eq!(plan.predicate, "everywhere");
        assert_eq!(plan.freq, 2);
        assert_eq!(plan.filter_threshold(), 0.6);
        assert!(!plan.is_degraded());
        assert_eq!(plan.curve().map(QualityCurve::len), Some(3));
        assert!(plan.refine.accuracy >= 0.9);
    }

    #[tokio::test]
    async fn test_seeded_build_skips_sampling() {
        let (model, dataset, model_cfg) = scenario(None);
        let builder = PlanBuilder::new(model.clone(), everywhere());

        let first = builder.build(&dataset, &model_cfg, 2, 0.9, None).await.unwrap();
        let fresh_calls = model.invocations();

        let mut seed = first.clone();
        seed.q_samples
            .insert(16, QualityCurve::from_samples([QualitySample::new(1, 0.5, 1.0)]));
        let second = builder
            .build(&dataset, &model_cfg, 2, 0.9, Some(&seed))
            .await
            .unwrap();
        let seeded_calls = model.invocations() - fresh_calls;

        // q grid [1, 2, 4] over 40 validation frames.
        assert_eq!(fresh_calls - seeded_calls, 40 + 20 + 10);
        assert_eq!(second.curve(), first.curve());
        assert!(second.q_samples.contains_key(&16));
        assert_eq!(second.q, first.q);
        assert_eq!(second.filter, first.filter);
        assert_eq!(second.refine, first.refine);
    }

    #[tokio::test]
    async fn test_bound_violation_fails_by_default() {
        let (model, dataset, model_cfg) = scenario(Some(0.75));
        let builder = PlanBuilder::new(model, everywhere());

        let result = builder.build(&dataset, &model_cfg, 2, 0.9, None).await;
        assert!(matches!(result, Err(PlannerError::BoundViolation { .. })));
    }

    #[tokio::test]
    async fn test_degraded_plan_records_violations() {
        let (model, dataset, model_cfg) = scenario(Some(0.75));
        let builder = PlanBuilder::new(model, everywhere()).accept_degraded(true);

        let plan = assert_ok!(builder.build(&dataset, &model_cfg, 2, 0.9, None).await);
        assert!(plan.is_degraded());
        let steps: Vec<&str> = plan.bound_violations.iter().map(|v| v.step.as_str()).collect();
        assert_eq!(steps, vec!["q", "filter_refine"]);
        assert!(plan.bound_violations.iter().all(|v| v.achieved_accuracy < 0.9));
    }

    #[tokio::test]
    async fn test_rejects_bad_inputs() {
        let (model, mut dataset, model_cfg) = scenario(None);
        let builder = PlanBuilder::new(model.clone(), everywhere());

        assert!(matches!(
            builder.build(&dataset, &model_cfg, 0, 0.9, None).await,
            Err(PlannerError::Configuration(_))
        ));
        assert!(matches!(
            builder.build(&dataset, &model_cfg, 2, 1.5, None).await,
            Err(PlannerError::Configuration(_))
        ));

        dataset.predicate = "unknown".to_string();
        assert!(matches!(
            builder.build(&dataset, &model_cfg, 2, 0.9, None).await,
            Err(PlannerError::Predicate(_))
        ));
        assert_eq!(model.invocations(), 0);
    }
}
