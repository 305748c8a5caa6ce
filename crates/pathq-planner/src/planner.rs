//! Plan search: pick the cheapest configuration that meets an accuracy bound.
//!
//! Two searches run in sequence. [`plan_q`] chooses the effective sampling
//! rate from a sampled quality curve. [`ThresholdPlanner`] then searches the
//! filter / uncertainty / refine threshold space by simulating those stages
//! on the validation range.
//!
//! A bound that cannot be met is never reported as success: both searches
//! return [`Planned::BoundViolation`] carrying the best configuration found,
//! and the caller decides whether to accept it.

use std::collections::HashMap;
use std::sync::Arc;

use pathq_detect::{detect_frames, CountingModel, ObjectModel};
use pathq_models::{
    refine_rate, AccuracyMetric, DatasetConfig, FilterPlan, ModelConfig, QualityCurve,
    QualitySample, RefinePlan, Track,
};
use pathq_predicate::{Predicate, PredicateRegistry};
use tracing::{debug, info, warn};

use crate::error::{PlannerError, PlannerResult};
use crate::scoring::TrackMatcher;
use crate::stages::{
    estimate_uncertainty, filter_tracks, kept_tracks, refine_cost, refine_tracks, RefineParams,
};

/// Coordinate descent rounds before the search settles for the current point.
const MAX_ROUNDS: usize = 4;

/// Outcome of a bounded search.
#[derive(Debug, Clone, PartialEq)]
pub enum Planned<T> {
    /// The configuration meets the bound.
    Met(T),
    /// Nothing met the bound; `fallback` is the most accurate configuration found.
    BoundViolation { fallback: T, achieved_accuracy: f64 },
}

impl<T> Planned<T> {
    pub fn is_met(&self) -> bool {
        matches!(self, Planned::Met(_))
    }

    /// The chosen configuration, whether or not it met the bound.
    pub fn value(&self) -> &T {
        match self {
            Planned::Met(value) | Planned::BoundViolation { fallback: value, .. } => value,
        }
    }

    /// Treat a violation as an error.
    pub fn into_result(self, bound: f64) -> PlannerResult<T> {
        match self {
            Planned::Met(value) => Ok(value),
            Planned::BoundViolation {
                achieved_accuracy, ..
            } => Err(PlannerError::BoundViolation {
                achieved_accuracy,
                bound,
            }),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Planned<U> {
        match self {
            Planned::Met(value) => Planned::Met(f(value)),
            Planned::BoundViolation {
                fallback,
                achieved_accuracy,
            } => Planned::BoundViolation {
                fallback: f(fallback),
                achieved_accuracy,
            },
        }
    }
}

/// Cheapest sample meeting `bound`; ties on cost go to the larger parameter.
///
/// If no sample meets the bound the most accurate one (cheapest among equals)
/// is returned as a violation.
pub fn plan_q(curve: &QualityCurve, bound: f64) -> PlannerResult<Planned<QualitySample>> {
    if curve.is_empty() {
        return Err(PlannerError::EmptyCurve);
    }

    let feasible = curve
        .samples()
        .iter()
        .filter(|s| s.accuracy >= bound)
        .min_by(|a, b| {
            a.cost
                .total_cmp(&b.cost)
                .then(b.param_value.cmp(&a.param_value))
        });
    if let Some(sample) = feasible {
        return Ok(Planned::Met(*sample));
    }

    let best = curve.samples().iter().max_by(|a, b| {
        a.accuracy
            .total_cmp(&b.accuracy)
            .then(b.cost.total_cmp(&a.cost))
    });
    match best {
        Some(sample) => {
            warn!(
                bound,
                achieved_accuracy = sample.accuracy,
                q = sample.param_value,
                "No sampled rate meets the accuracy bound"
            );
            Ok(Planned::BoundViolation {
                fallback: *sample,
                achieved_accuracy: sample.accuracy,
            })
        }
        None => Err(PlannerError::EmptyCurve),
    }
}

/// Result of the threshold search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdSearch {
    pub filter: FilterPlan,
    pub refine: RefinePlan,
    /// Distinct threshold combinations simulated
    pub evaluations: usize,
    /// Size of the full threshold grid
    pub grid_size: usize,
}

/// Searches filter, uncertainty and refine thresholds.
///
/// Detect and track run once at the plan's stride; every combination then
/// replays filter, uncertainty and refine on those tracks. Model responses
/// are memoized so a frame is scored once per search, while each combination
/// is still charged for every frame it would re-score.
///
/// The search is coordinate descent. Raising the filter or uncertainty
/// threshold never adds model work, so along each axis the largest feasible
/// threshold is the cheapest. Recall only drops as the filter threshold
/// rises, so its boundary is found by binary search; precision can fail
/// below that boundary, which is handled by walking down from it. The
/// uncertainty axis is binary searched directly. The refine confidence is
/// scanned last at the fixed pair.
#[derive(Clone)]
pub struct ThresholdPlanner {
    model: Arc<dyn ObjectModel>,
    registry: Arc<PredicateRegistry>,
}

impl ThresholdPlanner {
    pub fn new(model: Arc<dyn ObjectModel>, registry: Arc<PredicateRegistry>) -> Self {
        Self { model, registry }
    }

    pub async fn plan_filter_refine(
        &self,
        dataset: &DatasetConfig,
        model_cfg: &ModelConfig,
        freq: u32,
        q: u32,
        bound: f64,
    ) -> PlannerResult<Planned<ThresholdSearch>> {
        if freq == 0 {
            return Err(PlannerError::configuration("freq must be positive"));
        }
        let filter_grid = sorted_grid(&model_cfg.filter_grid, "filter")?;
        let uncertainty_grid = sorted_grid(&model_cfg.uncertainty_grid, "uncertainty")?;
        let refine_grid = sorted_grid(&model_cfg.refine_grid, "refine")?;
        let predicate = self.registry.get(&dataset.predicate)?;

        let floor = refine_grid[0].min(model_cfg.base_confidence);
        let counting = CountingModel::new(Arc::clone(&self.model), floor);

        let frames = detect_frames(
            &counting,
            dataset.validation.sampled(freq),
            model_cfg.base_confidence,
        )
        .await
        .map_err(|e| PlannerError::stage_failure("detect", e))?;
        let tracks = counting
            .track(&frames, &model_cfg.tracker)
            .await
            .map_err(|e| PlannerError::stage_failure("track", e))?;

        info!(
            predicate = %dataset.predicate,
            freq,
            q,
            bound,
            tracks = tracks.len(),
            "Searching filter and refine thresholds"
        );

        let mut search = Search {
            model: &counting,
            predicate: predicate.as_ref(),
            matcher: TrackMatcher::new(model_cfg.match_iou),
            metric: model_cfg.metric,
            truth: &dataset.ground_truth,
            tracks,
            filter_grid,
            uncertainty_grid,
            refine_grid,
            rate: refine_rate(freq, q),
            iou_threshold: model_cfg.tracker.iou_threshold,
            detect_cost: frames.len() as f64,
            memo: HashMap::new(),
        };
        let planned = search.run(bound, MAX_ROUNDS).await?;

        let chosen = planned.value();
        info!(
            predicate = %dataset.predicate,
            met = planned.is_met(),
            filter_threshold = chosen.filter.threshold,
            uncertainty_threshold = chosen.refine.uncertainty_threshold,
            refine_threshold = chosen.refine.refine_threshold,
            accuracy = chosen.refine.accuracy,
            cost = chosen.refine.cost,
            evaluations = chosen.evaluations,
            grid_size = chosen.grid_size,
            model_invocations = counting.invocations(),
            "Threshold search finished"
        );
        Ok(planned)
    }
}

fn sorted_grid(values: &[f64], name: &'static str) -> PlannerResult<Vec<f64>> {
    let mut grid: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if grid.is_empty() {
        return Err(PlannerError::EmptyGrid(name));
    }
    grid.sort_by(f64::total_cmp);
    grid.dedup();
    Ok(grid)
}

#[derive(Debug, Clone, Copy)]
struct Evaluation {
    accuracy: f64,
    recall: f64,
    filter_accuracy: f64,
    cost: f64,
}

/// Grid indices `(filter, uncertainty, refine)`.
type Point = (usize, usize, usize);

struct Search<'a> {
    model: &'a CountingModel,
    predicate: &'a Predicate,
    matcher: TrackMatcher,
    metric: AccuracyMetric,
    truth: &'a [Track],
    tracks: Vec<Track>,
    filter_grid: Vec<f64>,
    uncertainty_grid: Vec<f64>,
    refine_grid: Vec<f64>,
    rate: u32,
    iou_threshold: f64,
    detect_cost: f64,
    memo: HashMap<Point, Evaluation>,
}

impl Search<'_> {
    async fn run(&mut self, bound: f64, max_rounds: usize) -> PlannerResult<Planned<ThresholdSearch>> {
        // Most permissive refine confidence while the other two axes move.
        let refine_start = 0;

        let mut ui = 0;
        let Some(mut fi) = self.search_filter(ui, refine_start, bound).await? else {
            return self.violation();
        };

        for round in 0..max_rounds {
            let next_ui = self.search_uncertainty(fi, ui, refine_start, bound).await?;
            let next_fi = self
                .search_filter(next_ui, refine_start, bound)
                .await?
                .unwrap_or(fi);
            debug!(round, filter = next_fi, uncertainty = next_ui, "Coordinate descent round");
            if (next_fi, next_ui) == (fi, ui) {
                break;
            }
            fi = next_fi;
            ui = next_ui;
        }

        let mut best: Option<(usize, Evaluation)> = None;
        for ri in 0..self.refine_grid.len() {
            let evaluation = self.evaluate((fi, ui, ri)).await?;
            if evaluation.accuracy < bound {
                continue;
            }
            let better = match best {
                None => true,
                Some((_, current)) => {
                    evaluation.cost < current.cost
                        || (evaluation.cost == current.cost && evaluation.accuracy > current.accuracy)
                }
            };
            if better {
                best = Some((ri, evaluation));
            }
        }

        match best {
            Some((ri, evaluation)) => Ok(Planned::Met(self.outcome((fi, ui, ri), evaluation))),
            None => self.violation(),
        }
    }

    async fn evaluate(&mut self, point: Point) -> PlannerResult<Evaluation> {
        if let Some(evaluation) = self.memo.get(&point) {
            return Ok(*evaluation);
        }
        let (fi, ui, ri) = point;

        let filter = filter_tracks(&self.tracks, self.filter_grid[fi]);
        let kept = kept_tracks(&self.tracks, &filter);
        let filter_accuracy = self
            .matcher
            .evaluate(self.predicate, &kept, self.truth)
            .score(self.metric);

        let uncertainty = estimate_uncertainty(&kept, self.uncertainty_grid[ui]);
        let params = RefineParams {
            rate: self.rate,
            confidence: self.refine_grid[ri],
            iou_threshold: self.iou_threshold,
        };
        let refined = refine_tracks(self.model, &kept, &uncertainty, params)
            .await
            .map_err(|e| PlannerError::stage_failure("refine", e))?;

        let accuracy = self.matcher.evaluate(self.predicate, &refined.tracks, self.truth);
        let evaluation = Evaluation {
            accuracy: accuracy.score(self.metric),
            recall: accuracy.recall,
            filter_accuracy,
            cost: self.detect_cost + refine_cost(&refined) as f64,
        };

        debug!(
            filter_threshold = self.filter_grid[fi],
            uncertainty_threshold = self.uncertainty_grid[ui],
            refine_threshold = self.refine_grid[ri],
            accuracy = evaluation.accuracy,
            cost = evaluation.cost,
            "Evaluated threshold combination"
        );
        self.memo.insert(point, evaluation);
        Ok(evaluation)
    }

    async fn feasible(&mut self, point: Point, bound: f64) -> PlannerResult<bool> {
        Ok(self.evaluate(point).await?.accuracy >= bound)
    }

    /// Largest feasible filter index at `(ui, ri)`.
    async fn search_filter(&mut self, ui: usize, ri: usize, bound: f64) -> PlannerResult<Option<usize>> {
        if self.evaluate((0, ui, ri)).await?.recall < bound {
            return Ok(None);
        }

        let (mut lo, mut hi) = (0, self.filter_grid.len() - 1);
        while lo < hi {
            let mid = lo + (hi - lo + 1) / 2;
            if self.evaluate((mid, ui, ri)).await?.recall >= bound {
                lo = mid;
            } else {
                hi = mid - 1;
            }
        }

        for fi in (0..=lo).rev() {
            if self.feasible((fi, ui, ri), bound).await? {
                return Ok(Some(fi));
            }
        }
        Ok(None)
    }

    /// Largest feasible uncertainty index at `(fi, ri)`; `from` must be feasible.
    async fn search_uncertainty(
        &mut self,
        fi: usize,
        from: usize,
        ri: usize,
        bound: f64,
    ) -> PlannerResult<usize> {
        let (mut lo, mut hi) = (from, self.uncertainty_grid.len() - 1);
        while lo < hi {
            let mid = lo + (hi - lo + 1) / 2;
            if self.feasible((fi, mid, ri), bound).await? {
                lo = mid;
            } else {
                hi = mid - 1;
            }
        }
        Ok(lo)
    }

    fn outcome(&self, (fi, ui, ri): Point, evaluation: Evaluation) -> ThresholdSearch {
        ThresholdSearch {
            filter: FilterPlan {
                threshold: self.filter_grid[fi],
                accuracy: evaluation.filter_accuracy,
                cost: self.detect_cost,
            },
            refine: RefinePlan {
                uncertainty_threshold: self.uncertainty_grid[ui],
                refine_threshold: self.refine_grid[ri],
                accuracy: evaluation.accuracy,
                cost: evaluation.cost,
            },
            evaluations: self.memo.len(),
            grid_size: self.filter_grid.len() * self.uncertainty_grid.len() * self.refine_grid.len(),
        }
    }

    /// Most accurate evaluated point, cheapest among equals.
    fn violation(&self) -> PlannerResult<Planned<ThresholdSearch>> {
        let mut evaluated: Vec<(&Point, &Evaluation)> = self.memo.iter().collect();
        evaluated.sort_by_key(|(point, _)| **point);
        let best = evaluated.into_iter().max_by(|a, b| {
            a.1.accuracy
                .total_cmp(&b.1.accuracy)
                .then(b.1.cost.total_cmp(&a.1.cost))
                .then(b.0.cmp(a.0))
        });

        match best {
            Some((point, evaluation)) => {
                warn!(
                    achieved_accuracy = evaluation.accuracy,
                    "No threshold combination meets the accuracy bound"
                );
                Ok(Planned::BoundViolation {
                    fallback: self.outcome(*point, *evaluation),
                    achieved_accuracy: evaluation.accuracy,
                })
            }
            None => Err(PlannerError::EmptyGrid("threshold")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pathq_detect::testing::ScriptedModel;
    use pathq_models::{Detection, FrameRange, Rect};

    fn sample_curve() -> QualityCurve {
        QualityCurve::from_samples([
            QualitySample::new(1, 0.99, 10.0),
            QualitySample::new(2, 0.95, 5.0),
            QualitySample::new(4, 0.80, 2.0),
        ])
    }

    #[test]
    fn test_plan_q_selects_cheapest_feasible() {
        let curve = sample_curve();

        let planned = plan_q(&curve, 0.9).unwrap();
        assert_eq!(planned, Planned::Met(QualitySample::new(2, 0.95, 5.0)));

        let planned = plan_q(&curve, 0.99).unwrap();
        assert_eq!(planned.value().param_value, 1);
        assert_eq!(planned.value().cost, 10.0);
    }

    #[test]
    fn test_plan_q_bound_violation() {
        let planned = plan_q(&sample_curve(), 0.999).unwrap();
        assert!(!planned.is_met());
        assert_eq!(
            planned,
            Planned::BoundViolation {
                fallback: QualitySample::new(1, 0.99, 10.0),
                achieved_accuracy: 0.99,
            }
        );

        match planned.into_result(0.999) {
            Err(PlannerError::BoundViolation {
                achieved_accuracy,
                bound,
            }) => {
                assert_eq!(achieved_accuracy, 0.99);
                assert_eq!(bound, 0.999);
            }
            other => panic!("expected bound violation, got {other:?}"),
        }
    }

    #[test]
    fn test_plan_q_cost_is_monotone_in_bound() {
        let curve = sample_curve();
        let mut last_cost = 0.0;
        for step in 0..=99 {
            let bound = step as f64 / 100.0;
            let planned = plan_q(&curve, bound).unwrap();
            assert!(planned.is_met());
            assert!(planned.value().cost >= last_cost, "cost dropped at bound {bound}");
            last_cost = planned.value().cost;
        }
    }

    #[test]
    fn test_plan_q_ties() {
        let curve = QualityCurve::from_samples([
            QualitySample::new(2, 0.95, 5.0),
            QualitySample::new(4, 0.93, 5.0),
        ]);
        assert_eq!(plan_q(&curve, 0.9).unwrap().value().param_value, 4);

        let curve = QualityCurve::from_samples([
            QualitySample::new(1, 0.8, 10.0),
            QualitySample::new(2, 0.8, 5.0),
        ]);
        assert_eq!(plan_q(&curve, 0.9).unwrap().value().param_value, 2);
    }

    #[test]
    fn test_plan_q_empty_curve() {
        assert!(matches!(
            plan_q(&QualityCurve::new(), 0.5),
            Err(PlannerError::EmptyCurve)
        ));
    }

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

    /// Three real objects, and two ghosts the model also reports.
    fn scenario(ghost_score: f64) -> (Arc<ScriptedModel>, DatasetConfig, ModelConfig) {
        let truth: Vec<Track> = (0..3).map(|i| moving(i, i as f64 * 100.0, 0.75)).collect();
        let ghosts = (3..5).map(|i| moving(i, i as f64 * 100.0, ghost_score));
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
    async fn test_threshold_search_finds_cheapest_feasible() {
        let (model, dataset, model_cfg) = scenario(0.25);
        let planner = ThresholdPlanner::new(model, everywhere());

        let planned = planner
            .plan_filter_refine(&dataset, &model_cfg, 2, 1, 0.9)
            .await
            .unwrap();
        let search = planned.clone().into_result(0.9).unwrap();

        // Ghosts are dropped by the largest threshold that keeps the real objects,
        // and nothing needs refining.
        assert_eq!(search.filter.threshold, 0.6);
        assert_eq!(search.filter.accuracy, 1.0);
        assert_eq!(search.filter.cost, 20.0);
        assert_eq!(search.refine.uncertainty_threshold, 1.0);
        assert_eq!(search.refine.accuracy, 1.0);
        assert_eq!(search.refine.cost, 20.0);
        assert_eq!(search.grid_size, 5 * 11 * 3);
        assert!(search.evaluations < search.grid_size / 4);
    }

    #[tokio::test]
    async fn test_threshold_search_bound_violation() {
        // Ghosts look exactly like real objects, so precision caps at 3/5.
        let (model, dataset, model_cfg) = scenario(0.75);
        let planner = ThresholdPlanner::new(model, everywhere());

        let planned = planner
            .plan_filter_refine(&dataset, &model_cfg, 2, 1, 0.9)
            .await
            .unwrap();
        match planned {
            Planned::BoundViolation {
                achieved_accuracy, ..
            } => assert!((achieved_accuracy - 0.6).abs() < 1e-9),
            Planned::Met(_) => panic!("bound should not be met"),
        }
    }

    #[tokio::test]
    async fn test_threshold_search_stage_failure() {
        let model = Arc::new(ScriptedModel::new(vec![]).failing_on(4));
        let (_, dataset, model_cfg) = scenario(0.25);
        let planner = ThresholdPlanner::new(model, everywhere());

        let result = planner.plan_filter_refine(&dataset, &model_cfg, 2, 1, 0.9).await;
        assert!(matches!(
            result,
            Err(PlannerError::StageFailure { ref stage, .. }) if stage == "detect"
        ));
    }

    #[tokio::test]
    async fn test_threshold_search_normalizes_refine_grid() {
        let (model, dataset, mut model_cfg) = scenario(0.25);
        model_cfg.refine_grid = vec![0.5, f64::NAN, 0.1, 0.25, 0.1];
        let planner = ThresholdPlanner::new(model, everywhere());

        let search = planner
            .plan_filter_refine(&dataset, &model_cfg, 2, 1, 0.9)
            .await
            .unwrap()
            .into_result(0.9)
            .unwrap();
        // Equal cost and accuracy everywhere on the refine axis: the lowest
        // confidence wins regardless of input order.
        assert_eq!(search.refine.refine_threshold, 0.1);
        assert_eq!(search.grid_size, 5 * 11 * 3);

        model_cfg.refine_grid = vec![f64::NAN];
        assert!(matches!(
            planner.plan_filter_refine(&dataset, &model_cfg, 2, 1, 0.9).await,
            Err(PlannerError::EmptyGrid("refine"))
        ));
    }

    #[tokio::test]
    async fn test_threshold_search_rejects_empty_grid() {
        let (model, dataset, mut model_cfg) = scenario(0.25);
        model_cfg.refine_grid.clear();
        let planner = ThresholdPlanner::new(model, everywhere());
        assert!(matches!(
            planner.plan_filter_refine(&dataset, &model_cfg, 2, 1, 0.9).await,
            Err(PlannerError::EmptyGrid("refine"))
        ));
    }
}
