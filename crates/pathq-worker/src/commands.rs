//! The `plan` and `exec` commands behind the binaries.

use std::path::PathBuf;
use std::sync::Arc;

use pathq_models::{Plan, Track};
use pathq_planner::PlanBuilder;
use pathq_storage::{ArtifactStore, StagePaths};
use tracing::info;

use crate::catalog::QueryCatalog;
use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::RunLogger;
use crate::metrics;
use crate::pipeline::PipelineExecutor;

/// `pathq-plan <query> <freq> <bound> [existing-plan]`
#[derive(Debug, Clone, PartialEq)]
pub struct PlanArgs {
    pub query: String,
    pub freq: u32,
    pub bound: f64,
    /// Older plan whose quality curves seed this one
    pub seed_plan: Option<PathBuf>,
}

impl PlanArgs {
    pub const USAGE: &'static str = "usage: pathq-plan <query> <freq> <bound> [existing-plan]";

    pub fn parse(args: &[String]) -> WorkerResult<Self> {
        let (query, freq, bound, seed_plan) = match args {
            [query, freq, bound] => (query, freq, bound, None),
            [query, freq, bound, seed] => (query, freq, bound, Some(PathBuf::from(seed))),
            _ => return Err(WorkerError::configuration(Self::USAGE)),
        };
        let freq: u32 = freq
            .parse()
            .ok()
            .filter(|f| *f > 0)
            .ok_or_else(|| WorkerError::configuration(format!("invalid freq: {freq}")))?;
        let bound: f64 = bound
            .parse()
            .ok()
            .filter(|b: &f64| (0.0..=1.0).contains(b))
            .ok_or_else(|| WorkerError::configuration(format!("invalid bound: {bound}")))?;

        Ok(Self {
            query: query.clone(),
            freq,
            bound,
            seed_plan,
        })
    }
}

/// `pathq-exec <query> <plan-file>`
#[derive(Debug, Clone, PartialEq)]
pub struct ExecArgs {
    pub query: String,
    pub plan_file: PathBuf,
}

impl ExecArgs {
    pub const USAGE: &'static str = "usage: pathq-exec <query> <plan-file>";

    pub fn parse(args: &[String]) -> WorkerResult<Self> {
        match args {
            [query, plan_file] => Ok(Self {
                query: query.clone(),
                plan_file: PathBuf::from(plan_file),
            }),
            _ => Err(WorkerError::configuration(Self::USAGE)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlanOutcome {
    pub plan: Plan,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ExecOutcome {
    pub tracks: Vec<Track>,
    pub paths: StagePaths,
}

/// Build a plan for a catalogue query and write it under the log directory.
pub async fn run_plan(config: &WorkerConfig, args: &PlanArgs) -> WorkerResult<PlanOutcome> {
    let logger = RunLogger::new(&args.query, args.freq, args.bound, "plan");
    logger.log_start("building plan");

    let catalog = QueryCatalog::load(&config.catalog_path).await?;
    let registry = Arc::new(catalog.registry()?);
    let query = catalog.resolve(&args.query, config).await?;
    let store = ArtifactStore::new(&config.log_dir);

    let seed = match &args.seed_plan {
        Some(path) => Some(store.read_plan(path).await.map_err(WorkerError::from_plan_read)?),
        None => None,
    };

    let plan = PlanBuilder::new(query.model.clone(), registry)
        .accept_degraded(config.accept_degraded)
        .build(&query.dataset, &query.model_cfg, args.freq, args.bound, seed.as_ref())
        .await?;

    let paths = store.plan_paths(&plan);
    store.write_plan(&paths.plan, &plan).await?;
    metrics::record_plan_built(&plan.predicate, plan.bound_violations.len());

    if plan.is_degraded() {
        logger.log_warning("plan accepted below the accuracy bound");
    }
    logger.log_completion(&format!("plan written to {}", paths.plan.display()));
    Ok(PlanOutcome {
        plan,
        path: paths.plan,
    })
}

/// Execute a stored plan for a catalogue query.
pub async fn run_exec(config: &WorkerConfig, args: &ExecArgs) -> WorkerResult<ExecOutcome> {
    let catalog = QueryCatalog::load(&config.catalog_path).await?;
    let registry = Arc::new(catalog.registry()?);
    let query = catalog.resolve(&args.query, config).await?;
    let store = ArtifactStore::new(&config.log_dir);

    let stored = store
        .read_plan(&args.plan_file)
        .await
        .map_err(WorkerError::from_plan_read)?;
    if stored.predicate != query.dataset.predicate {
        return Err(WorkerError::configuration(format!(
            "plan is for predicate '{}' but query '{}' uses '{}'",
            stored.predicate, query.name, query.dataset.predicate
        )));
    }
    // Artifacts belong to the query being executed, not the one planned.
    let plan = if stored.query == query.name {
        stored
    } else {
        info!(
            planned_for = %stored.query,
            query = %query.name,
            "Executing plan for another query on the same predicate"
        );
        stored.for_query(&query.name)
    };

    let paths = store.plan_paths(&plan);
    let executor = PipelineExecutor::new(query.model.clone(), registry, store);
    let tracks = executor
        .execute(query.execution, &query.model_cfg, &plan, &paths)
        .await?;

    Ok(ExecOutcome { tracks, paths })
}
