//! Query catalogue.
//!
//! Maps query names to everything needed to plan and execute them:
//!
//! ```json
//! {
//!   "predicates": [{"name": "gate", "kind": "point_set", "regions": [...]}],
//!   "queries": {
//!     "shibuya": {
//!       "detections": "shibuya/detections.json",
//!       "validation": {"start": 0, "end": 1800},
//!       "ground_truth": "shibuya/truth.json",
//!       "execution": {"start": 1800, "end": 9000},
//!       "model": {"name": "yolov5"}
//!     }
//!   }
//! }
//! ```
//!
//! Relative paths are resolved against the catalogue's directory. A query's
//! predicate defaults to the query name.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use pathq_detect::RecordedModel;
use pathq_models::{DatasetConfig, FrameRange, ModelConfig, Track};
use pathq_predicate::{PredicateDef, PredicateRegistry};
use serde::Deserialize;
use tracing::info;

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryCatalog {
    /// Predicates added on top of the built-in catalogue
    #[serde(default)]
    pub predicates: Vec<PredicateDef>,
    #[serde(default)]
    pub queries: BTreeMap<String, QueryEntry>,
    #[serde(skip)]
    base_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryEntry {
    /// Registered predicate; defaults to the query name
    #[serde(default)]
    pub predicate: Option<String>,
    /// Recorded per-frame detections for the source video
    pub detections: PathBuf,
    /// Frames used for planning
    pub validation: FrameRange,
    /// Ground-truth tracks over the validation range
    #[serde(default)]
    pub ground_truth: Option<PathBuf>,
    /// Frames the executor processes
    pub execution: FrameRange,
    pub model: ModelConfig,
}

/// A catalogue entry with its files loaded.
#[derive(Clone)]
pub struct ResolvedQuery {
    pub name: String,
    pub dataset: DatasetConfig,
    pub model_cfg: ModelConfig,
    pub execution: FrameRange,
    pub model: Arc<RecordedModel>,
}

impl QueryCatalog {
    /// Parse a catalogue; relative paths resolve against `base_dir`.
    pub fn from_json(json: &str, base_dir: impl Into<PathBuf>) -> WorkerResult<Self> {
        let mut catalog: Self = serde_json::from_str(json)
            .map_err(|e| WorkerError::configuration(format!("invalid query catalogue: {e}")))?;
        catalog.base_dir = base_dir.into();
        Ok(catalog)
    }

    pub async fn load(path: &Path) -> WorkerResult<Self> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(WorkerError::configuration(format!(
                    "query catalogue not found: {}",
                    path.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };
        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let catalog = Self::from_json(&content, base_dir)?;
        info!(
            path = %path.display(),
            queries = catalog.queries.len(),
            predicates = catalog.predicates.len(),
            "Loaded query catalogue"
        );
        Ok(catalog)
    }

    /// Built-in predicates plus the catalogue's own definitions.
    pub fn registry(&self) -> WorkerResult<PredicateRegistry> {
        let mut builder = PredicateRegistry::builtin()?.into_builder();
        for def in &self.predicates {
            builder.define(def)?;
        }
        Ok(builder.build())
    }

    pub fn entry(&self, name: &str) -> WorkerResult<&QueryEntry> {
        self.queries
            .get(name)
            .ok_or_else(|| WorkerError::UnknownQuery(name.to_string()))
    }

    /// Load the files behind `name` and apply worker-level overrides.
    pub async fn resolve(&self, name: &str, config: &WorkerConfig) -> WorkerResult<ResolvedQuery> {
        let entry = self.entry(name)?;

        let ground_truth = match &entry.ground_truth {
            Some(path) => load_tracks(&self.resolve_path(path)).await?,
            None => Vec::new(),
        };
        let dataset = DatasetConfig {
            name: name.to_string(),
            predicate: entry.predicate.clone().unwrap_or_else(|| name.to_string()),
            validation: entry.validation,
            ground_truth,
        };

        let mut model_cfg = entry.model.clone();
        model_cfg.max_parallel_samples = model_cfg
            .max_parallel_samples
            .min(config.max_sampling_parallel)
            .max(1);

        let coverage = FrameRange::new(
            entry.validation.start.min(entry.execution.start),
            entry.validation.end.max(entry.execution.end),
        );
        let model = RecordedModel::load(model_cfg.name.clone(), self.resolve_path(&entry.detections))
            .await?
            .with_coverage(coverage);

        Ok(ResolvedQuery {
            name: name.to_string(),
            dataset,
            model_cfg,
            execution: entry.execution,
            model: Arc::new(model),
        })
    }

    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}

/// Read a JSON list of tracks, re-checking frame ordering.
async fn load_tracks(path: &Path) -> WorkerResult<Vec<Track>> {
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        WorkerError::configuration(format!("cannot read ground truth {}: {e}", path.display()))
    })?;
    let raw: Vec<Track> = serde_json::from_str(&content).map_err(|e| {
        WorkerError::configuration(format!("invalid ground truth {}: {e}", path.display()))
    })?;

    raw.into_iter()
        .map(|track| {
            Track::new(track.id, track.detections().to_vec())
                .map_err(|e| WorkerError::configuration(format!("invalid ground truth: {e}")))
        })
        .collect()
}
