//! JSON artifact store.
//!
//! Reads never fail: a missing file, a file that does not parse, and an
//! artifact written for another stage, key or format version are all cache
//! misses. Writes go to a temp file in the destination directory and are
//! renamed into place, so readers see either the old file or the new one.

use std::path::{Path, PathBuf};

use pathq_models::{ArtifactKey, Plan, Stage, StageArtifact, ARTIFACT_VERSION};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};
use crate::paths::StagePaths;

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Artifact paths for `(query, freq, bound)` under this store's root.
    pub fn paths(&self, query: &str, freq: u32, bound: f64) -> StagePaths {
        StagePaths::derive(&self.root, query, freq, bound)
    }

    /// Artifact paths for the query `plan` is bound to.
    pub fn plan_paths(&self, plan: &Plan) -> StagePaths {
        self.paths(&plan.query, plan.freq, plan.bound)
    }

    /// Read and decode a JSON file.
    ///
    /// Returns `None` if the file is missing, unreadable or malformed.
    pub async fn read<T: DeserializeOwned>(&self, path: &Path) -> Option<T> {
        let content = match fs::read(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Artifact cache miss (missing)");
                return None;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read artifact");
                return None;
            }
        };

        match serde_json::from_slice(&content) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Malformed artifact, treating as miss");
                None
            }
        }
    }

    /// Atomically write `value` as pretty JSON.
    pub async fn write<T: Serialize>(&self, path: &Path, value: &T) -> StorageResult<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        write_atomic(path, &bytes).await?;
        debug!(path = %path.display(), bytes = bytes.len(), "Wrote artifact");
        Ok(())
    }

    /// Load a stage artifact if it was produced for `stage` and `key` in the
    /// current format.
    pub async fn read_stage<T: DeserializeOwned>(
        &self,
        paths: &StagePaths,
        stage: Stage,
        key: &ArtifactKey,
    ) -> Option<StageArtifact<T>> {
        let path = paths.for_stage(stage);
        let artifact: StageArtifact<T> = self.read(&path).await?;
        if artifact.is_valid_for(stage, key) {
            debug!(stage = %stage, path = %path.display(), "Artifact cache hit");
            Some(artifact)
        } else {
            debug!(
                stage = %stage,
                cached_version = artifact.version,
                current_version = ARTIFACT_VERSION,
                "Artifact written for another stage, key or version, treating as miss"
            );
            None
        }
    }

    pub async fn write_stage<T: Serialize>(
        &self,
        paths: &StagePaths,
        artifact: &StageArtifact<T>,
    ) -> StorageResult<()> {
        self.write(&paths.for_stage(artifact.stage), artifact).await
    }

    /// Load a plan file. Unlike stage artifacts, a malformed plan is an error.
    pub async fn read_plan(&self, path: &Path) -> StorageResult<Plan> {
        let content = match fs::read(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::not_found(path));
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&content).map_err(|e| StorageError::malformed(path, e))
    }

    pub async fn write_plan(&self, path: &Path, plan: &Plan) -> StorageResult<()> {
        self.write(path, plan).await
    }
}

/// Write `bytes` to `path` via a uniquely named temp file in the same directory.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> StorageResult<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent).await?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "artifact".to_string());
    let tmp = parent.join(format!(".{}.{}.tmp", file_name, Uuid::new_v4()));

    if let Err(e) = fs::write(&tmp, bytes).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e.into());
    }

    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        warn!(path = %path.display(), error = %e, "Failed to move artifact into place");
        return Err(e.into());
    }

    Ok(())
}
