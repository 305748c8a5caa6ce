//! Local artifact storage.
//!
//! This crate provides:
//! - Deterministic per-plan artifact paths
//! - Atomic JSON writes (temp file in the target directory, then rename)
//! - Tolerant reads: a missing, malformed or stale artifact is a cache miss
//! - Plan file helpers

pub mod error;
pub mod paths;
pub mod store;

pub use error::{StorageError, StorageResult};
pub use paths::{artifact_dir_key, StagePaths, PLAN_FILE};
pub use store::ArtifactStore;
