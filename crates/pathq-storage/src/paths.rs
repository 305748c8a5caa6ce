//! Artifact locations.
//!
//! Every `(query, freq, bound)` owns one directory,
//! `{root}/{query}/{freq}/{bound}/`, holding one JSON file per stage plus
//! the plan itself.

use std::path::{Path, PathBuf};

use pathq_models::Stage;

/// File name of the plan inside a plan directory.
pub const PLAN_FILE: &str = "plan.json";

/// Relative directory for one plan's artifacts.
///
/// Format: `{query}/{freq}/{bound}`
pub fn artifact_dir_key(query: &str, freq: u32, bound: f64) -> String {
    format!("{}/{}/{}", query, freq, bound)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagePaths {
    /// Directory holding every artifact of the plan
    pub dir: PathBuf,
    pub plan: PathBuf,
}

impl StagePaths {
    pub fn derive(root: impl AsRef<Path>, query: &str, freq: u32, bound: f64) -> Self {
        let dir = root.as_ref().join(artifact_dir_key(query, freq, bound));
        let plan = dir.join(PLAN_FILE);
        Self { dir, plan }
    }

    pub fn for_stage(&self, stage: Stage) -> PathBuf {
        self.dir.join(stage.artifact_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_layout() {
        let paths = StagePaths::derive("logs", "shibuya", 16, 0.9);
        assert_eq!(paths.dir, PathBuf::from("logs/shibuya/16/0.9"));
        assert_eq!(paths.plan, PathBuf::from("logs/shibuya/16/0.9/plan.json"));
        assert_eq!(
            paths.for_stage(Stage::EstimateUncertainty),
            PathBuf::from("logs/shibuya/16/0.9/uncertainty.json")
        );
        assert_eq!(
            paths.for_stage(Stage::Final),
            PathBuf::from("logs/shibuya/16/0.9/final.json")
        );
    }

    #[test]
    fn test_distinct_keys_distinct_dirs() {
        let a = StagePaths::derive("logs", "uav", 8, 0.9);
        let b = StagePaths::derive("logs", "uav", 8, 0.95);
        let c = StagePaths::derive("logs", "uav", 4, 0.9);
        assert_ne!(a.dir, b.dir);
        assert_ne!(a.dir, c.dir);
        // Queries sharing a predicate still get their own directories.
        let day = StagePaths::derive("logs", "lane-day", 8, 0.9);
        let night = StagePaths::derive("logs", "lane-night", 8, 0.9);
        assert_ne!(day.dir, night.dir);
        assert_eq!(artifact_dir_key("uav", 8, 1.0), "uav/8/1");
    }
}
