//! Resuming execution from stored stage artifacts.

use pathq_models::Stage;
use pathq_worker::{run_exec, run_plan, ExecArgs, PlanArgs};

use super::fixtures::Workspace;

async fn planned(ws: &Workspace) -> ExecArgs {
    let args = PlanArgs {
        query: "lane".to_string(),
        freq: 4,
        bound: 0.9,
        seed_plan: None,
    };
    let outcome = run_plan(&ws.config, &args).await.unwrap();
    ExecArgs {
        query: "lane".to_string(),
        plan_file: outcome.path,
    }
}

#[tokio::test]
async fn test_second_run_is_byte_identical() {
    let ws = Workspace::new(vec![]);
    let args = planned(&ws).await;

    let first = run_exec(&ws.config, &args).await.unwrap();
    let snapshot: Vec<Vec<u8>> = Stage::ALL
        .iter()
        .map(|s| std::fs::read(first.paths.for_stage(*s)).unwrap())
        .collect();

    let second = run_exec(&ws.config, &args).await.unwrap();
    assert_eq!(first.tracks, second.tracks);
    for (stage, bytes) in Stage::ALL.iter().zip(&snapshot) {
        assert_eq!(&std::fs::read(second.paths.for_stage(*stage)).unwrap(), bytes);
    }
}

#[tokio::test]
async fn test_interrupted_run_resumes() {
    let ws = Workspace::new(vec![]);
    let args = planned(&ws).await;

    let first = run_exec(&ws.config, &args).await.unwrap();
    let detect = std::fs::read(first.paths.for_stage(Stage::Detect)).unwrap();

    // Simulate a crash after Track: later artifacts never made it to disk.
    for stage in [Stage::Filter, Stage::EstimateUncertainty, Stage::Refine, Stage::Final] {
        std::fs::remove_file(first.paths.for_stage(stage)).unwrap();
    }

    let resumed = run_exec(&ws.config, &args).await.unwrap();
    assert_eq!(resumed.tracks, first.tracks);
    assert_eq!(std::fs::read(resumed.paths.for_stage(Stage::Detect)).unwrap(), detect);
    assert!(resumed.paths.for_stage(Stage::Final).exists());
}

#[tokio::test]
async fn test_stale_artifact_is_recomputed() {
    let ws = Workspace::new(vec![]);
    let args = planned(&ws).await;

    let first = run_exec(&ws.config, &args).await.unwrap();
    let track_path = first.paths.for_stage(Stage::Track);
    let original = std::fs::read(&track_path).unwrap();

    // Same shape, written by a different format version.
    let mut stale: serde_json::Value = serde_json::from_slice(&original).unwrap();
    stale["version"] = serde_json::json!(0);
    std::fs::write(&track_path, serde_json::to_vec_pretty(&stale).unwrap()).unwrap();

    let second = run_exec(&ws.config, &args).await.unwrap();
    assert_eq!(second.tracks, first.tracks);
    assert_eq!(std::fs::read(&track_path).unwrap(), original);
}
