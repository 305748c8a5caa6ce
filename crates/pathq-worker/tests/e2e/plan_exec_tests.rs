//! Planning and executing catalogue queries.

use pathq_models::Stage;
use pathq_worker::{run_exec, run_plan, ExecArgs, PlanArgs, WorkerError};

use super::fixtures::{object, Workspace};

fn plan_args(query: &str) -> PlanArgs {
    PlanArgs {
        query: query.to_string(),
        freq: 4,
        bound: 0.9,
        seed_plan: None,
    }
}

#[tokio::test]
async fn test_plan_then_execute() {
    let ws = Workspace::new(vec![]);

    let planned = run_plan(&ws.config, &plan_args("lane")).await.unwrap();
    assert_eq!(planned.path, ws.config.log_dir.join("lane/4/0.9/plan.json"));
    assert!(planned.path.exists());
    assert!(!planned.plan.is_degraded());
    assert!(planned.plan.refine.accuracy >= 0.9);
    assert_eq!(planned.plan.curve().map(|c| c.len()), Some(4));

    let args = ExecArgs {
        query: "lane".to_string(),
        plan_file: planned.path.clone(),
    };
    let executed = run_exec(&ws.config, &args).await.unwrap();

    // The object below the lane is tracked but does not match.
    let ids: Vec<u64> = executed.tracks.iter().map(|t| t.id).collect();
    assert_eq!(ids.len(), 2);
    for stage in Stage::ALL {
        assert!(executed.paths.for_stage(*stage).exists());
    }
}

#[tokio::test]
async fn test_queries_sharing_a_predicate_do_not_share_artifacts() {
    let ws = Workspace::new(vec![]);
    let exec_args = |query: &str, plan_file: &std::path::Path| ExecArgs {
        query: query.to_string(),
        plan_file: plan_file.to_path_buf(),
    };

    let lane = run_plan(&ws.config, &plan_args("lane")).await.unwrap();
    let lane_run = run_exec(&ws.config, &exec_args("lane", &lane.path)).await.unwrap();
    assert_eq!(lane_run.tracks.len(), 2);

    let night = run_plan(&ws.config, &plan_args("night")).await.unwrap();
    assert_eq!(night.path, ws.config.log_dir.join("night/4/0.9/plan.json"));
    assert_eq!(night.plan.query, "night");
    assert_eq!(night.plan.predicate, "lane");
    // Planning `night` leaves `lane`'s plan alone.
    assert_eq!(read_query(&lane.path), "lane");

    let night_run = run_exec(&ws.config, &exec_args("night", &night.path)).await.unwrap();
    assert_eq!(night_run.tracks.len(), 1);
    assert_ne!(night_run.paths.dir, lane_run.paths.dir);

    // A plan made for `lane` runs against `night`'s own source and artifacts.
    std::fs::remove_dir_all(&night_run.paths.dir).unwrap();
    let reused = run_exec(&ws.config, &exec_args("night", &lane.path)).await.unwrap();
    assert_eq!(reused.tracks.len(), 1);
    assert_eq!(reused.paths.dir, ws.config.log_dir.join("night/4/0.9"));
}

fn read_query(plan_file: &std::path::Path) -> String {
    let plan: serde_json::Value =
        serde_json::from_slice(&std::fs::read(plan_file).unwrap()).unwrap();
    plan["query"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_replan_reuses_quality_curve() {
    let ws = Workspace::new(vec![]);
    let first = run_plan(&ws.config, &plan_args("lane")).await.unwrap();

    // Move the first plan aside so it can seed the second.
    let seed_path = ws.path().join("seed.json");
    std::fs::copy(&first.path, &seed_path).unwrap();

    let mut args = plan_args("lane");
    args.seed_plan = Some(seed_path);
    let second = run_plan(&ws.config, &args).await.unwrap();

    assert_eq!(second.plan.q_samples, first.plan.q_samples);
    assert_eq!(second.plan.q, first.plan.q);
}

#[tokio::test]
async fn test_unknown_query_is_configuration_error() {
    let ws = Workspace::new(vec![]);

    let err = run_plan(&ws.config, &plan_args("nowhere")).await.unwrap_err();
    assert!(matches!(err, WorkerError::UnknownQuery(_)));
    assert_eq!(err.exit_code(), 2);

    let args = ExecArgs {
        query: "nowhere".to_string(),
        plan_file: ws.path().join("plan.json"),
    };
    assert_eq!(run_exec(&ws.config, &args).await.unwrap_err().exit_code(), 2);
}

#[tokio::test]
async fn test_malformed_plan_is_configuration_error() {
    let ws = Workspace::new(vec![]);
    let plan_file = ws.path().join("broken.json");
    std::fs::write(&plan_file, r#"{"predicate": "lane", "freq": "#).unwrap();

    let args = ExecArgs {
        query: "lane".to_string(),
        plan_file,
    };
    let err = run_exec(&ws.config, &args).await.unwrap_err();
    assert!(matches!(err, WorkerError::MalformedPlan { .. }));
    assert_eq!(err.exit_code(), 2);
}

#[tokio::test]
async fn test_bound_violation_exit_code() {
    // An object the model sees in the lane that is not really there caps
    // precision at 2/3 whatever the thresholds.
    let ws = Workspace::new(vec![object(3, 60.0, 0.8)]);

    let err = run_plan(&ws.config, &plan_args("lane")).await.unwrap_err();
    assert_eq!(err.exit_code(), 3);
    assert!(!ws.config.log_dir.join("lane/4/0.9/plan.json").exists());
}

#[tokio::test]
async fn test_degraded_plan_is_accepted_when_configured() {
    let mut ws = Workspace::new(vec![object(3, 60.0, 0.8)]);
    ws.config.accept_degraded = true;

    let planned = run_plan(&ws.config, &plan_args("lane")).await.unwrap();
    assert!(planned.plan.is_degraded());
    let steps: Vec<&str> = planned
        .plan
        .bound_violations
        .iter()
        .map(|v| v.step.as_str())
        .collect();
    assert_eq!(steps, vec!["q", "filter_refine"]);
    assert!(planned.path.exists());
}
