//! Build an execution plan for a catalogue query.

use anyhow::Context;
use tracing::{error, info};

use pathq_worker::{exit_code, init_tracing, run_plan, PlanArgs, WorkerConfig, WorkerError};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    let code = match run(&config).await {
        Ok(()) => exit_code::OK,
        Err(e) => {
            error!(error = %e, "pathq-plan failed");
            eprintln!("pathq-plan: {e:#}");
            e.downcast_ref::<WorkerError>()
                .map(WorkerError::exit_code)
                .unwrap_or(exit_code::FAILURE)
        }
    };
    std::process::exit(code);
}

async fn run(config: &WorkerConfig) -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let args = PlanArgs::parse(&args)?;

    let outcome = run_plan(config, &args)
        .await
        .with_context(|| format!("planning query '{}'", args.query))?;

    println!("{}", outcome.path.display());
    for violation in &outcome.plan.bound_violations {
        eprintln!(
            "warning: {} step reached accuracy {:.3}, below bound {}",
            violation.step, violation.achieved_accuracy, outcome.plan.bound
        );
    }
    Ok(())
}
