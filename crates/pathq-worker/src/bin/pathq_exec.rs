//! Execute a stored plan and print the number of matching tracks.

use anyhow::Context;
use tracing::{error, info};

use pathq_worker::{exit_code, init_tracing, run_exec, ExecArgs, WorkerConfig, WorkerError};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    let code = match run(&config).await {
        Ok(()) => exit_code::OK,
        Err(e) => {
            error!(error = %e, "pathq-exec failed");
            eprintln!("pathq-exec: {e:#}");
            e.downcast_ref::<WorkerError>()
                .map(WorkerError::exit_code)
                .unwrap_or(exit_code::FAILURE)
        }
    };
    std::process::exit(code);
}

async fn run(config: &WorkerConfig) -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let args = ExecArgs::parse(&args)?;

    let outcome = run_exec(config, &args)
        .await
        .with_context(|| format!("executing {}", args.plan_file.display()))?;

    println!("{}", outcome.tracks.len());
    Ok(())
}
