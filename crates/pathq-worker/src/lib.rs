//! PathQ worker.
//!
//! This crate provides:
//! - The resumable pipeline executor
//! - The query catalogue and worker configuration
//! - The `plan` and `exec` commands behind the `pathq-plan` and
//!   `pathq-exec` binaries
//! - Run logging and metrics

pub mod catalog;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod pipeline;

pub use catalog::{QueryCatalog, QueryEntry, ResolvedQuery};
pub use commands::{run_exec, run_plan, ExecArgs, ExecOutcome, PlanArgs, PlanOutcome};
pub use config::WorkerConfig;
pub use error::{exit_code, WorkerError, WorkerResult};
pub use logging::{init_tracing, RunLogger};
pub use pipeline::PipelineExecutor;
