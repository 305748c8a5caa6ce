//! Structured run logging.
//!
//! [`RunLogger`] tags every event of one plan or execution run with its
//! `(query, freq, bound)` identity so interleaved runs can be told apart. [`init_tracing`] sets up the subscriber for the binaries.

use std::time::Duration;

use pathq_models::{Plan, Stage};
use tracing::{error, info, warn, Span};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global tracing subscriber.
///
/// `LOG_FORMAT=json` selects JSON output; otherwise human-readable text.
/// `RUST_LOG` directives are honoured on top of the `pathq=info` default.
pub fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let mut env_filter = EnvFilter::from_default_env();
    for directive in ["pathq=info", "pathq_worker=info", "pathq_planner=info"] {
        if let Ok(directive) = directive.parse() {
            env_filter = env_filter.add_directive(directive);
        }
    }

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .with(env_filter)
            .init();
    }
}

/// Logger for one planning or execution run.
#[derive(Debug, Clone)]
pub struct RunLogger {
    query: String,
    freq: u32,
    bound: f64,
    operation: &'static str,
}

impl RunLogger {
    pub fn new(query: &str, freq: u32, bound: f64, operation: &'static str) -> Self {
        Self {
            query: query.to_string(),
            freq,
            bound,
            operation,
        }
    }

    /// Logger for executing `plan`.
    pub fn for_plan(plan: &Plan) -> Self {
        Self::new(&plan.query, plan.freq, plan.bound, "execute")
    }

    pub fn log_start(&self, message: &str) {
        info!(
            query = %self.query,
            freq = self.freq,
            bound = self.bound,
            operation = self.operation,
            "Run started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            query = %self.query,
            operation = self.operation,
            "Run progress: {}", message
        );
    }

    /// A stage was satisfied from its stored artifact.
    pub fn log_stage_skipped(&self, stage: Stage) {
        info!(
            query = %self.query,
            stage = %stage,
            "Stage artifact is current, skipping"
        );
    }

    pub fn log_stage_completed(&self, stage: Stage, elapsed: Duration) {
        info!(
            query = %self.query,
            stage = %stage,
            elapsed_ms = elapsed.as_millis() as u64,
            "Stage completed"
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            query = %self.query,
            operation = self.operation,
            "Run warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            query = %self.query,
            operation = self.operation,
            "Run error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            query = %self.query,
            freq = self.freq,
            bound = self.bound,
            operation = self.operation,
            "Run completed: {}", message
        );
    }

    /// Span covering the whole run.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "run",
            query = %self.query,
            freq = self.freq,
            bound = self.bound,
            operation = self.operation
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_logger_without_subscriber() {
        let logger = RunLogger::new("shibuya", 16, 0.9, "plan");
        let _guard = logger.create_span().entered();
        // No subscriber is installed; logging must still be a no-op.
        logger.log_stage_skipped(Stage::Detect);
        logger.log_completion("done");
    }
}
