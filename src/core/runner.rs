//! External job execution.
//!
//! A job is a black-box command: arguments in, text and an exit status out.
//! `CapturedRunner` buffers everything until exit (sync tool). `StreamingRunner`
//! mirrors the output into a log file as it arrives and scans it for markers
//! (import tool).

mod captured;
mod streaming;

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Local;
use tokio::process::Command;
use uuid::Uuid;

use crate::config::{AppConfig, OUTPUT_DIR_ENV};

use super::error::JobFailure;
use super::models::{JobKind, JobOutcome, JobRequest};

pub use captured::CapturedRunner;
pub use streaming::StreamingRunner;

pub trait JobRunner: Send + Sync {
    fn execute(&self, request: &JobRequest) -> Pin<Box<dyn Future<Output = JobOutcome> + Send>>;
}

/// How to launch one external tool.
#[derive(Debug, Clone)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub timeout: Duration,
}

impl ToolCommand {
    /// Build the process for `request`: configured args first, request args last.
    fn command(&self, request: &JobRequest) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .args(&request.args)
            .envs(&self.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

/// Create the runner configured for `kind`.
pub fn create_runner(kind: JobKind, config: &AppConfig) -> Arc<dyn JobRunner> {
    let mut env = BTreeMap::new();
    env.insert(
        OUTPUT_DIR_ENV.to_string(),
        config.output_dir.display().to_string(),
    );

    match kind {
        JobKind::Sync => Arc::new(CapturedRunner::new(ToolCommand {
            program: config.sync.program.clone(),
            args: config.sync.args.clone(),
            env,
            timeout: Duration::from_secs(config.sync.timeout_secs),
        })),
        JobKind::Import => Arc::new(StreamingRunner::new(
            ToolCommand {
                program: config.import.program.clone(),
                args: config.import.args.clone(),
                env,
                timeout: Duration::from_secs(config.import.timeout_secs),
            },
            config.import.log_file.clone(),
        )),
    }
}

/// Pick the human summary out of tool output.
///
/// The tools print their summary line followed by exactly one footer line,
/// so the second-to-last non-empty line is the summary.
pub fn extract_summary(output: &str, fallback: &str) -> String {
    let lines: Vec<&str> = output.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.len() >= 2 {
        lines[lines.len() - 2].trim().to_string()
    } else {
        fallback.to_string()
    }
}

/// Accumulates the pieces of a [`JobOutcome`] while a job runs.
struct OutcomeBuilder {
    run_id: String,
    kind: JobKind,
    started: Instant,
}

impl OutcomeBuilder {
    fn start(kind: JobKind) -> Self {
        Self {
            run_id: Uuid::now_v7().to_string(),
            kind,
            started: Instant::now(),
        }
    }

    fn finish(self, output: String, summary: String, failure: Option<JobFailure>) -> JobOutcome {
        JobOutcome {
            run_id: self.run_id,
            kind: self.kind,
            failure,
            output,
            summary,
            elapsed: self.started.elapsed(),
            finished_at: Local::now(),
        }
    }

    fn timed_out(self, output: String) -> JobOutcome {
        self.finish(output, "timed out".to_string(), Some(JobFailure::Timeout))
    }

    fn infrastructure(self, err: impl ToString) -> JobOutcome {
        let failure = JobFailure::infrastructure(err);
        let summary = failure.to_string();
        self.finish(String::new(), summary, Some(failure))
    }
}
