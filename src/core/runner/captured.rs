use std::future::Future;
use std::pin::Pin;

use tokio::time::timeout;
use tracing::{debug, warn};

use crate::core::error::JobFailure;
use crate::core::models::{JobOutcome, JobRequest};
use crate::core::runner::{JobRunner, OutcomeBuilder, ToolCommand, extract_summary};

/// Runs a tool to completion and inspects its buffered output.
pub struct CapturedRunner {
    tool: ToolCommand,
}

impl CapturedRunner {
    pub fn new(tool: ToolCommand) -> Self {
        Self { tool }
    }
}

impl JobRunner for CapturedRunner {
    fn execute(&self, request: &JobRequest) -> Pin<Box<dyn Future<Output = JobOutcome> + Send>> {
        let request = request.clone();
        let tool = self.tool.clone();

        Box::pin(async move {
            let builder = OutcomeBuilder::start(request.kind);

            debug!(
                run_id = %builder.run_id,
                program = %tool.program,
                args = ?request.args,
                "Spawning tool"
            );

            let child = match tool.command(&request).spawn() {
                Ok(child) => child,
                Err(e) => {
                    warn!(program = %tool.program, error = %e, "Failed to spawn tool");
                    return builder.infrastructure(e);
                }
            };

            // Dropping the wait future on timeout drops the child, which kills it.
            let output = match timeout(tool.timeout, child.wait_with_output()).await {
                Ok(Ok(output)) => output,
                Ok(Err(e)) => return builder.infrastructure(e),
                Err(_) => {
                    warn!(
                        run_id = %builder.run_id,
                        timeout_secs = tool.timeout.as_secs(),
                        "Tool timed out"
                    );
                    return builder.timed_out(String::new());
                }
            };

            let stdout = String::from_utf8_lossy(&output.stdout);
            let stderr = String::from_utf8_lossy(&output.stderr);
            let combined = format!("{}{}", stdout, stderr);
            let summary = extract_summary(&combined, request.kind.fallback_summary());

            let failure = if output.status.success() {
                None
            } else {
                Some(JobFailure::process(output.status.code(), &stderr))
            };

            builder.finish(combined, summary, failure)
        })
    }
}
