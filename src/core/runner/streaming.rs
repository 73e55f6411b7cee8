use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::LazyLock;

use chrono::Local;
use regex::Regex;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::core::error::JobFailure;
use crate::core::models::{JobOutcome, JobRequest};
use crate::core::runner::{JobRunner, OutcomeBuilder, ToolCommand};

/// Lines that carry the import summary. The last match wins.
const SUMMARY_MARKERS: [&str; 2] = ["Complete:", "Nothing to import"];

static ERROR_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)error|failed").expect("error marker regex is valid"));

/// Runs a tool while mirroring every output line into a log file.
///
/// The log is truncated at the start of each run and framed by start/end
/// banners, so it always shows exactly the most recent run.
pub struct StreamingRunner {
    tool: ToolCommand,
    log_path: PathBuf,
}

impl StreamingRunner {
    pub fn new(tool: ToolCommand, log_path: PathBuf) -> Self {
        Self { tool, log_path }
    }
}

impl JobRunner for StreamingRunner {
    fn execute(&self, request: &JobRequest) -> Pin<Box<dyn Future<Output = JobOutcome> + Send>> {
        let request = request.clone();
        let tool = self.tool.clone();
        let log_path = self.log_path.clone();

        Box::pin(async move {
            let builder = OutcomeBuilder::start(request.kind);
            let mut log = LogSink::create(&log_path).await;
            log.line(&format!(
                "=== {} started {} ===",
                request.kind.title(),
                Local::now().to_rfc3339()
            ))
            .await;

            let mut child = match tool.command(&request).spawn() {
                Ok(child) => child,
                Err(e) => {
                    warn!(program = %tool.program, error = %e, "Failed to spawn tool");
                    log.line(&format!("=== Failed to start: {} ===", e)).await;
                    return builder.infrastructure(e);
                }
            };

            let (tx, mut rx) = mpsc::channel::<String>(64);
            if let Some(stdout) = child.stdout.take() {
                tokio::spawn(forward_lines(stdout, tx.clone()));
            }
            if let Some(stderr) = child.stderr.take() {
                tokio::spawn(forward_lines(stderr, tx.clone()));
            }
            drop(tx);

            let mut scan = MarkerScan::default();
            let mut output = String::new();

            let pump = async {
                while let Some(line) = rx.recv().await {
                    log.line(&line).await;
                    scan.observe(&line);
                    output.push_str(&line);
                    output.push('\n');
                }
                child.wait().await
            };

            let waited = timeout(tool.timeout, pump).await;

            let fallback = request.kind.fallback_summary();
            match waited {
                Err(_) => {
                    warn!(
                        run_id = %builder.run_id,
                        timeout_secs = tool.timeout.as_secs(),
                        "Tool timed out"
                    );
                    let _ = child.kill().await;
                    log.line(&format!("=== Timed out {} ===", Local::now().to_rfc3339()))
                        .await;
                    builder.timed_out(output)
                }
                Ok(Err(e)) => {
                    log.line(&format!("=== Failed {}: {} ===", Local::now().to_rfc3339(), e))
                        .await;
                    builder.infrastructure(e)
                }
                Ok(Ok(status)) => {
                    let code = status
                        .code()
                        .map(|c| c.to_string())
                        .unwrap_or_else(|| "signal".to_string());
                    log.line(&format!(
                        "=== Finished {} (exit {}) ===",
                        Local::now().to_rfc3339(),
                        code
                    ))
                    .await;

                    let summary = scan.summary.clone().unwrap_or_else(|| fallback.to_string());
                    let failure = if status.success() {
                        None
                    } else {
                        let detail = scan
                            .error_line
                            .clone()
                            .unwrap_or_else(|| format!("exited with status {}", code));
                        Some(JobFailure::process(status.code(), &detail))
                    };
                    builder.finish(output, summary, failure)
                }
            }
        })
    }
}

async fn forward_lines<R>(reader: R, tx: mpsc::Sender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if tx.send(line).await.is_err() {
            break;
        }
    }
}

#[derive(Debug, Default)]
struct MarkerScan {
    summary: Option<String>,
    error_line: Option<String>,
}

impl MarkerScan {
    fn observe(&mut self, line: &str) {
        let trimmed = line.trim();
        if SUMMARY_MARKERS.iter().any(|m| trimmed.contains(m)) {
            self.summary = Some(trimmed.to_string());
        }
        if ERROR_MARKER.is_match(trimmed) {
            self.error_line = Some(trimmed.to_string());
        }
    }
}

/// Best-effort log file. Write errors disable the log for the rest of the run
/// instead of failing the job.
struct LogSink {
    file: Option<File>,
}

impl LogSink {
    async fn create(path: &Path) -> Self {
        if let Some(parent) = path.parent() {
            let _ = tokio::fs::create_dir_all(parent).await;
        }
        match File::create(path).await {
            Ok(file) => Self { file: Some(file) },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cannot open job log");
                Self { file: None }
            }
        }
    }

    async fn line(&mut self, text: &str) {
        let Some(file) = self.file.as_mut() else {
            return;
        };
        let result = async {
            file.write_all(text.as_bytes()).await?;
            file.write_all(b"\n").await?;
            file.flush().await
        }
        .await;
        if let Err(e) = result {
            debug!(error = %e, "Job log write failed, disabling log");
            self.file = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_summary_marker_wins() {
        let mut scan = MarkerScan::default();
        scan.observe("Found 3 notes in source folder");
        scan.observe("Nothing to import.");
        scan.observe("Complete: 2 imported, 0 failed");
        assert_eq!(
            scan.summary.as_deref(),
            Some("Complete: 2 imported, 0 failed")
        );
    }

    #[test]
    fn error_lines_are_case_insensitive() {
        let mut scan = MarkerScan::default();
        scan.observe("Importing: 2024-01-02-standup.md");
        assert!(scan.error_line.is_none());
        scan.observe("ERROR: vault not found");
        assert_eq!(scan.error_line.as_deref(), Some("ERROR: vault not found"));
        scan.observe("✗ Failed: Claude exited with code 1");
        assert_eq!(
            scan.error_line.as_deref(),
            Some("✗ Failed: Claude exited with code 1")
        );
    }
}
