mod common;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use breakfastd::config::OUTPUT_DIR_ENV;
use breakfastd::core::models::{JobRequest, TriggerOrigin};
use breakfastd::core::runner::{CapturedRunner, JobRunner, StreamingRunner, ToolCommand};
use breakfastd::core::{JobFailure, JobKind};
use common::{FakeRunner, orchestrator, test_config};

fn shell(script: &str, timeout: Duration) -> ToolCommand {
    ToolCommand {
        program: "sh".to_string(),
        // "tool" fills $0 so request args land in $@.
        args: vec!["-c".to_string(), script.to_string(), "tool".to_string()],
        env: BTreeMap::new(),
        timeout,
    }
}

fn sync_request() -> JobRequest {
    JobRequest::sync(None, false, TriggerOrigin::Manual)
}

#[tokio::test]
async fn captured_summary_is_second_to_last_line() {
    let runner = CapturedRunner::new(shell(
        "echo 'Fetching documents'; echo '4 exported, 2 unchanged'; echo 'Done in 1.2s'",
        Duration::from_secs(5),
    ));

    let outcome = runner.execute(&sync_request()).await;
    assert!(outcome.is_success());
    assert_eq!(outcome.summary, "4 exported, 2 unchanged");
    assert!(outcome.output.contains("Fetching documents"));
}

#[tokio::test]
async fn captured_failure_uses_stderr() {
    let runner = CapturedRunner::new(shell(
        "echo 'starting'; echo 'token expired' >&2; exit 3",
        Duration::from_secs(5),
    ));

    let outcome = runner.execute(&sync_request()).await;
    assert_eq!(
        outcome.failure,
        Some(JobFailure::ProcessFailure {
            code: Some(3),
            detail: "token expired".to_string(),
        })
    );
}

#[tokio::test]
async fn captured_forwards_args_and_output_dir() {
    let mut tool = shell(
        "echo \"$@\"; echo \"$GRANOLA_OUTPUT_DIR\"; echo footer",
        Duration::from_secs(5),
    );
    tool.env
        .insert(OUTPUT_DIR_ENV.to_string(), "/tmp/notes".to_string());
    let runner = CapturedRunner::new(tool);

    let outcome = runner
        .execute(&JobRequest::sync(Some(7), true, TriggerOrigin::Manual))
        .await;
    assert!(outcome.output.starts_with("--days 7 --force\n"));
    assert_eq!(outcome.summary, "/tmp/notes");
}

#[tokio::test]
async fn missing_program_is_an_infrastructure_failure() {
    let runner = CapturedRunner::new(ToolCommand {
        program: "/nonexistent/breakfast-sync".to_string(),
        args: Vec::new(),
        env: BTreeMap::new(),
        timeout: Duration::from_secs(5),
    });

    let outcome = runner.execute(&sync_request()).await;
    assert!(matches!(outcome.failure, Some(JobFailure::Infrastructure(_))));
}

#[tokio::test]
async fn missing_program_releases_guard_and_notifies_once() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(CapturedRunner::new(ToolCommand {
        program: "/nonexistent/breakfast-sync".to_string(),
        args: Vec::new(),
        env: BTreeMap::new(),
        timeout: Duration::from_secs(5),
    }));
    let (orch, notifier) = orchestrator(
        test_config(dir.path()),
        runner,
        Arc::new(FakeRunner::immediate("Nothing to import")),
    );

    let outcome = orch.sync_now().await.unwrap();
    assert!(matches!(outcome.failure, Some(JobFailure::Infrastructure(_))));
    assert!(!orch.context().guard.is_busy(JobKind::Sync));

    let events = notifier.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].subtitle, "Error");
    assert!(events[0].payload.is_none());

    // A second request is admitted again.
    assert!(orch.sync_now().await.is_ok());
    assert_eq!(notifier.events().len(), 2);
}

#[tokio::test]
async fn timeout_releases_guard() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(CapturedRunner::new(shell(
        "sleep 5",
        Duration::from_millis(200),
    )));
    let (orch, notifier) = orchestrator(
        test_config(dir.path()),
        runner,
        Arc::new(FakeRunner::immediate("Nothing to import")),
    );

    let outcome = orch.sync_now().await.unwrap();
    assert_eq!(outcome.failure, Some(JobFailure::Timeout));
    assert!(outcome.elapsed < Duration::from_secs(5));
    assert!(!orch.context().guard.is_busy(JobKind::Sync));

    let events = notifier.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].subtitle, "Error");
    assert_eq!(events[0].body, "timed out");
}

#[tokio::test]
async fn streaming_log_has_banners_and_summary() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("logs/import.log");
    std::fs::create_dir_all(log.parent().unwrap()).unwrap();
    std::fs::write(&log, "previous run\n").unwrap();

    let runner = StreamingRunner::new(
        shell(
            "echo 'Scanning notes'; echo 'Complete: 2 imported, 1 skipped'",
            Duration::from_secs(5),
        ),
        log.clone(),
    );

    let outcome = runner
        .execute(&JobRequest::import(false, TriggerOrigin::Manual))
        .await;
    assert!(outcome.is_success());
    assert_eq!(outcome.summary, "Complete: 2 imported, 1 skipped");

    let text = std::fs::read_to_string(&log).unwrap();
    assert!(!text.contains("previous run"));
    assert!(text.starts_with("=== Obsidian Import started"));
    assert!(text.contains("Scanning notes\n"));
    assert!(text.trim_end().ends_with("(exit 0) ==="));
}

#[tokio::test]
async fn streaming_failure_reports_error_line() {
    let dir = tempfile::tempdir().unwrap();
    let runner = StreamingRunner::new(
        shell(
            "echo 'Scanning notes'; echo 'Error: vault is locked' >&2; exit 1",
            Duration::from_secs(5),
        ),
        dir.path().join("import.log"),
    );

    let outcome = runner
        .execute(&JobRequest::import(true, TriggerOrigin::Manual))
        .await;
    assert_eq!(
        outcome.failure,
        Some(JobFailure::ProcessFailure {
            code: Some(1),
            detail: "Error: vault is locked".to_string(),
        })
    );
    assert_eq!(outcome.summary, "Import finished");
}

#[tokio::test]
async fn streaming_timeout_is_logged() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("import.log");
    let runner = StreamingRunner::new(
        shell("echo 'Scanning notes'; sleep 5", Duration::from_millis(300)),
        log.clone(),
    );

    let outcome = runner
        .execute(&JobRequest::import(false, TriggerOrigin::Automatic))
        .await;
    assert_eq!(outcome.failure, Some(JobFailure::Timeout));
    assert!(std::fs::read_to_string(&log).unwrap().contains("=== Timed out"));
}
