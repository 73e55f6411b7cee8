#![allow(dead_code)]

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use breakfastd::config::{AppConfig, NotificationChannelType};
use breakfastd::context::AppContext;
use breakfastd::core::models::{JobOutcome, JobRequest};
use breakfastd::core::notifications::{NotificationChannel, NotificationEvent};
use breakfastd::core::opener::Opener;
use breakfastd::core::{JobKind, Orchestrator};
use breakfastd::core::runner::JobRunner;
use chrono::Local;
use tokio::sync::Semaphore;

/// Runner that counts invocations and optionally blocks until released.
pub struct FakeRunner {
    pub calls: Arc<AtomicUsize>,
    args: Mutex<Vec<Vec<String>>>,
    summary: String,
    gate: Option<Arc<Semaphore>>,
}

impl FakeRunner {
    pub fn immediate(summary: &str) -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            args: Mutex::new(Vec::new()),
            summary: summary.to_string(),
            gate: None,
        }
    }

    /// Each run waits for one permit on the returned semaphore.
    pub fn gated(summary: &str) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let runner = Self {
            calls: Arc::new(AtomicUsize::new(0)),
            args: Mutex::new(Vec::new()),
            summary: summary.to_string(),
            gate: Some(gate.clone()),
        };
        (runner, gate)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Tool arguments of every run, in order.
    pub fn args(&self) -> Vec<Vec<String>> {
        self.args.lock().unwrap().clone()
    }
}

impl JobRunner for FakeRunner {
    fn execute(&self, request: &JobRequest) -> Pin<Box<dyn Future<Output = JobOutcome> + Send>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.args.lock().unwrap().push(request.args.clone());
        let kind = request.kind;
        let summary = self.summary.clone();
        let gate = self.gate.clone();

        Box::pin(async move {
            if let Some(gate) = gate {
                gate.acquire().await.unwrap().forget();
            }
            JobOutcome {
                run_id: "fake".to_string(),
                kind,
                failure: None,
                output: format!("{}\nDone\n", summary),
                summary,
                elapsed: Duration::from_millis(1),
                finished_at: Local::now(),
            }
        })
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub events: Mutex<Vec<NotificationEvent>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<NotificationEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationChannel for RecordingNotifier {
    async fn notify(&self, event: &NotificationEvent) -> Result<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

pub fn test_config(output_dir: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.output_dir = output_dir.to_path_buf();
    config.state_file = output_dir.join("state/cache.json");
    config.notifications.channel = NotificationChannelType::None;
    config.sync.log_file = output_dir.join("sync.log");
    config.import.log_file = output_dir.join("import.log");
    config
}

/// Orchestrator with fake runners, a recording notifier and `true` as opener.
pub fn orchestrator(
    config: AppConfig,
    sync: Arc<dyn JobRunner>,
    import: Arc<dyn JobRunner>,
) -> (Orchestrator, Arc<RecordingNotifier>) {
    let notifier = Arc::new(RecordingNotifier::default());
    let orchestrator = Orchestrator::new(AppContext::new(config))
        .with_runner(JobKind::Sync, sync)
        .with_runner(JobKind::Import, import)
        .with_notifier(Some(notifier.clone()))
        .with_opener(Opener::new("true"));
    (orchestrator, notifier)
}

/// Poll `check` until it holds or two seconds pass.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
