use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Local};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::context::AppContext;
use crate::core::agent::ReimportAgent;
use crate::core::error::CoordinatorError;
use crate::core::guard::RunPermit;
use crate::core::models::{JobKind, JobOutcome, JobRequest, Trigger, TriggerOrigin};
use crate::core::notifications::{
    ClickEvent, NotificationChannel, NotificationCorrelator, NotificationEvent, create_notifier,
    reports_new_artifacts,
};
use crate::core::opener::Opener;
use crate::core::runner::{JobRunner, create_runner};
use crate::core::snapshot::{StatusSnapshot, is_artifact, recompute};
use crate::core::watcher::ChangeWatcher;

/// Composition root: trigger → guard → runner → snapshot → notification.
///
/// Cheap to clone; every admitted job runs on its own task with a clone.
#[derive(Clone)]
pub struct Orchestrator {
    ctx: AppContext,
    sync_runner: Arc<dyn JobRunner>,
    import_runner: Arc<dyn JobRunner>,
    notifier: Option<Arc<dyn NotificationChannel>>,
    correlator: Arc<NotificationCorrelator>,
    opener: Opener,
    last_sync: Arc<Mutex<Option<DateTime<Local>>>>,
    clicks_tx: mpsc::UnboundedSender<ClickEvent>,
    // Taken by start(); only one control loop consumes clicks.
    clicks_rx: Arc<Mutex<Option<mpsc::UnboundedReceiver<ClickEvent>>>>,
}

impl Orchestrator {
    pub fn new(ctx: AppContext) -> Self {
        let (clicks_tx, clicks_rx) = mpsc::unbounded_channel();
        let config = ctx.config.clone();

        Self {
            sync_runner: create_runner(JobKind::Sync, &config),
            import_runner: create_runner(JobKind::Import, &config),
            notifier: create_notifier(&config.notifications, clicks_tx.clone()),
            correlator: Arc::new(NotificationCorrelator::new()),
            opener: Opener::new(config.opener.clone()),
            last_sync: Arc::new(Mutex::new(None)),
            clicks_tx,
            clicks_rx: Arc::new(Mutex::new(Some(clicks_rx))),
            ctx,
        }
    }

    pub fn with_runner(mut self, kind: JobKind, runner: Arc<dyn JobRunner>) -> Self {
        match kind {
            JobKind::Sync => self.sync_runner = runner,
            JobKind::Import => self.import_runner = runner,
        }
        self
    }

    pub fn with_notifier(mut self, notifier: Option<Arc<dyn NotificationChannel>>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_opener(mut self, opener: Opener) -> Self {
        self.opener = opener;
        self
    }

    pub fn context(&self) -> &AppContext {
        &self.ctx
    }

    /// Run the control loop until `shutdown` fires.
    pub async fn start(&self, shutdown: CancellationToken) -> Result<()> {
        let config = self.ctx.config.clone();
        info!(
            output_dir = %config.output_dir.display(),
            state_file = %config.state_file.display(),
            "breakfastd starting"
        );

        self.refresh_status().await;

        let (trigger_tx, mut triggers) = mpsc::channel(8);
        // Without a watcher the trigger sender is dropped and that select arm goes quiet.
        let watcher = match ChangeWatcher::start(
            &config.state_file,
            Duration::from_secs(config.watch_cooldown_secs),
            trigger_tx,
        ) {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                warn!(error = %e, "Automatic sync disabled, manual commands only");
                None
            }
        };

        let mut clicks = self
            .clicks_rx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();

        let mut tick =
            tokio::time::interval(Duration::from_secs(config.status_tick_secs.max(1)));
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                Some(trigger) = triggers.recv() => {
                    self.handle_trigger(trigger);
                }
                Some(click) = next_click(&mut clicks) => {
                    if let Err(e) = self.open_click(click) {
                        warn!(error = %e, "Could not open clicked note");
                    }
                }
                _ = tick.tick() => {
                    self.ctx.status.refresh_view(Local::now());
                }
                _ = shutdown.cancelled() => {
                    info!("breakfastd shutting down");
                    break;
                }
            }
        }

        drop(watcher);
        Ok(())
    }

    pub async fn sync_now(&self) -> Result<JobOutcome, CoordinatorError> {
        self.submit(JobRequest::sync(None, false, TriggerOrigin::Manual))
            .await
    }

    pub async fn sync_range(&self, days: u32, force: bool) -> Result<JobOutcome, CoordinatorError> {
        self.submit(JobRequest::sync(Some(days), force, TriggerOrigin::Manual))
            .await
    }

    pub async fn sync_week(&self) -> Result<JobOutcome, CoordinatorError> {
        self.submit(JobRequest::weekly_sync(TriggerOrigin::Manual))
            .await
    }

    pub async fn import_now(&self) -> Result<JobOutcome, CoordinatorError> {
        self.ensure_import_enabled()?;
        self.submit(JobRequest::import(false, TriggerOrigin::Manual))
            .await
    }

    /// Hand a full reimport to the external agent. Independent of the import guard.
    pub async fn force_reimport_all(&self) -> Result<(), CoordinatorError> {
        self.ensure_import_enabled()?;
        ReimportAgent::from_config(&self.ctx.config).launch()?;
        self.deliver(&NotificationEvent::plain(
            JobKind::Import.title(),
            "Reimport",
            "Reimporting all notes in the background",
        ))
        .await;
        Ok(())
    }

    /// Admit and run `request` on the current task.
    pub async fn submit(&self, request: JobRequest) -> Result<JobOutcome, CoordinatorError> {
        let Some(permit) = self.ctx.guard.permit(request.kind) else {
            return Err(self.reject(&request).await);
        };
        Ok(self.run_admitted(permit, request).await)
    }

    /// Admit `request` now and run it on a new task.
    pub fn spawn(&self, request: JobRequest) -> Result<JoinHandle<JobOutcome>, CoordinatorError> {
        let Some(permit) = self.ctx.guard.permit(request.kind) else {
            let this = self.clone();
            let kind = request.kind;
            tokio::spawn(async move { this.reject(&request).await });
            return Err(CoordinatorError::AlreadyRunning(kind));
        };

        let this = self.clone();
        Ok(tokio::spawn(async move {
            this.run_admitted(permit, request).await
        }))
    }

    /// Automatic trigger path: a busy guard drops the trigger silently.
    pub fn handle_trigger(&self, trigger: Trigger) -> Option<JoinHandle<JobOutcome>> {
        match trigger {
            Trigger::StateFileChanged { at } => {
                info!(%at, "State file changed");
                self.spawn(JobRequest::sync(None, false, TriggerOrigin::Automatic))
                    .ok()
            }
        }
    }

    /// Resolve a notification click to a note and open it.
    ///
    /// Payloads arrive over the control socket, so only notes directly inside
    /// the output directory are opened.
    pub fn open_click(&self, click: ClickEvent) -> Result<Option<PathBuf>, CoordinatorError> {
        let Some(target) = self.correlator.resolve_click(click.payload.as_ref()) else {
            debug!("Click without payload and no known note, ignoring");
            return Ok(None);
        };
        let config = &self.ctx.config;
        if !is_artifact(&config.output_dir, &config.artifact_extension, &target) {
            return Err(CoordinatorError::NotAnArtifact(target));
        }
        self.opener.open(&target)?;
        Ok(Some(target))
    }

    pub fn open_folder(&self) -> Result<PathBuf, CoordinatorError> {
        self.open_path(self.ctx.config.output_dir.clone())
    }

    pub fn open_vault(&self) -> Result<PathBuf, CoordinatorError> {
        self.open_path(self.ctx.config.import.vault_path.clone())
    }

    pub fn open_log(&self, kind: JobKind) -> Result<PathBuf, CoordinatorError> {
        let path = match kind {
            JobKind::Sync => self.ctx.config.sync.log_file.clone(),
            JobKind::Import => self.ctx.config.import.log_file.clone(),
        };
        self.open_path(path)
    }

    /// Sender for clicks reported by transports outside the notifier.
    pub fn clicks(&self) -> mpsc::UnboundedSender<ClickEvent> {
        self.clicks_tx.clone()
    }

    /// Rescan the artifact directory and publish the result.
    pub async fn refresh_status(&self) -> Arc<StatusSnapshot> {
        let dir = self.ctx.config.output_dir.clone();
        let extension = self.ctx.config.artifact_extension.clone();
        let last_run = self.last_sync();

        let snapshot =
            match tokio::task::spawn_blocking(move || recompute(&dir, &extension, last_run)).await
            {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!(error = %e, "Artifact scan failed");
                    StatusSnapshot {
                        last_run,
                        ..Default::default()
                    }
                }
            };

        debug!(count = snapshot.count, "Status snapshot recomputed");
        self.ctx.status.publish(snapshot)
    }

    // Boxed with an explicit Send bound: an automatic import spawns this same
    // future from inside it.
    fn run_admitted(
        &self,
        permit: RunPermit,
        request: JobRequest,
    ) -> Pin<Box<dyn Future<Output = JobOutcome> + Send + '_>> {
        let span = info_span!("job", kind = %request.kind, origin = ?request.origin);

        Box::pin(
            async move {
                let runner = match permit.kind() {
                    JobKind::Sync => self.sync_runner.clone(),
                    JobKind::Import => self.import_runner.clone(),
                };

                info!(args = ?request.args, "Job started");
                let outcome = runner.execute(&request).await;
                drop(permit);

                match &outcome.failure {
                    None => info!(
                        run_id = %outcome.run_id,
                        elapsed_ms = outcome.elapsed.as_millis() as u64,
                        summary = %outcome.summary,
                        "Job finished"
                    ),
                    Some(failure) => warn!(
                        run_id = %outcome.run_id,
                        elapsed_ms = outcome.elapsed.as_millis() as u64,
                        error = %failure,
                        "Job failed"
                    ),
                }

                if outcome.kind == JobKind::Sync {
                    *self
                        .last_sync
                        .lock()
                        .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(outcome.finished_at);
                }

                let snapshot = self.refresh_status().await;
                let event = self.correlator.emit_result(&outcome, &snapshot);
                self.deliver(&event).await;

                self.maybe_auto_import(&outcome);
                outcome
            }
            .instrument(span),
        )
    }

    async fn reject(&self, request: &JobRequest) -> CoordinatorError {
        if request.is_manual() {
            info!(kind = %request.kind, "Job already running, request rejected");
            self.deliver(&self.correlator.already_running(request.kind))
                .await;
        } else {
            debug!(kind = %request.kind, "Job already running, automatic trigger dropped");
        }
        CoordinatorError::AlreadyRunning(request.kind)
    }

    fn maybe_auto_import(&self, outcome: &JobOutcome) {
        let import = &self.ctx.config.import;
        let wanted = outcome.kind == JobKind::Sync
            && outcome.is_success()
            && import.enabled
            && import.auto_import_on_sync
            && reports_new_artifacts(&outcome.summary);
        if !wanted {
            return;
        }

        match self.spawn(JobRequest::import(false, TriggerOrigin::Automatic)) {
            Ok(_) => info!("Automatic import started after sync"),
            Err(e) => debug!(error = %e, "Automatic import skipped"),
        }
    }

    async fn deliver(&self, event: &NotificationEvent) {
        match &self.notifier {
            Some(notifier) => {
                if let Err(e) = notifier.notify(event).await {
                    warn!(title = %event.title, error = %e, "Notification delivery failed");
                }
            }
            None => info!(
                title = %event.title,
                subtitle = %event.subtitle,
                body = %event.body,
                "Notification (no channel configured)"
            ),
        }
    }

    pub fn ensure_import_enabled(&self) -> Result<(), CoordinatorError> {
        if self.ctx.config.import.enabled {
            Ok(())
        } else {
            Err(CoordinatorError::ImportDisabled)
        }
    }

    fn open_path(&self, path: PathBuf) -> Result<PathBuf, CoordinatorError> {
        self.opener.open(&path)?;
        Ok(path)
    }

    fn last_sync(&self) -> Option<DateTime<Local>> {
        *self
            .last_sync
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

async fn next_click(rx: &mut Option<mpsc::UnboundedReceiver<ClickEvent>>) -> Option<ClickEvent> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
