//! RPC method handlers.
//!
//! Job methods only decide admission; the run itself continues on its own
//! task and reports through the notification channel.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::core::models::{JobKind, JobRequest, TriggerOrigin};
use crate::core::notifications::{ClickEvent, NotificationPayload};
use crate::core::snapshot::{StatusSnapshot, StatusView};
use crate::core::{CoordinatorError, Orchestrator};

use super::protocol::{Request, Response};

/// Answer to every job method that was admitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStarted {
    pub started: bool,
    pub kind: JobKind,
    pub run: String,
}

/// Result of `status.get`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    pub snapshot: StatusSnapshot,
    pub view: StatusView,
    pub sync_running: bool,
    pub import_running: bool,
    pub revision: u64,
}

/// Result of `daemon.status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonStatus {
    pub version: String,
    pub uptime_secs: u64,
    pub rpc_bind: String,
    pub output_dir: PathBuf,
    pub state_file: PathBuf,
    pub import_enabled: bool,
}

/// Handles RPC method dispatch and execution.
pub struct MethodHandler {
    orchestrator: Orchestrator,
    start_time: Instant,
}

impl MethodHandler {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator,
            start_time: Instant::now(),
        }
    }

    /// Handle an RPC request and return a response.
    pub async fn handle(&self, request: Request) -> Response {
        let id = request.id.clone().unwrap_or(Value::Null);
        let params = request.params.unwrap_or(Value::Null);

        match request.method.as_str() {
            "daemon.status" => self.daemon_status(id),
            "status.get" => self.status_get(id),
            "sync.now" => self.sync_now(id, params),
            "sync.range" => self.sync_range(id, params),
            "import.now" => self.import_now(id, params),
            "import.reimport_all" => self.reimport_all(id).await,
            "notification.click" => self.notification_click(id, params),
            "open.folder" => opened(id, self.orchestrator.open_folder()),
            "open.vault" => opened(id, self.orchestrator.open_vault()),
            "open.log" => self.open_log(id, params),
            _ => Response::method_not_found(id, &request.method),
        }
    }

    fn daemon_status(&self, id: Value) -> Response {
        let config = &self.orchestrator.context().config;
        Response::success(
            id,
            DaemonStatus {
                version: env!("CARGO_PKG_VERSION").to_string(),
                uptime_secs: self.start_time.elapsed().as_secs(),
                rpc_bind: config.rpc_bind.to_string(),
                output_dir: config.output_dir.clone(),
                state_file: config.state_file.clone(),
                import_enabled: config.import.enabled,
            },
        )
    }

    fn status_get(&self, id: Value) -> Response {
        let ctx = self.orchestrator.context();
        let state = ctx.status.read();
        Response::success(
            id,
            StatusReport {
                snapshot: Arc::unwrap_or_clone(state.snapshot),
                view: state.view,
                sync_running: ctx.guard.is_busy(JobKind::Sync),
                import_running: ctx.guard.is_busy(JobKind::Import),
                revision: state.revision,
            },
        )
    }

    fn sync_now(&self, id: Value, params: Value) -> Response {
        let params: ForceParam = match parse_optional(params) {
            Ok(p) => p,
            Err(e) => return Response::invalid_params(id, e.to_string()),
        };
        self.start_job(id, JobRequest::sync(None, params.force, TriggerOrigin::Manual))
    }

    fn sync_range(&self, id: Value, params: Value) -> Response {
        #[derive(Deserialize)]
        struct Params {
            days: u32,
            #[serde(default)]
            force: bool,
        }

        let params: Params = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => return Response::invalid_params(id, e.to_string()),
        };

        self.start_job(
            id,
            JobRequest::sync(Some(params.days), params.force, TriggerOrigin::Manual),
        )
    }

    fn import_now(&self, id: Value, params: Value) -> Response {
        let params: ForceParam = match parse_optional(params) {
            Ok(p) => p,
            Err(e) => return Response::invalid_params(id, e.to_string()),
        };

        if let Err(e) = self.orchestrator.ensure_import_enabled() {
            return Response::refused(id, &e);
        }
        self.start_job(id, JobRequest::import(params.force, TriggerOrigin::Manual))
    }

    async fn reimport_all(&self, id: Value) -> Response {
        match self.orchestrator.force_reimport_all().await {
            Ok(()) => Response::success(id, json!({ "started": true, "run": "agent" })),
            Err(e) => Response::refused(id, &e),
        }
    }

    fn notification_click(&self, id: Value, params: Value) -> Response {
        #[derive(Deserialize, Default)]
        struct Params {
            #[serde(default)]
            payload: Option<PathBuf>,
        }

        let params: Params = match parse_optional(params) {
            Ok(p) => p,
            Err(e) => return Response::invalid_params(id, e.to_string()),
        };

        let click = ClickEvent {
            payload: params
                .payload
                .map(|artifact| NotificationPayload { artifact }),
        };
        match self.orchestrator.open_click(click) {
            Ok(opened) => Response::success(id, json!({ "opened": opened })),
            Err(e) => Response::refused(id, &e),
        }
    }

    fn open_log(&self, id: Value, params: Value) -> Response {
        #[derive(Deserialize)]
        struct Params {
            #[serde(default = "default_log")]
            job: JobKind,
        }

        fn default_log() -> JobKind {
            JobKind::Sync
        }

        let job = if params.is_null() {
            default_log()
        } else {
            match serde_json::from_value::<Params>(params) {
                Ok(p) => p.job,
                Err(e) => return Response::invalid_params(id, e.to_string()),
            }
        };

        opened(id, self.orchestrator.open_log(job))
    }

    fn start_job(&self, id: Value, request: JobRequest) -> Response {
        let kind = request.kind;
        match self.orchestrator.spawn(request) {
            Ok(_) => Response::success(
                id,
                JobStarted {
                    started: true,
                    kind,
                    run: "spawned".to_string(),
                },
            ),
            Err(e) => Response::refused(id, &e),
        }
    }
}

#[derive(Deserialize, Default)]
struct ForceParam {
    #[serde(default)]
    force: bool,
}

/// Absent params mean all defaults.
fn parse_optional<T: DeserializeOwned + Default>(params: Value) -> serde_json::Result<T> {
    if params.is_null() {
        Ok(T::default())
    } else {
        serde_json::from_value(params)
    }
}

fn opened(id: Value, result: Result<PathBuf, CoordinatorError>) -> Response {
    match result {
        Ok(path) => Response::success(id, json!({ "opened": path })),
        Err(e) => Response::refused(id, &e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, NotificationChannelType};
    use crate::context::AppContext;
    use crate::rpc::protocol::{FEATURE_DISABLED, METHOD_NOT_FOUND};

    fn handler(dir: &std::path::Path) -> MethodHandler {
        let mut config = AppConfig::default();
        config.output_dir = dir.to_path_buf();
        config.notifications.channel = NotificationChannelType::None;
        MethodHandler::new(Orchestrator::new(AppContext::new(config)))
    }

    fn request(method: &str, params: Option<Value>) -> Request {
        Request {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
            id: Some(Value::Number(1.into())),
        }
    }

    #[tokio::test]
    async fn unknown_method_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let resp = handler(dir.path()).handle(request("jobs.list", None)).await;
        assert_eq!(resp.error.unwrap().code, METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn import_requires_feature_flag() {
        let dir = tempfile::tempdir().unwrap();
        let handler = handler(dir.path());

        let resp = handler.handle(request("import.now", None)).await;
        assert_eq!(resp.error.unwrap().code, FEATURE_DISABLED);

        let resp = handler.handle(request("import.reimport_all", None)).await;
        assert_eq!(resp.error.unwrap().code, FEATURE_DISABLED);
    }

    #[tokio::test]
    async fn sync_range_validates_params() {
        let dir = tempfile::tempdir().unwrap();
        let resp = handler(dir.path())
            .handle(request("sync.range", Some(json!({ "force": true }))))
            .await;
        assert_eq!(resp.error.unwrap().code, crate::rpc::protocol::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn status_reports_idle_guards() {
        let dir = tempfile::tempdir().unwrap();
        let resp = handler(dir.path()).handle(request("status.get", None)).await;
        let report: StatusReport = serde_json::from_value(resp.result.unwrap()).unwrap();
        assert!(!report.sync_running);
        assert!(!report.import_running);
        assert_eq!(report.snapshot.count, 0);
        assert_eq!(report.view.last_sync_line, "Last sync: Never");
    }

    #[tokio::test]
    async fn click_without_known_artifact_opens_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let resp = handler(dir.path())
            .handle(request("notification.click", None))
            .await;
        assert_eq!(resp.result.unwrap(), json!({ "opened": null }));
    }

    #[tokio::test]
    async fn click_outside_output_dir_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let other = tempfile::tempdir().unwrap();
        let outside = other.path().join("launch.md");
        std::fs::write(&outside, "x").unwrap();

        let resp = handler(dir.path())
            .handle(request(
                "notification.click",
                Some(json!({ "payload": outside })),
            ))
            .await;
        assert_eq!(resp.error.unwrap().code, crate::rpc::protocol::ACTION_FAILED);
    }
}
