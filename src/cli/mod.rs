//! Client-side subcommands. Each one is a single RPC call to the running daemon.

use std::fmt::Write as _;
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::core::models::{JobKind, WEEK_DAYS};
use crate::rpc::protocol::{ALREADY_RUNNING, FEATURE_DISABLED};
use crate::rpc::{DaemonStatus, JobStarted, RpcClient, StatusReport};

/// What to open through the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OpenTarget {
    Folder,
    Vault,
    Log,
    ImportLog,
}

#[derive(Debug, Deserialize)]
struct Opened {
    opened: Option<PathBuf>,
}

pub struct ControlClient {
    client: RpcClient,
}

impl ControlClient {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            client: RpcClient::new(addr),
        }
    }

    pub async fn status(&self) -> Result<String> {
        let daemon: DaemonStatus = self
            .client
            .call_no_params("daemon.status")
            .await
            .context("Failed to reach daemon")?;
        let report: StatusReport = self.client.call_no_params("status.get").await?;
        Ok(render_status(&daemon, &report))
    }

    pub async fn sync(&self, days: Option<u32>, force: bool) -> Result<String> {
        let (method, params) = sync_call(days, force);
        let result = self.client.call::<JobStarted>(method, params).await;
        job_reply(JobKind::Sync, result)
    }

    /// The menu's "sync last week": always forced.
    pub async fn sync_week(&self) -> Result<String> {
        self.sync(Some(WEEK_DAYS), true).await
    }

    pub async fn import(&self, force: bool) -> Result<String> {
        let result = self
            .client
            .call::<JobStarted>("import.now", Some(json!({ "force": force })))
            .await;
        job_reply(JobKind::Import, result)
    }

    pub async fn reimport_all(&self) -> Result<String> {
        match self.client.call::<Value>("import.reimport_all", None).await {
            Ok(_) => Ok("Reimport handed to the agent".to_string()),
            Err(e) if e.rpc_code() == Some(FEATURE_DISABLED) => {
                Ok("Import is disabled in the configuration".to_string())
            }
            Err(e) => Err(e).context("Reimport failed"),
        }
    }

    pub async fn open(&self, target: OpenTarget) -> Result<String> {
        let (method, params) = match target {
            OpenTarget::Folder => ("open.folder", None),
            OpenTarget::Vault => ("open.vault", None),
            OpenTarget::Log => ("open.log", Some(json!({ "job": JobKind::Sync }))),
            OpenTarget::ImportLog => ("open.log", Some(json!({ "job": JobKind::Import }))),
        };
        let opened: Opened = self
            .client
            .call(method, params)
            .await
            .with_context(|| format!("{} failed", method))?;
        Ok(describe_opened(opened.opened))
    }

    pub async fn click(&self, payload: Option<PathBuf>) -> Result<String> {
        let params = payload.map(|path| json!({ "payload": path }));
        let opened: Opened = self
            .client
            .call("notification.click", params)
            .await
            .context("Failed to open note")?;
        Ok(describe_opened(opened.opened))
    }
}

fn sync_call(days: Option<u32>, force: bool) -> (&'static str, Option<Value>) {
    match days {
        Some(days) => ("sync.range", Some(json!({ "days": days, "force": force }))),
        None if force => ("sync.now", Some(json!({ "force": true }))),
        None => ("sync.now", None),
    }
}

fn describe_opened(path: Option<PathBuf>) -> String {
    match path {
        Some(path) => format!("Opened {}", path.display()),
        None => "Nothing to open".to_string(),
    }
}

fn job_reply(kind: JobKind, result: Result<JobStarted, crate::rpc::client::ClientError>) -> Result<String> {
    match result {
        Ok(started) => Ok(format!("{} started", started.kind.title())),
        Err(e) => match e.rpc_code() {
            Some(ALREADY_RUNNING) => Ok(format!("{} already in progress", kind.title())),
            Some(FEATURE_DISABLED) => Ok("Import is disabled in the configuration".to_string()),
            _ => Err(e).with_context(|| format!("Failed to start {}", kind)),
        },
    }
}

/// Menu-style rendering of the daemon state.
pub fn render_status(daemon: &DaemonStatus, report: &StatusReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "breakfastd {} (up {}s)", daemon.version, daemon.uptime_secs);
    let _ = writeln!(out, "{}", report.view.status_line);
    let _ = writeln!(out, "{}", report.view.last_sync_line);

    let mut running = Vec::new();
    if report.sync_running {
        running.push("sync");
    }
    if report.import_running {
        running.push("import");
    }
    if !running.is_empty() {
        let _ = writeln!(out, "Running: {}", running.join(", "));
    }

    if !report.view.recent.is_empty() {
        let _ = writeln!(out, "Recent:");
        for entry in &report.view.recent {
            let _ = writeln!(out, "  {}", entry.label);
        }
    }
    out
}
