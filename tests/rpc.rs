mod common;

use std::sync::Arc;

use breakfastd::core::JobKind;
use breakfastd::rpc::protocol::{ALREADY_RUNNING, FEATURE_DISABLED};
use breakfastd::rpc::{JobStarted, RpcClient, RpcServer, StatusReport};
use common::{FakeRunner, eventually, orchestrator, test_config};
use serde_json::json;
use tokio::net::TcpListener;

#[tokio::test]
async fn job_methods_report_admission() {
    let dir = tempfile::tempdir().unwrap();
    let (sync, gate) = FakeRunner::gated("2 exported");
    let sync = Arc::new(sync);
    let (orch, notifier) = orchestrator(
        test_config(dir.path()),
        sync.clone(),
        Arc::new(FakeRunner::immediate("Nothing to import")),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = Arc::new(RpcServer::new(orch.clone(), addr));
    let serving = {
        let server = server.clone();
        tokio::spawn(async move { server.serve(listener).await })
    };

    let client = RpcClient::new(addr);

    let started: JobStarted = client
        .call("sync.range", Some(json!({ "days": 3, "force": true })))
        .await
        .unwrap();
    assert!(started.started);
    assert_eq!(started.kind, JobKind::Sync);
    assert_eq!(started.run, "spawned");

    let status: StatusReport = client.call_no_params("status.get").await.unwrap();
    assert!(status.sync_running);
    assert!(!status.import_running);

    let err = client
        .call_no_params::<JobStarted>("sync.now")
        .await
        .unwrap_err();
    assert_eq!(err.rpc_code(), Some(ALREADY_RUNNING));
    assert!(eventually(|| notifier.events().len() == 1).await);

    let err = client
        .call_no_params::<JobStarted>("import.now")
        .await
        .unwrap_err();
    assert_eq!(err.rpc_code(), Some(FEATURE_DISABLED));

    gate.add_permits(1);
    assert!(eventually(|| !orch.context().guard.is_busy(JobKind::Sync)).await);
    assert_eq!(sync.calls(), 1);

    let status: StatusReport = client.call_no_params("status.get").await.unwrap();
    assert!(!status.sync_running);
    assert!(status.snapshot.last_run.is_some());

    server.shutdown();
    serving.await.unwrap().unwrap();
}

#[tokio::test]
async fn open_folder_returns_path() {
    let dir = tempfile::tempdir().unwrap();
    let (orch, _notifier) = orchestrator(
        test_config(dir.path()),
        Arc::new(FakeRunner::immediate("Sync completed")),
        Arc::new(FakeRunner::immediate("Nothing to import")),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = Arc::new(RpcServer::new(orch, addr));
    let serving = {
        let server = server.clone();
        tokio::spawn(async move { server.serve(listener).await })
    };

    let client = RpcClient::new(addr);
    let opened: serde_json::Value = client.call_no_params("open.folder").await.unwrap();
    assert_eq!(opened["opened"], json!(dir.path()));

    server.shutdown();
    serving.await.unwrap().unwrap();
}
