//! Local control surface: JSON-RPC 2.0 over TCP.
//!
//! - `protocol`: request/response types, error codes and line framing
//! - `transport`: listener, one task per client
//! - `methods`: dispatch onto the [`Orchestrator`]
//! - `client`: used by the CLI subcommands

pub mod client;
pub mod methods;
pub mod protocol;
mod transport;

use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::core::Orchestrator;
use transport::ControlListener;

pub use client::RpcClient;
pub use methods::{DaemonStatus, JobStarted, MethodHandler, StatusReport};
pub use protocol::{Request, Response, RpcError};

/// Serves the control methods until [`RpcServer::shutdown`] is called.
pub struct RpcServer {
    listener: ControlListener,
    bind_addr: SocketAddr,
    shutdown: CancellationToken,
}

impl RpcServer {
    pub fn new(orchestrator: Orchestrator, bind_addr: SocketAddr) -> Self {
        Self {
            listener: ControlListener::new(MethodHandler::new(orchestrator)),
            bind_addr,
            shutdown: CancellationToken::new(),
        }
    }

    pub async fn start(&self) -> anyhow::Result<()> {
        self.listener
            .bind_and_serve(self.bind_addr, self.shutdown.clone())
            .await
    }

    /// Like [`RpcServer::start`] on a listener the caller bound.
    pub async fn serve(&self, listener: TcpListener) -> anyhow::Result<()> {
        self.listener.serve(listener, self.shutdown.clone()).await
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}
