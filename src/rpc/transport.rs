//! Control socket listener. Each client gets its own task; each line it sends
//! is one request and gets at most one line back.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, debug_span, error, info, warn};

use super::methods::MethodHandler;
use super::protocol::{Request, Response, encode_line};

pub struct ControlListener {
    handler: Arc<MethodHandler>,
}

impl ControlListener {
    pub fn new(handler: MethodHandler) -> Self {
        Self {
            handler: Arc::new(handler),
        }
    }

    pub async fn bind_and_serve(
        &self,
        addr: SocketAddr,
        shutdown: CancellationToken,
    ) -> anyhow::Result<()> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind control socket on {}", addr))?;
        self.serve(listener, shutdown).await
    }

    /// Accept clients until `shutdown` fires. Open connections are closed
    /// after their current request.
    pub async fn serve(
        &self,
        listener: TcpListener,
        shutdown: CancellationToken,
    ) -> anyhow::Result<()> {
        info!(addr = %listener.local_addr()?, "Control socket listening");

        loop {
            let (stream, peer) = tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok(client) => client,
                    Err(e) => {
                        error!(error = %e, "Failed to accept control client");
                        continue;
                    }
                },
                _ = shutdown.cancelled() => break,
            };

            let handler = self.handler.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(
                async move {
                    if let Err(e) = serve_client(stream, &handler, shutdown).await {
                        debug!(error = %e, "Control client dropped");
                    }
                }
                .instrument(debug_span!("client", %peer)),
            );
        }

        info!("Control socket closed");
        Ok(())
    }
}

async fn serve_client(
    stream: TcpStream,
    handler: &MethodHandler,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = shutdown.cancelled() => break,
        };
        let Some(line) = line else { break };

        if let Some(reply) = respond(handler, &line).await {
            writer.write_all(encode_line(&reply)?.as_bytes()).await?;
        }
    }
    Ok(())
}

/// Reply owed for one line of input, if any.
async fn respond(handler: &MethodHandler, line: &str) -> Option<Response> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let request = match Request::decode(line) {
        Ok(request) => request,
        Err(reply) => {
            warn!(line = %line, "Rejected malformed control request");
            return Some(reply);
        }
    };

    debug!(method = %request.method, "Control request");
    if request.is_notification() {
        handler.handle(request).await;
        return None;
    }
    Some(handler.handle(request).await)
}
