//! Client side of the control socket, used by the CLI subcommands.

use std::net::SocketAddr;

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use super::protocol::{Request, Response, RpcError, encode_line};

pub struct RpcClient {
    addr: SocketAddr,
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Failed to connect to daemon at {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("Communication error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize request: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("Failed to parse response: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("Daemon closed the connection without answering")]
    Closed,

    #[error("{}", .0.message)]
    Rpc(RpcError),
}

impl ClientError {
    /// Application error code when the daemon refused the call.
    pub fn rpc_code(&self) -> Option<i32> {
        match self {
            ClientError::Rpc(e) => Some(e.code),
            _ => None,
        }
    }
}

impl RpcClient {
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }

    /// One request per connection.
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<T, ClientError> {
        let mut stream = TcpStream::connect(self.addr)
            .await
            .map_err(|source| ClientError::Connect {
                addr: self.addr,
                source,
            })?;

        let request = Request::call(method, params);
        let frame = encode_line(&request).map_err(ClientError::Serialize)?;
        stream.write_all(frame.as_bytes()).await?;

        let mut reader = BufReader::new(stream);
        let mut response_line = String::new();
        if reader.read_line(&mut response_line).await? == 0 {
            return Err(ClientError::Closed);
        }

        let response: Response =
            serde_json::from_str(&response_line).map_err(ClientError::Parse)?;
        let result = response.into_result().map_err(ClientError::Rpc)?;
        serde_json::from_value(result).map_err(ClientError::Parse)
    }

    pub async fn call_no_params<T: DeserializeOwned>(
        &self,
        method: &str,
    ) -> Result<T, ClientError> {
        self.call(method, None).await
    }
}
