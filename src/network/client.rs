use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;

use super::protocol::{Request, Response};
use super::NetworkError;

/// Dials peers for single request/response exchanges.
///
/// Each call opens a fresh connection. `rpc_timeout` bounds the connect and
/// each of the write and read steps separately.
#[derive(Debug, Clone)]
pub struct PeerClient {
    rpc_timeout: Duration,
}

impl PeerClient {
    pub fn new(rpc_timeout: Duration) -> Self {
        Self { rpc_timeout }
    }

    pub async fn call(&self, address: &str, request: &Request) -> Result<Response, NetworkError> {
        let stream = timeout(self.rpc_timeout, TcpStream::connect(address))
            .await
            .map_err(|_| NetworkError::Timeout("connecting"))??;
        let (reader, mut writer) = stream.into_split();

        let line = format!("{request}\n");
        timeout(self.rpc_timeout, writer.write_all(line.as_bytes()))
            .await
            .map_err(|_| NetworkError::Timeout("sending request"))??;

        let mut reader = BufReader::new(reader);
        let mut reply = String::new();
        let read = timeout(self.rpc_timeout, reader.read_line(&mut reply))
            .await
            .map_err(|_| NetworkError::Timeout("waiting for response"))??;
        if read == 0 {
            return Err(NetworkError::ConnectionClosed);
        }

        Ok(reply.parse::<Response>()?)
    }

    /// Asks `address` for its vote. `Ok(true)` means granted.
    pub async fn request_vote(
        &self,
        address: &str,
        term: u64,
        candidate_id: &str,
    ) -> Result<bool, NetworkError> {
        let request = Request::RequestVote {
            term,
            candidate_id: candidate_id.to_string(),
        };
        match self.call(address, &request).await? {
            Response::Granted => Ok(true),
            Response::Denied => Ok(false),
            other => Err(NetworkError::UnexpectedResponse(other)),
        }
    }

    pub async fn send_heartbeat(
        &self,
        address: &str,
        term: u64,
        leader_id: &str,
    ) -> Result<(), NetworkError> {
        let request = Request::Heartbeat {
            term,
            leader_id: leader_id.to_string(),
        };
        match self.call(address, &request).await? {
            Response::Ok => Ok(()),
            other => Err(NetworkError::UnexpectedResponse(other)),
        }
    }
}
