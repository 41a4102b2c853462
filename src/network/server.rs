use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, warn};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

use crate::raft::{RaftNode, Vote};

use super::protocol::{Request, Response};
use super::NetworkError;

/// Longest request line accepted, newline included.
const MAX_LINE_LEN: u64 = 1024;

/// Pause after a failed accept so a persistent error (e.g. EMFILE) cannot spin the loop.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Accepts peer connections and routes each request line to the node.
#[derive(Clone)]
pub struct RaftServer {
    node: Arc<Mutex<RaftNode>>,
    read_timeout: Duration,
}

impl RaftServer {
    pub fn new(node: Arc<Mutex<RaftNode>>, read_timeout: Duration) -> Self {
        Self { node, read_timeout }
    }

    /// Classifies one request line and runs the matching handler.
    ///
    /// Returns `None` for lines that are not a valid request; those get no reply.
    pub async fn dispatch(&self, line: &str) -> Option<Response> {
        let request = match line.parse::<Request>() {
            Ok(request) => request,
            Err(e) => {
                warn!("Dropping request {:?}: {e}", line.trim_end());
                return None;
            }
        };
        debug!("Received {request}");

        let mut node = self.node.lock().await;
        let response = match request {
            Request::RequestVote { term, candidate_id } => {
                match node.handle_request_vote(term, &candidate_id) {
                    Vote::Granted => Response::Granted,
                    Vote::Denied => Response::Denied,
                }
            }
            Request::Heartbeat { term, leader_id } => {
                node.handle_heartbeat(term, &leader_id);
                Response::Ok
            }
        };
        Some(response)
    }

    /// Runs the accept loop until `shutdown` is cancelled.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: CancellationToken,
    ) -> Result<(), NetworkError> {
        loop {
            let accepted = tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = listener.accept() => accepted,
            };
            match accepted {
                Ok((stream, peer)) => {
                    let server = self.clone();
                    tokio::spawn(async move {
                        if let Err(e) = server.handle_connection(stream).await {
                            debug!("Connection from {peer} failed: {e}");
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {e}");
                    sleep(ACCEPT_BACKOFF).await;
                }
            }
        }
        Ok(())
    }

    async fn handle_connection(&self, stream: TcpStream) -> Result<(), NetworkError> {
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader).take(MAX_LINE_LEN);
        let mut line = String::new();

        let read = timeout(self.read_timeout, reader.read_line(&mut line))
            .await
            .map_err(|_| NetworkError::Timeout("reading request"))??;
        if read == 0 {
            return Err(NetworkError::ConnectionClosed);
        }
        if read as u64 == MAX_LINE_LEN && !line.ends_with('\n') {
            warn!("Dropping request longer than {MAX_LINE_LEN} bytes");
            return Ok(());
        }

        if let Some(response) = self.dispatch(&line).await {
            writer.write_all(format!("{response}\n").as_bytes()).await?;
            writer.shutdown().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raft::{NodeRole, RaftConfig};

    fn server() -> (RaftServer, Arc<Mutex<RaftNode>>) {
        let mut cfg = RaftConfig::new("n1", "127.0.0.1:7101");
        cfg.add_peer("127.0.0.1:7102");
        cfg.add_peer("127.0.0.1:7103");
        let (node, _expiry) = RaftNode::new(cfg);
        let node = Arc::new(Mutex::new(node));
        (
            RaftServer::new(Arc::clone(&node), Duration::from_millis(200)),
            node,
        )
    }

    #[tokio::test]
    async fn dispatches_vote_requests() {
        let (server, node) = server();

        assert_eq!(
            server.dispatch("request vote:1:n2\n").await,
            Some(Response::Granted)
        );
        assert_eq!(
            server.dispatch("request vote:1:n3\n").await,
            Some(Response::Denied)
        );
        assert_eq!(node.lock().await.state().voted_for.as_deref(), Some("n2"));
    }

    #[tokio::test]
    async fn dispatches_heartbeats() {
        let (server, node) = server();

        assert_eq!(server.dispatch("health:2:n3\n").await, Some(Response::Ok));

        let node = node.lock().await;
        assert_eq!(node.state().current_term, 2);
        assert_eq!(node.state().leader_id.as_deref(), Some("n3"));
        assert_eq!(node.state().role, NodeRole::Follower);
    }

    #[tokio::test]
    async fn stale_heartbeat_is_still_acknowledged() {
        let (server, node) = server();
        server.dispatch("health:5:n3\n").await;

        assert_eq!(server.dispatch("health:1:n2\n").await, Some(Response::Ok));
        assert_eq!(node.lock().await.state().leader_id.as_deref(), Some("n3"));
    }

    #[tokio::test]
    async fn unknown_and_malformed_lines_get_no_reply() {
        let (server, node) = server();

        assert_eq!(server.dispatch("append entries:1:n2\n").await, None);
        assert_eq!(server.dispatch("request vote:x:n2\n").await, None);
        assert_eq!(server.dispatch("health:3\n").await, None);
        assert_eq!(node.lock().await.state().current_term, 0);
    }

    #[tokio::test]
    async fn overlong_lines_are_dropped() {
        let (server, node) = server();
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local_addr");
        let shutdown = CancellationToken::new();
        tokio::spawn(server.serve(listener, shutdown.clone()));

        // Still a well-formed heartbeat if it were cut at the limit.
        let line = format!("health:4:{}\n", "a".repeat(2 * MAX_LINE_LEN as usize));
        let mut stream = TcpStream::connect(addr).await.expect("connect");
        stream.write_all(line.as_bytes()).await.expect("write");
        let mut reply = String::new();
        // The node may reset the connection over the unread tail.
        let _ = timeout(Duration::from_secs(1), stream.read_to_string(&mut reply))
            .await
            .expect("node should close the connection");

        assert_eq!(reply, "");
        assert_eq!(node.lock().await.state().current_term, 0);
        shutdown.cancel();
    }

    #[tokio::test]
    async fn line_at_the_limit_is_served() {
        let (server, node) = server();
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local_addr");
        let shutdown = CancellationToken::new();
        tokio::spawn(server.serve(listener, shutdown.clone()));

        let prefix = "health:4:";
        let id = "b".repeat(MAX_LINE_LEN as usize - prefix.len() - 1);
        let mut stream = TcpStream::connect(addr).await.expect("connect");
        stream
            .write_all(format!("{prefix}{id}\n").as_bytes())
            .await
            .expect("write");
        let mut reply = String::new();
        timeout(Duration::from_secs(1), stream.read_to_string(&mut reply))
            .await
            .expect("node should close the connection")
            .expect("read");

        assert_eq!(reply, "OK\n");
        assert_eq!(node.lock().await.state().leader_id.as_deref(), Some(id.as_str()));
        shutdown.cancel();
    }

    #[tokio::test]
    async fn serve_answers_over_tcp_and_stops_on_shutdown() {
        let (server, _node) = server();
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local_addr");
        let shutdown = CancellationToken::new();
        let serving = tokio::spawn(server.serve(listener, shutdown.clone()));

        let stream = TcpStream::connect(addr).await.expect("connect");
        let (reader, mut writer) = stream.into_split();
        writer
            .write_all(b"request vote:3:n2\n")
            .await
            .expect("write");
        let mut reply = String::new();
        BufReader::new(reader)
            .read_line(&mut reply)
            .await
            .expect("read");
        assert_eq!(reply, "granted\n");

        shutdown.cancel();
        timeout(Duration::from_secs(1), serving)
            .await
            .expect("server should stop")
            .expect("server task")
            .expect("serve result");
    }
}
