mod canvass;
mod config;
mod error;
mod heartbeat;
mod node;
mod state;
mod timer;

pub use self::canvass::{canvass, VoteTally};
pub use self::config::RaftConfig;
pub use self::error::RaftError;
pub use self::heartbeat::HeartbeatBroadcaster;
pub use self::node::{ElectionOutcome, ElectionRound, RaftNode, Vote};
pub use self::state::{NodeRole, NodeState};
pub use self::timer::{random_election_timeout, ElectionTimer, TimerExpiry};

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::network::{NetworkError, PeerClient, RaftServer};

/// A running election participant: the node behind one lock plus the tasks
/// that drive it.
#[derive(Clone)]
pub struct Raft {
    pub node: Arc<Mutex<RaftNode>>,
    client: PeerClient,
    rpc_timeout: Duration,
    expiry: Arc<Mutex<Option<TimerExpiry>>>,
    shutdown: CancellationToken,
}

impl Raft {
    pub fn new(config: RaftConfig) -> Result<Self, RaftError> {
        config.validate()?;
        let rpc_timeout = config.rpc_timeout();
        let (node, expiry) = RaftNode::new(config);
        let shutdown = node.shutdown_token();
        Ok(Self {
            node: Arc::new(Mutex::new(node)),
            client: PeerClient::new(rpc_timeout),
            rpc_timeout,
            expiry: Arc::new(Mutex::new(Some(expiry))),
            shutdown,
        })
    }

    pub async fn state(&self) -> NodeState {
        self.node.lock().await.state().clone()
    }

    pub async fn is_leader(&self) -> bool {
        self.node.lock().await.is_leader()
    }

    /// Arms the election timer and spawns the election loop.
    pub async fn start(&self) -> Result<(), RaftError> {
        let expiry = self
            .expiry
            .lock()
            .await
            .take()
            .ok_or(RaftError::AlreadyStarted)?;

        {
            let mut node = self.node.lock().await;
            let timeout = node.arm();
            info!(
                "Node {} started as follower with {} peers, first election timeout {:?}",
                node.id(),
                node.config().peers.len(),
                timeout
            );
        }

        let raft = self.clone();
        tokio::spawn(async move { raft.run_election_loop(expiry).await });
        Ok(())
    }

    /// Answers peer requests on `listener` until shutdown.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), NetworkError> {
        let server = RaftServer::new(Arc::clone(&self.node), self.rpc_timeout);
        server.serve(listener, self.shutdown.clone()).await
    }

    /// Stops the election loop, the accept loop and any heartbeat broadcaster.
    pub async fn shutdown(&self) {
        self.node.lock().await.shutdown();
    }

    async fn run_election_loop(self, mut expiry: TimerExpiry) {
        loop {
            let generation = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                fired = expiry.expired() => match fired {
                    Some(generation) => generation,
                    None => break,
                },
            };

            let round = self.node.lock().await.handle_election_timeout(generation);
            if let Some(round) = round {
                // Canvass off the loop so a slow round cannot hold back the next timeout.
                let raft = self.clone();
                tokio::spawn(async move { raft.run_election(round).await });
            }
        }
        debug!("Election loop stopped");
    }

    async fn run_election(&self, round: ElectionRound) {
        let tally = canvass(&self.client, &round).await;

        let (outcome, period) = {
            let mut node = self.node.lock().await;
            let outcome = node.finish_election(round.term, &tally);
            (outcome, node.config().heartbeat_period())
        };

        if let ElectionOutcome::Won { term, broadcaster } = outcome {
            let heartbeats = HeartbeatBroadcaster::new(
                self.client.clone(),
                round.candidate_id,
                term,
                round.peers,
                period,
            );
            tokio::spawn(heartbeats.run(broadcaster));
        }
    }
}
