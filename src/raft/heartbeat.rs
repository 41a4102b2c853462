use std::time::Duration;

use log::{debug, info};
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::network::PeerClient;

/// Tells every peer who leads `term`, once per period, until cancelled.
pub struct HeartbeatBroadcaster {
    client: PeerClient,
    leader_id: String,
    term: u64,
    peers: Vec<String>,
    period: Duration,
}

impl HeartbeatBroadcaster {
    pub fn new(
        client: PeerClient,
        leader_id: String,
        term: u64,
        peers: Vec<String>,
        period: Duration,
    ) -> Self {
        Self {
            client,
            leader_id,
            term,
            peers,
            period,
        }
    }

    /// Broadcasts immediately and then every period. Sends are fire-and-forget:
    /// a failed heartbeat is not retried, the next round tries again.
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => self.broadcast(),
            }
        }
        info!(
            "Stopped heartbeats for term {} as {}",
            self.term, self.leader_id
        );
    }

    fn broadcast(&self) {
        for peer in &self.peers {
            let client = self.client.clone();
            let peer = peer.clone();
            let leader_id = self.leader_id.clone();
            let term = self.term;
            tokio::spawn(async move {
                if let Err(e) = client.send_heartbeat(&peer, term, &leader_id).await {
                    debug!("Heartbeat to {peer} failed: {e}");
                }
            });
        }
    }
}
