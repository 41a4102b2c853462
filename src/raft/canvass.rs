use log::{debug, warn};
use tokio::task::JoinSet;

use crate::network::PeerClient;

use super::ElectionRound;

/// Result of soliciting votes from every peer for one term.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VoteTally {
    pub granted: usize,
    pub denied: usize,
    pub unreachable: usize,
}

impl VoteTally {
    /// Votes in favour, counting our own.
    pub fn total(&self) -> usize {
        self.granted + 1
    }
}

/// Requests a vote from every peer concurrently and waits for all of them.
///
/// Peers that cannot be reached or answer with garbage simply do not vote.
/// There is no early exit on majority: one slow peer holds the result back
/// for up to the client's RPC timeout.
pub async fn canvass(client: &PeerClient, round: &ElectionRound) -> VoteTally {
    let mut requests = JoinSet::new();
    for peer in &round.peers {
        let client = client.clone();
        let peer = peer.clone();
        let candidate_id = round.candidate_id.clone();
        let term = round.term;
        requests.spawn(async move {
            let result = client.request_vote(&peer, term, &candidate_id).await;
            (peer, result)
        });
    }

    let mut tally = VoteTally::default();
    while let Some(joined) = requests.join_next().await {
        match joined {
            Ok((peer, Ok(true))) => {
                debug!("{peer} granted its vote for term {}", round.term);
                tally.granted += 1;
            }
            Ok((peer, Ok(false))) => {
                debug!("{peer} denied its vote for term {}", round.term);
                tally.denied += 1;
            }
            Ok((peer, Err(e))) => {
                debug!("Failed to request vote from {peer}: {e}");
                tally.unreachable += 1;
            }
            Err(e) => {
                warn!("Vote request task failed: {e}");
                tally.unreachable += 1;
            }
        }
    }
    tally
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    /// A peer that answers every vote request with `reply`.
    async fn voter(reply: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local_addr").to_string();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let (reader, mut writer) = stream.into_split();
                let mut line = String::new();
                let _ = BufReader::new(reader).read_line(&mut line).await;
                let _ = writer.write_all(reply.as_bytes()).await;
            }
        });
        addr
    }

    async fn dead_peer() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local_addr").to_string();
        drop(listener);
        addr
    }

    fn round(peers: Vec<String>) -> ElectionRound {
        ElectionRound {
            term: 1,
            candidate_id: "n1".to_string(),
            peers,
        }
    }

    #[test]
    fn total_counts_self_vote() {
        assert_eq!(VoteTally::default().total(), 1);
        let tally = VoteTally {
            granted: 2,
            denied: 1,
            unreachable: 1,
        };
        assert_eq!(tally.total(), 3);
    }

    #[tokio::test]
    async fn tallies_grants_denials_and_failures() {
        let peers = vec![
            voter("granted\n").await,
            voter("granted\n").await,
            voter("denied\n").await,
            dead_peer().await,
        ];
        let client = PeerClient::new(Duration::from_millis(200));

        let tally = canvass(&client, &round(peers)).await;

        assert_eq!(
            tally,
            VoteTally {
                granted: 2,
                denied: 1,
                unreachable: 1
            }
        );
        assert_eq!(tally.total(), 3);
    }

    #[tokio::test]
    async fn garbage_reply_counts_as_no_vote() {
        let peers = vec![voter("maybe\n").await, voter("OK\n").await];
        let client = PeerClient::new(Duration::from_millis(200));

        let tally = canvass(&client, &round(peers)).await;

        assert_eq!(tally.granted, 0);
        assert_eq!(tally.unreachable, 2);
    }

    #[tokio::test]
    async fn no_peers_means_only_self() {
        let client = PeerClient::new(Duration::from_millis(200));
        let tally = canvass(&client, &round(Vec::new())).await;
        assert_eq!(tally.total(), 1);
    }
}
