use std::time::Duration;

use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;

use super::timer::{ElectionTimer, TimerExpiry};
use super::{NodeRole, NodeState, RaftConfig, VoteTally};

/// Answer to a RequestVote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vote {
    Granted,
    Denied,
}

/// Everything the canvasser needs to solicit votes for one term, captured
/// while the node lock is held so the lock is not needed during I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElectionRound {
    pub term: u64,
    pub candidate_id: String,
    pub peers: Vec<String>,
}

#[derive(Debug)]
pub enum ElectionOutcome {
    /// Majority reached. The token stops the heartbeat broadcaster.
    Won {
        term: u64,
        broadcaster: CancellationToken,
    },
    Lost {
        term: u64,
    },
    /// The node moved on (new term or stepped down) while the canvass ran.
    Stale,
}

pub struct RaftNode {
    // Node identity
    id: String,
    config: RaftConfig,

    state: NodeState,
    timer: ElectionTimer,

    // Present only while leading; cancelled on step-down.
    heartbeat: Option<CancellationToken>,
    shutdown: CancellationToken,
}

impl RaftNode {
    pub fn new(config: RaftConfig) -> (Self, TimerExpiry) {
        let (min, max) = config.election_timeout_range();
        let (timer, expiry) = ElectionTimer::new(min, max);
        let node = Self {
            id: config.node_id.clone(),
            config,
            state: NodeState::default(),
            timer,
            heartbeat: None,
            shutdown: CancellationToken::new(),
        };
        (node, expiry)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &RaftConfig {
        &self.config
    }

    pub fn state(&self) -> &NodeState {
        &self.state
    }

    pub fn timer(&self) -> &ElectionTimer {
        &self.timer
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn is_leader(&self) -> bool {
        matches!(self.state.role, NodeRole::Leader)
    }

    /// Votes needed to win: a strict majority of peers plus ourselves.
    pub fn majority(&self) -> usize {
        self.config.cluster_size() / 2 + 1
    }

    /// Arms the election timer for the first time.
    pub fn arm(&mut self) -> Duration {
        self.timer.reset()
    }

    /// Called when the election timer fires. Returns the round to canvass if
    /// the firing is still current and we are not leading.
    pub fn handle_election_timeout(&mut self, generation: u64) -> Option<ElectionRound> {
        if !self.timer.is_current(generation) {
            debug!(
                "Ignoring stale election timer firing (generation {generation}, current {})",
                self.timer.generation()
            );
            return None;
        }
        if self.is_leader() {
            return None;
        }
        info!(
            "Election timeout elapsed as {}, starting election",
            self.state.role
        );
        self.start_election()
    }

    /// Becomes candidate for the next term. Returns `None` once the term space
    /// is exhausted; the timer is rearmed and nothing else changes.
    pub fn start_election(&mut self) -> Option<ElectionRound> {
        let Some(term) = self.state.current_term.checked_add(1) else {
            warn!(
                "Node {} cannot start an election past term {}",
                self.id, self.state.current_term
            );
            self.timer.reset();
            return None;
        };
        self.state.current_term = term;
        self.state.voted_for = Some(self.id.clone());
        self.state.leader_id = None;
        self.state.role = NodeRole::Candidate;
        if let Some(token) = self.heartbeat.take() {
            token.cancel();
        }

        let timeout = self.timer.reset();
        debug!(
            "Node {} is candidate for term {} (next timeout in {:?})",
            self.id, self.state.current_term, timeout
        );

        Some(ElectionRound {
            term: self.state.current_term,
            candidate_id: self.id.clone(),
            peers: self.config.peers.clone(),
        })
    }

    /// Applies a finished canvass for `term`.
    pub fn finish_election(&mut self, term: u64, tally: &VoteTally) -> ElectionOutcome {
        if self.shutdown.is_cancelled()
            || self.state.role != NodeRole::Candidate
            || self.state.current_term != term
        {
            debug!(
                "Discarding canvass result for term {term} ({} at term {})",
                self.state.role, self.state.current_term
            );
            return ElectionOutcome::Stale;
        }

        let votes = tally.total();
        if votes >= self.majority() {
            info!(
                "Node {} became leader for term {} with {} of {} votes",
                self.id,
                term,
                votes,
                self.config.cluster_size()
            );
            let broadcaster = self.become_leader();
            ElectionOutcome::Won { term, broadcaster }
        } else {
            info!(
                "Node {} failed to become leader for term {} with only {} votes ({} denied, {} unreachable)",
                self.id, term, votes, tally.denied, tally.unreachable
            );
            self.state.role = NodeRole::Follower;
            ElectionOutcome::Lost { term }
        }
    }

    fn become_leader(&mut self) -> CancellationToken {
        self.state.role = NodeRole::Leader;
        self.state.leader_id = Some(self.id.clone());
        // Leaders never time out on themselves.
        self.timer.disarm();

        let token = self.shutdown.child_token();
        if let Some(previous) = self.heartbeat.replace(token.clone()) {
            previous.cancel();
        }
        token
    }

    fn become_follower(&mut self) {
        if self.state.role != NodeRole::Follower {
            info!(
                "Node {} stepping down from {} at term {}",
                self.id, self.state.role, self.state.current_term
            );
        }
        self.state.role = NodeRole::Follower;
        if let Some(token) = self.heartbeat.take() {
            token.cancel();
        }
    }

    /// Adopts `term` if it is newer, clearing the vote and leader scoped to the old term.
    fn observe_term(&mut self, term: u64) {
        if term > self.state.current_term {
            self.state.current_term = term;
            self.state.voted_for = None;
            self.state.leader_id = None;
        }
    }

    pub fn handle_request_vote(&mut self, term: u64, candidate_id: &str) -> Vote {
        // Also denies a retry from the candidate we already voted for this term.
        if term <= self.state.current_term {
            debug!(
                "Denied vote for {candidate_id} in term {term} (current term {})",
                self.state.current_term
            );
            return Vote::Denied;
        }

        self.observe_term(term);

        let can_vote = match self.state.voted_for.as_deref() {
            None => true,
            Some(voted) => voted == candidate_id,
        };
        if !can_vote {
            return Vote::Denied;
        }

        self.state.voted_for = Some(candidate_id.to_string());
        self.become_follower();
        self.timer.reset();
        info!("Voted for {candidate_id} in term {term}");
        Vote::Granted
    }

    pub fn handle_heartbeat(&mut self, term: u64, leader_id: &str) {
        // A candidate never contests a term once any heartbeat arrives.
        if self.state.role == NodeRole::Candidate {
            self.become_follower();
        }

        if term < self.state.current_term {
            debug!(
                "Ignoring heartbeat from {leader_id} for stale term {term} (current term {})",
                self.state.current_term
            );
            return;
        }

        self.observe_term(term);
        if self.state.leader_id.as_deref() != Some(leader_id) {
            info!("Following {leader_id} in term {term}");
        }
        self.state.leader_id = Some(leader_id.to_string());
        self.become_follower();
        self.timer.reset();
    }

    /// Stops broadcasting and disarms the timer for good.
    pub fn shutdown(&mut self) {
        self.shutdown.cancel();
        self.heartbeat = None;
        self.timer.disarm();
    }
}
