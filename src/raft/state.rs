use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeRole {
    Follower,
    Candidate,
    Leader,
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeRole::Follower => write!(f, "follower"),
            NodeRole::Candidate => write!(f, "candidate"),
            NodeRole::Leader => write!(f, "leader"),
        }
    }
}

/// Election state of a node. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeState {
    pub current_term: u64,
    /// Scoped to `current_term`; cleared whenever the term advances.
    pub voted_for: Option<String>,
    pub role: NodeRole,
    pub leader_id: Option<String>,
}

impl Default for NodeState {
    fn default() -> Self {
        Self {
            current_term: 0,
            voted_for: None,
            role: NodeRole::Follower,
            leader_id: None,
        }
    }
}
