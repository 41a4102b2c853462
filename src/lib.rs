//! Raft-style leader election among a fixed set of peers.
//!
//! Nodes time out on randomized election deadlines, canvass their peers for
//! votes over a line-oriented TCP protocol, and the winner keeps followers in
//! line with periodic heartbeats. There is no log replication and nothing is
//! persisted.

pub mod network;
pub mod raft;

// Public exports
pub use network::{NetworkError, PeerClient, RaftServer, Request, Response};
pub use raft::{NodeRole, NodeState, Raft, RaftConfig, RaftError};
