use std::path::Path;
use std::time::Duration;

use log::warn;
use serde::{Deserialize, Serialize};

use super::RaftError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RaftConfig {
    pub node_id: String,
    pub address: String,            // host:port this node listens on
    pub peers: Vec<String>,         // peer addresses, never including `address`
    pub election_timeout_min: u64,  // in milliseconds
    pub election_timeout_max: u64,  // in milliseconds
    pub heartbeat_interval: u64,    // in milliseconds
    pub rpc_timeout: u64,           // in milliseconds, per connect and per line
    pub startup_delay: u64,         // in milliseconds
}

impl Default for RaftConfig {
    fn default() -> Self {
        Self::new("", "")
    }
}

impl RaftConfig {
    pub fn new(node_id: &str, address: &str) -> Self {
        Self {
            node_id: node_id.to_string(),
            address: address.to_string(),
            peers: Vec::new(),
            election_timeout_min: 150,
            election_timeout_max: 300,
            heartbeat_interval: 100,
            rpc_timeout: 100,
            startup_delay: 0,
        }
    }

    /// Reads a JSON config file. Missing fields take their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, RaftError> {
        let raw = std::fs::read_to_string(path)?;
        let mut config: RaftConfig = serde_json::from_str(&raw)?;
        let peers = std::mem::take(&mut config.peers);
        for peer in peers {
            config.add_peer(&peer);
        }
        Ok(config)
    }

    /// Adds a peer address. Our own address and duplicates are skipped.
    pub fn add_peer(&mut self, address: &str) {
        let address = address.trim();
        if address.is_empty() || address == self.address {
            return;
        }
        if !self.peers.iter().any(|p| p == address) {
            self.peers.push(address.to_string());
        }
    }

    /// Number of nodes, ourselves included.
    pub fn cluster_size(&self) -> usize {
        self.peers.len() + 1
    }

    pub fn election_timeout_range(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.election_timeout_min),
            Duration::from_millis(self.election_timeout_max),
        )
    }

    pub fn heartbeat_period(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout)
    }

    pub fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.startup_delay)
    }

    pub fn validate(&self) -> Result<(), RaftError> {
        if self.node_id.trim().is_empty() {
            return Err(RaftError::Config("node id is required".to_string()));
        }
        if self.address.trim().is_empty() {
            return Err(RaftError::Config("listen address is required".to_string()));
        }
        if self.election_timeout_min == 0 {
            return Err(RaftError::Config(
                "election_timeout_min must be positive".to_string(),
            ));
        }
        if self.election_timeout_min > self.election_timeout_max {
            return Err(RaftError::Config(format!(
                "election_timeout_min ({}) exceeds election_timeout_max ({})",
                self.election_timeout_min, self.election_timeout_max
            )));
        }
        if self.heartbeat_interval == 0 {
            return Err(RaftError::Config(
                "heartbeat_interval must be positive".to_string(),
            ));
        }
        // A canvass that outlives the election timeout can never win.
        if self.rpc_timeout == 0 || self.rpc_timeout >= self.election_timeout_min {
            return Err(RaftError::Config(format!(
                "rpc_timeout ({}) must be positive and below election_timeout_min ({})",
                self.rpc_timeout, self.election_timeout_min
            )));
        }
        if self.heartbeat_interval >= self.election_timeout_min {
            warn!(
                "heartbeat_interval ({}ms) is not below election_timeout_min ({}ms); followers may time out under a live leader",
                self.heartbeat_interval, self.election_timeout_min
            );
        }
        Ok(())
    }
}
