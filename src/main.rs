use std::fs::OpenOptions;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use log::info;
use tokio::net::TcpListener;
use tokio::time::sleep;

use raft_election::raft::{Raft, RaftConfig, RaftError};

fn init_logging() {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));

    // When RAFT_LOG_FILE is set, logs are appended to that file instead of stderr.
    if let Ok(path) = std::env::var("RAFT_LOG_FILE") {
        match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => {
                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
            Err(e) => eprintln!("Cannot open log file {path}: {e}; logging to stderr"),
        }
    }

    builder.init();
}

#[derive(Parser)]
#[command(name = "raft-election")]
#[command(about = "A leader election node for a fixed cluster of peers")]
struct Cli {
    /// JSON config file; flags given here override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Identifier this node announces in votes and heartbeats
    #[arg(short, long, alias = "server-name")]
    id: Option<String>,

    /// Address to listen on, e.g. 127.0.0.1:8001
    #[arg(short, long)]
    address: Option<String>,

    /// Comma-separated list of peer addresses (our own address is ignored)
    #[arg(short, long, value_delimiter = ',')]
    peers: Vec<String>,

    /// Lower bound of the randomized election timeout, in milliseconds
    #[arg(long)]
    election_timeout_min: Option<u64>,

    /// Upper bound of the randomized election timeout, in milliseconds
    #[arg(long)]
    election_timeout_max: Option<u64>,

    /// Interval between leader heartbeats, in milliseconds
    #[arg(long)]
    heartbeat_interval: Option<u64>,

    /// Connect and read/write timeout for peer exchanges, in milliseconds
    #[arg(long)]
    rpc_timeout: Option<u64>,

    /// Delay before listening and arming the election timer, in milliseconds
    #[arg(long)]
    startup_delay: Option<u64>,
}

impl Cli {
    fn into_config(self) -> Result<RaftConfig, RaftError> {
        let mut config = match &self.config {
            Some(path) => RaftConfig::from_file(path)?,
            None => RaftConfig::default(),
        };

        if let Some(id) = self.id {
            config.node_id = id;
        }
        if let Some(address) = self.address {
            config.address = address;
        }
        if let Some(ms) = self.election_timeout_min {
            config.election_timeout_min = ms;
        }
        if let Some(ms) = self.election_timeout_max {
            config.election_timeout_max = ms;
        }
        if let Some(ms) = self.heartbeat_interval {
            config.heartbeat_interval = ms;
        }
        if let Some(ms) = self.rpc_timeout {
            config.rpc_timeout = ms;
        }
        if let Some(ms) = self.startup_delay {
            config.startup_delay = ms;
        }

        // Re-add every peer so the final listen address is filtered out.
        let peers = if self.peers.is_empty() {
            std::mem::take(&mut config.peers)
        } else {
            config.peers.clear();
            self.peers
        };
        for peer in &peers {
            config.add_peer(peer);
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let cli = Cli::parse();
    let config = cli
        .into_config()
        .context("refusing to start with invalid configuration")?;

    info!(
        "Starting node {} at {} with peers [{}]",
        config.node_id,
        config.address,
        config.peers.join(", ")
    );

    // Stagger startup so nodes launched together are listening before anyone times out.
    let delay = config.startup_delay();
    if !delay.is_zero() {
        info!("Waiting {delay:?} before joining the cluster");
        sleep(delay).await;
    }

    let listener = TcpListener::bind(&config.address)
        .await
        .with_context(|| format!("failed to listen on {}", config.address))?;

    let raft = Raft::new(config)?;
    raft.start().await?;

    tokio::select! {
        served = raft.serve(listener) => served?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl-C, shutting down");
            raft.shutdown().await;
        }
    }

    Ok(())
}
