//! Command line surface: `tomcast [OPTIONS] <IDENTITY> [PEER]...`.

use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{ArgAction, Parser};

use crate::Result;
use crate::config::Config;
use crate::daemon::{EngineStats, Node, NodeConfig, StdoutSink};

#[derive(Parser, Debug)]
#[command(
    name = "tomcast",
    version,
    about = "Total-order multicast peer",
    infer_long_args = true
)]
pub struct Cli {
    /// This node's address as the other peers know it (`host` or `host:port`).
    #[arg(value_name = "IDENTITY")]
    pub identity: String,

    /// The other peers. Replaces any peers from config.
    #[arg(value_name = "PEER")]
    pub peers: Vec<String>,

    /// Config file (default: `$XDG_CONFIG_HOME/tomcast/config.toml`).
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Address to accept peer connections on (default: IDENTITY).
    #[arg(long, value_name = "ADDR")]
    pub listen: Option<String>,

    /// Mean originated messages per second.
    #[arg(long)]
    pub rate: Option<f64>,

    /// Connection attempts per send before a peer is dropped.
    #[arg(long, value_name = "N")]
    pub max_attempts: Option<u32>,

    /// Seed for delays and word choice.
    #[arg(long)]
    pub seed: Option<u64>,

    /// More logging (repeat for more).
    #[arg(short = 'v', long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Command line values win over file and environment.
    pub fn apply_to(&self, config: &mut Config) {
        config.node.identity = Some(self.identity.clone());
        if !self.peers.is_empty() {
            config.node.peers = self.peers.clone();
        }
        if let Some(listen) = &self.listen {
            config.node.listen_addr = Some(listen.clone());
        }
        if let Some(rate) = self.rate {
            config.engine.rate = rate;
        }
        if let Some(max_attempts) = self.max_attempts {
            config.retry.max_attempts = max_attempts;
        }
        if let Some(seed) = self.seed {
            config.engine.seed = Some(seed);
        }
    }
}

pub fn parse_from<I, T>(args: I) -> Cli
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    Cli::parse_from(args)
}

/// Start a node printing deliveries to stdout and run it until interrupted.
pub fn run(config: &Config) -> Result<EngineStats> {
    let node_config = NodeConfig::from_config(config)?;
    let node = Node::start(node_config, Arc::new(StdoutSink))?;
    Ok(node.run_until_interrupted())
}
