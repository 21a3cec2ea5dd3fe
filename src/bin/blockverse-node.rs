#![forbid(unsafe_code)]
//! Runs a Blockverse node.

use blockverse::config::load_config;
use blockverse::node::{init_logging, Node};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,
    /// Address to listen on, overrides network.listen_addr
    #[arg(long)]
    listen: Option<String>,
    /// Peer to dial at startup; may be repeated
    #[arg(long = "bootstrap")]
    bootstrap: Vec<String>,
    /// Run the block producer
    #[arg(long)]
    validator: bool,
    /// Hex-encoded validator secret key
    #[arg(long)]
    secret_key: Option<String>,
    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = load_config(Some(cli.config.as_path()))?;
    if let Some(listen) = cli.listen {
        config.network.listen_addr = listen;
    }
    if !cli.bootstrap.is_empty() {
        config.network.bootstrap_peers = cli.bootstrap;
    }
    if cli.validator {
        config.validator.enabled = true;
    }
    if cli.secret_key.is_some() {
        config.validator.secret_key = cli.secret_key;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    config.validate()?;

    init_logging(&config.logging.level);

    let node = Arc::new(Node::init(config)?);
    node.start().await?;
    Ok(())
}
