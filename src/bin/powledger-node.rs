#![forbid(unsafe_code)]
//! Ledger node: serves the HTTP API over an in-memory chain.

use clap::Parser;
use colored::*;
use powledger::config::{load_config_from, DEFAULT_CONFIG_PATH};
use powledger::node::{init_tracing, Node};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,
    /// Address to bind, overriding the configuration
    #[arg(long)]
    host: Option<String>,
    /// Port to listen on, overriding the configuration
    #[arg(short, long)]
    port: Option<u16>,
    /// Start mining as soon as the node is up
    #[arg(long)]
    mine: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = load_config_from(&cli.config)?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if cli.mine {
        config.mining.autostart = true;
    }

    init_tracing(&config.logging.filter);

    println!("{}", "powledger node".bright_cyan().bold());
    println!("{}", "--------------".bright_cyan());
    println!("  listening on {}", config.bind_address().bright_white());
    println!();

    let node = Node::init(config);
    println!("  node id      {}", node.node_id.bright_yellow());
    node.start().await?;

    Ok(())
}
