pub mod check;
pub mod serve;
pub mod token;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use cipher_gate::config::Transport;

#[derive(Parser)]
#[command(name = "cipher-gate", version, about = "MCP gateway for tagged-value encryption")]
pub struct Cli {
    /// Path to the config file (default: ~/.cipher-gate/config.toml)
    #[arg(long, global = true, env = "CIPHER_GATE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the encrypt/decrypt tools over MCP
    Serve {
        /// Transport to serve on: stdio or http
        #[arg(long, value_parser = parse_transport)]
        transport: Option<Transport>,
        /// Address to bind for the http transport
        #[arg(long)]
        bind: Option<String>,
    },

    /// Mint a signed token with the configured signing key
    Token {
        /// Subject claim
        #[arg(long)]
        sub: Option<String>,
        /// Lifetime (e.g. 15m, 1h, 7d)
        #[arg(long, default_value = "1h")]
        ttl: String,
        /// Signing algorithm: HS256, HS384 or HS512
        #[arg(long, default_value = "HS256")]
        alg: String,
    },

    /// Validate the configuration and print a summary
    Check,
}

fn parse_transport(s: &str) -> Result<Transport, String> {
    s.parse().map_err(|e: cipher_gate::error::GateError| e.to_string())
}
