mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

fn main() {
    // Logs go to stderr; stdout is the stdio transport's channel.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config.as_deref();

    let result = match &cli.command {
        Commands::Serve { transport, bind } => cli::serve::run(config, *transport, bind.clone()),

        Commands::Token { sub, ttl, alg } => cli::token::run(config, sub.as_deref(), ttl, alg),

        Commands::Check => cli::check::run(config),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
