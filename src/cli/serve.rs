use std::io;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use cipher_gate::api::Gateway;
use cipher_gate::cipher::HttpCipherService;
use cipher_gate::config::{Config, Transport};
use cipher_gate::mcp::{http, McpServer};

pub fn run(config_path: Option<&Path>, transport: Option<Transport>, bind: Option<String>) -> Result<()> {
    let mut config = Config::resolve(config_path)?;
    if let Some(t) = transport {
        config.server.transport = t;
    }
    if let Some(b) = bind {
        config.server.bind = b;
    }
    config.validate()?;

    if config.auth.mode.is_unenforced() {
        tracing::warn!(
            mode = %config.auth.mode,
            "authorization is not enforced; use dual or strict outside local use"
        );
    }

    let cipher = HttpCipherService::from_config(&config.cipher)?;
    tracing::info!(base_url = cipher.base_url(), "cipher service configured");

    let gateway = Arc::new(Gateway::from_config(&config, Arc::new(cipher))?);
    let server = Arc::new(McpServer::new(gateway));
    tracing::info!(
        transport = %config.server.transport,
        mode = %server.gateway().verifier().mode(),
        "serving"
    );

    match config.server.transport {
        Transport::Stdio => {
            let stdin = io::stdin().lock();
            let stdout = io::stdout().lock();
            server.run(stdin, stdout)?;
        }
        Transport::Http => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("building tokio runtime")?;
            let result = runtime.block_on(http::serve(server.clone(), &config));
            // The blocking cipher client must be dropped outside the runtime.
            drop(runtime);
            result?;
        }
    }

    Ok(())
}
