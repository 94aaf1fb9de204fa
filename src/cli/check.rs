use std::path::Path;

use anyhow::Result;

use cipher_gate::config::{Config, Transport};

pub fn run(config_path: Option<&Path>) -> Result<()> {
    let config = Config::resolve(config_path)?;

    println!("auth.mode:        {}", config.auth.mode);
    println!(
        "auth.signing_key: {}",
        if config.auth.signing_key.is_some() { "set" } else { "-" }
    );
    println!(
        "auth.shared:      {}",
        if config.auth.shared_secret.is_some() { "set" } else { "-" }
    );
    println!("auth.issuer:      {}", config.auth.issuer.as_deref().unwrap_or("-"));
    println!("auth.audience:    {}", config.auth.audience.as_deref().unwrap_or("-"));
    println!("server.transport: {}", config.server.transport);
    if config.server.transport == Transport::Http {
        println!("server.bind:      {}", config.server.bind);
    }
    println!(
        "cipher.base_url:  {}",
        config.cipher.base_url.as_deref().unwrap_or("-")
    );
    println!(
        "session.idle:     {}",
        config.session.idle_timeout.as_deref().unwrap_or("never")
    );

    if config.cipher.base_url.is_none() {
        eprintln!("Warning: cipher.base_url is not set; `serve` will refuse to start.");
    }
    Ok(())
}
