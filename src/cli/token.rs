use std::path::Path;

use anyhow::{anyhow, Result};
use secrecy::ExposeSecret;
use serde_json::{Map, Value};

use cipher_gate::auth::claims::Claims;
use cipher_gate::auth::token::{self, Algorithm};
use cipher_gate::config::Config;
use cipher_gate::session;

pub fn run(config_path: Option<&Path>, sub: Option<&str>, ttl: &str, alg: &str) -> Result<()> {
    let config = Config::resolve(config_path)?;
    let key = config
        .auth
        .signing_key
        .as_ref()
        .ok_or_else(|| anyhow!("No signing key configured. Set CIPHER_GATE_SIGNING_KEY."))?;
    let alg: Algorithm = alg.parse()?;
    let duration = session::parse_ttl(ttl)?;

    let now = chrono::Utc::now();
    let expires_at = now + duration;

    let mut claims = Map::new();
    claims.insert("iat".into(), Value::from(now.timestamp()));
    claims.insert("exp".into(), Value::from(expires_at.timestamp()));
    if let Some(sub) = sub {
        claims.insert("sub".into(), Value::from(sub));
    }
    if let Some(iss) = &config.auth.issuer {
        claims.insert("iss".into(), Value::from(iss.as_str()));
    }
    if let Some(aud) = &config.auth.audience {
        claims.insert("aud".into(), Value::from(aud.as_str()));
    }

    let token = token::sign(
        &Claims::from_map(claims),
        key.expose_secret().as_bytes(),
        alg,
    )?;

    // Print the token to stdout, details to stderr
    println!("{}", token);
    eprintln!("Token signed with {} (expires={})", alg, expires_at);
    Ok(())
}
