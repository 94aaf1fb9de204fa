use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::auth::AuthMode;
use crate::error::{GateError, Result};
use crate::session;
use crate::types::*;

pub const CONFIG_ENV: &str = "CIPHER_GATE_CONFIG";

const AUTH_MODE_ENV: &str = "CIPHER_GATE_AUTH_MODE";
const SHARED_SECRET_ENV: &str = "CIPHER_GATE_SHARED_SECRET";
const SIGNING_KEY_ENV: &str = "CIPHER_GATE_SIGNING_KEY";
const ISSUER_ENV: &str = "CIPHER_GATE_ISSUER";
const AUDIENCE_ENV: &str = "CIPHER_GATE_AUDIENCE";
const CIPHER_URL_ENV: &str = "CIPHER_GATE_CIPHER_URL";
const CIPHER_API_KEY_ENV: &str = "CIPHER_GATE_CIPHER_API_KEY";
const BIND_ENV: &str = "CIPHER_GATE_BIND";
const TRANSPORT_ENV: &str = "CIPHER_GATE_TRANSPORT";

/// Configuration file format (~/.cipher-gate/config.toml).
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub cipher: CipherConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    #[default]
    Stdio,
    Http,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Stdio => f.write_str("stdio"),
            Transport::Http => f.write_str("http"),
        }
    }
}

impl FromStr for Transport {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stdio" => Ok(Transport::Stdio),
            "http" => Ok(Transport::Http),
            other => Err(GateError::Config(format!(
                "unknown transport '{}' (expected stdio or http)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub transport: Transport,
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: Transport::default(),
            bind: default_bind(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.bind
            .parse()
            .map_err(|_| GateError::Config(format!("invalid bind address '{}'", self.bind)))
    }
}

/// Authorization settings. Fixed for the lifetime of the process.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub mode: AuthMode,
    pub shared_secret: Option<SecretString>,
    pub signing_key: Option<SecretString>,
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CipherConfig {
    /// Base URL of the external cipher service.
    pub base_url: Option<String>,
    pub api_key: Option<SecretString>,
    #[serde(default = "default_cipher_timeout")]
    pub timeout: String,
}

impl Default for CipherConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            timeout: default_cipher_timeout(),
        }
    }
}

impl CipherConfig {
    pub fn timeout_duration(&self) -> Result<std::time::Duration> {
        to_std(session::parse_ttl(&self.timeout)?)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Idle time after which a session is treated as expired. `"never"`
    /// disables expiry.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout: Option<String>,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval: String,
    /// Run calls of the same session one at a time.
    #[serde(default = "default_true")]
    pub serialize_calls: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout: default_idle_timeout(),
            sweep_interval: default_sweep_interval(),
            serialize_calls: true,
        }
    }
}

impl SessionConfig {
    pub fn idle_timeout_duration(&self) -> Result<Option<Duration>> {
        let Some(raw) = self.idle_timeout.as_deref() else {
            return Ok(None);
        };
        if raw.trim().eq_ignore_ascii_case(NEVER) {
            return Ok(None);
        }
        let timeout = session::parse_ttl(raw)?;
        if timeout <= Duration::zero() {
            return Err(GateError::Config(
                "session.idle_timeout must be greater than zero (use \"never\" to disable)".into(),
            ));
        }
        Ok(Some(timeout))
    }

    pub fn sweep_interval_duration(&self) -> Result<std::time::Duration> {
        to_std(session::parse_ttl(&self.sweep_interval)?)
    }
}

const NEVER: &str = "never";

fn default_idle_timeout() -> Option<String> {
    Some("30m".to_string())
}

fn default_bind() -> String {
    "127.0.0.1:8787".to_string()
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

fn default_cipher_timeout() -> String {
    "10s".to_string()
}

fn default_sweep_interval() -> String {
    "60s".to_string()
}

fn default_true() -> bool {
    true
}

fn to_std(d: Duration) -> Result<std::time::Duration> {
    d.to_std()
        .map_err(|e| GateError::Config(format!("Duration out of range: {}", e)))
}

impl Config {
    /// Default config location: `~/.cipher-gate/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".cipher-gate").join("config.toml"))
    }

    /// Load config from a path. Returns default config if file doesn't exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| GateError::Config(format!("{}: {}", path.display(), e)))?;
        Ok(config)
    }

    /// Load, apply environment overrides, and validate.
    ///
    /// The file is taken from `path`, then `CIPHER_GATE_CONFIG`, then the
    /// default location.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(CONFIG_ENV).ok().map(PathBuf::from))
            .or_else(Self::default_path);
        let mut config = match path {
            Some(p) => Self::load(&p)?,
            None => Self::default(),
        };
        config.apply_env_from(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup. Empty values are ignored.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(mode) = get(AUTH_MODE_ENV) {
            self.auth.mode = mode.parse()?;
        }
        if let Some(v) = get(SHARED_SECRET_ENV) {
            self.auth.shared_secret = Some(SecretString::new(v));
        }
        if let Some(v) = get(SIGNING_KEY_ENV) {
            self.auth.signing_key = Some(SecretString::new(v));
        }
        if let Some(v) = get(ISSUER_ENV) {
            self.auth.issuer = Some(v);
        }
        if let Some(v) = get(AUDIENCE_ENV) {
            self.auth.audience = Some(v);
        }
        if let Some(v) = get(CIPHER_URL_ENV) {
            self.cipher.base_url = Some(v);
        }
        if let Some(v) = get(CIPHER_API_KEY_ENV) {
            self.cipher.api_key = Some(SecretString::new(v));
        }
        if let Some(v) = get(BIND_ENV) {
            self.server.bind = v;
        }
        if let Some(v) = get(TRANSPORT_ENV) {
            self.server.transport = v.parse()?;
        }
        Ok(())
    }

    /// Fail closed on combinations that cannot authorize anything.
    pub fn validate(&mut self) -> Result<()> {
        clear_blank_secret(&mut self.auth.shared_secret);
        clear_blank_secret(&mut self.auth.signing_key);
        clear_blank_secret(&mut self.cipher.api_key);
        clear_blank(&mut self.auth.issuer);
        clear_blank(&mut self.auth.audience);
        clear_blank(&mut self.cipher.base_url);

        match self.auth.mode {
            AuthMode::Open | AuthMode::Permissive => {}
            AuthMode::Dual => {
                if self.auth.signing_key.is_none() && self.auth.shared_secret.is_none() {
                    return Err(GateError::Config(
                        "dual mode requires a signing key or a shared secret".into(),
                    ));
                }
            }
            AuthMode::Strict => {
                if self.auth.signing_key.is_none() {
                    return Err(GateError::Config("strict mode requires a signing key".into()));
                }
            }
        }

        if self.server.max_body_bytes == 0 {
            return Err(GateError::Config("server.max_body_bytes must be > 0".into()));
        }
        if self.server.transport == Transport::Http {
            self.server.bind_addr()?;
        }
        self.cipher.timeout_duration()?;
        self.session.idle_timeout_duration()?;
        self.session.sweep_interval_duration()?;
        Ok(())
    }
}

fn clear_blank(value: &mut Option<String>) {
    if value.as_deref().map(str::trim).is_some_and(str::is_empty) {
        *value = None;
    }
}

fn clear_blank_secret(value: &mut Option<SecretString>) {
    if value
        .as_ref()
        .is_some_and(|s| s.expose_secret().trim().is_empty())
    {
        *value = None;
    }
}
