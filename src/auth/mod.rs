//! Per-call authorization.
//!
//! A [`Verifier`] is built once from configuration and is immutable
//! afterwards. Each call is decided from scratch: nothing is cached between
//! calls or sessions.

pub mod claims;
pub mod context;
pub mod credential;
pub mod token;

use std::fmt;
use std::str::FromStr;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::config::AuthConfig;
use crate::error::GateError;
use crate::types::*;
use claims::Claims;
pub use context::{AuthDecision, AuthMethod};
pub use credential::{Credential, Scheme};
use token::VerifyOptions;

/// Enforcement strength, weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Every call is allowed; credentials are ignored.
    Open,
    /// Every call is allowed; a valid signed token contributes claims.
    Permissive,
    /// A signed token or the shared secret is required.
    Dual,
    /// Only a signed token is accepted.
    #[default]
    Strict,
}

impl AuthMode {
    pub fn as_str(self) -> &'static str {
        match self {
            AuthMode::Open => "open",
            AuthMode::Permissive => "permissive",
            AuthMode::Dual => "dual",
            AuthMode::Strict => "strict",
        }
    }

    /// Modes that let unauthenticated callers through.
    pub fn is_unenforced(self) -> bool {
        match self {
            AuthMode::Open | AuthMode::Permissive => true,
            AuthMode::Dual | AuthMode::Strict => false,
        }
    }
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthMode {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(AuthMode::Open),
            "permissive" => Ok(AuthMode::Permissive),
            "dual" => Ok(AuthMode::Dual),
            "strict" => Ok(AuthMode::Strict),
            other => Err(GateError::Config(format!(
                "unknown auth mode '{}' (expected open, permissive, dual or strict)",
                other
            ))),
        }
    }
}

const DUAL_DENIED: &str = "dual mode: valid signed token or shared secret required";
const STRICT_DENIED: &str = "strict mode: signed token required";

/// Allow/deny decisions for the configured mode and secrets.
pub struct Verifier {
    mode: AuthMode,
    signing_key: Option<SecretString>,
    shared_secret: Option<SecretString>,
    options: VerifyOptions,
}

impl Verifier {
    pub fn new(mode: AuthMode) -> Self {
        Self {
            mode,
            signing_key: None,
            shared_secret: None,
            options: VerifyOptions::default(),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self {
            mode: config.mode,
            signing_key: config.signing_key.clone(),
            shared_secret: config.shared_secret.clone(),
            options: VerifyOptions {
                issuer: config.issuer.clone(),
                audience: config.audience.clone(),
                ..VerifyOptions::default()
            },
        }
    }

    pub fn with_signing_key(mut self, key: impl Into<String>) -> Self {
        self.signing_key = Some(SecretString::new(key.into()));
        self
    }

    pub fn with_shared_secret(mut self, secret: impl Into<String>) -> Self {
        self.shared_secret = Some(SecretString::new(secret.into()));
        self
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.options.issuer = Some(issuer.into());
        self
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.options.audience = Some(audience.into());
        self
    }

    pub fn mode(&self) -> AuthMode {
        self.mode
    }

    /// Decide a call at the current wall-clock time.
    pub fn authorize(&self, credential: &Credential) -> AuthDecision {
        self.authorize_at(credential, Utc::now().timestamp())
    }

    /// Decide a call at unix time `now`.
    pub fn authorize_at(&self, credential: &Credential, now: i64) -> AuthDecision {
        let decision = match self.mode {
            AuthMode::Open => AuthDecision::allow(self.mode, AuthMethod::Anonymous, None),
            AuthMode::Permissive => match self.verify_signed(credential, now) {
                Some(claims) => AuthDecision::allow(self.mode, AuthMethod::SignedToken, Some(claims)),
                None => AuthDecision::allow(self.mode, AuthMethod::Anonymous, None),
            },
            AuthMode::Dual => {
                if let Some(claims) = self.verify_signed(credential, now) {
                    AuthDecision::allow(self.mode, AuthMethod::SignedToken, Some(claims))
                } else if self.matches_shared_secret(credential) {
                    AuthDecision::allow(self.mode, AuthMethod::SharedSecret, None)
                } else {
                    AuthDecision::deny(self.mode, DUAL_DENIED)
                }
            }
            AuthMode::Strict => match self.verify_signed(credential, now) {
                Some(claims) => AuthDecision::allow(self.mode, AuthMethod::SignedToken, Some(claims)),
                None => AuthDecision::deny(self.mode, STRICT_DENIED),
            },
        };

        if decision.allowed {
            tracing::debug!(
                target: "cipher_gate::authz",
                mode = %decision.mode,
                method = decision.method.as_str(),
                subject = decision.subject(),
                "call allowed"
            );
        } else {
            tracing::info!(
                target: "cipher_gate::authz",
                mode = %decision.mode,
                scheme = ?credential.scheme,
                reason = decision.reason.as_deref(),
                "call denied"
            );
        }
        decision
    }

    /// Verify the credential as a signed token. Any failure is "not verified".
    pub fn verify_signed(&self, credential: &Credential, now: i64) -> Option<Claims> {
        let key = self.signing_key.as_ref()?;
        if !credential.is_present() {
            return None;
        }
        match token::verify(
            credential.value(),
            key.expose_secret().as_bytes(),
            &self.options,
            now,
        ) {
            Ok(claims) => Some(claims),
            Err(e) => {
                tracing::debug!(target: "cipher_gate::authz", error = %e, "signed token rejected");
                None
            }
        }
    }

    fn matches_shared_secret(&self, credential: &Credential) -> bool {
        let Some(secret) = self.shared_secret.as_ref() else {
            return false;
        };
        let expected = secret.expose_secret();
        if expected.is_empty() || !credential.is_present() {
            return false;
        }
        // Constant-time comparison
        credential
            .value()
            .as_bytes()
            .ct_eq(expected.as_bytes())
            .into()
    }
}

impl fmt::Debug for Verifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Verifier")
            .field("mode", &self.mode)
            .field("signing_key", &self.signing_key.as_ref().map(|_| "[REDACTED]"))
            .field("shared_secret", &self.shared_secret.as_ref().map(|_| "[REDACTED]"))
            .field("options", &self.options)
            .finish()
    }
}
