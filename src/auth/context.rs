use super::claims::Claims;
use super::AuthMode;
use crate::error::{GateError, Result};

/// The result of authorizing a single call. Computed fresh per call.
#[derive(Debug, Clone)]
pub struct AuthDecision {
    /// The enforcement mode that produced this decision.
    pub mode: AuthMode,
    pub allowed: bool,
    /// How the caller was recognised.
    pub method: AuthMethod,
    /// Claims from a verified signed token, if any.
    pub claims: Option<Claims>,
    /// Why the call was denied.
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    Anonymous,
    SignedToken,
    SharedSecret,
}

impl AuthMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            AuthMethod::Anonymous => "anonymous",
            AuthMethod::SignedToken => "signed_token",
            AuthMethod::SharedSecret => "shared_secret",
        }
    }
}

impl AuthDecision {
    pub fn allow(mode: AuthMode, method: AuthMethod, claims: Option<Claims>) -> Self {
        Self {
            mode,
            allowed: true,
            method,
            claims,
            reason: None,
        }
    }

    pub fn deny(mode: AuthMode, reason: impl Into<String>) -> Self {
        Self {
            mode,
            allowed: false,
            method: AuthMethod::Anonymous,
            claims: None,
            reason: Some(reason.into()),
        }
    }

    pub fn subject(&self) -> Option<&str> {
        self.claims.as_ref().and_then(Claims::subject)
    }

    pub fn actor_name(&self) -> String {
        match (self.method, self.subject()) {
            (AuthMethod::SignedToken, Some(sub)) => format!("token({})", sub),
            (method, _) => method.as_str().to_string(),
        }
    }

    /// Convert a denial into an `Unauthorized` error naming the mode.
    pub fn into_result(self) -> Result<Self> {
        if self.allowed {
            return Ok(self);
        }
        let reason = self
            .reason
            .unwrap_or_else(|| format!("{} mode: access denied", self.mode));
        Err(GateError::Unauthorized(reason))
    }
}
