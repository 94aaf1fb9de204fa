//! Compact JWS tokens signed with the HMAC-SHA2 family (HS256/HS384/HS512).
//!
//! Only symmetric algorithms are recognised. Every failure is reported as a
//! [`TokenError`]; callers that make authorization decisions collapse it to
//! "not verified".

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Sha256, Sha384, Sha512};
use subtle::ConstantTimeEq;
use thiserror::Error;

use super::claims::Claims;

/// Clock-skew tolerance applied to `exp` and `nbf`.
pub const DEFAULT_LEEWAY_SECS: i64 = 5;

const MAX_TOKEN_BYTES: usize = 8 * 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token: {0}")]
    Malformed(&'static str),
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("signature mismatch")]
    BadSignature,
    #[error("token expired")]
    Expired,
    #[error("token not yet valid")]
    NotYetValid,
    #[error("issuer mismatch")]
    IssuerMismatch,
    #[error("audience mismatch")]
    AudienceMismatch,
    #[error("signing key rejected")]
    InvalidKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    HS256,
    HS384,
    HS512,
}

impl Algorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            Algorithm::HS256 => "HS256",
            Algorithm::HS384 => "HS384",
            Algorithm::HS512 => "HS512",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HS256" => Ok(Algorithm::HS256),
            "HS384" => Ok(Algorithm::HS384),
            "HS512" => Ok(Algorithm::HS512),
            other => Err(TokenError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    typ: Option<String>,
}

/// Issuer/audience constraints and clock tolerance.
#[derive(Debug, Clone)]
pub struct VerifyOptions {
    pub issuer: Option<String>,
    pub audience: Option<String>,
    pub leeway_secs: i64,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            issuer: None,
            audience: None,
            leeway_secs: DEFAULT_LEEWAY_SECS,
        }
    }
}

/// Verify `token` against `key` at unix time `now`. Returns the claims on success.
pub fn verify(
    token: &str,
    key: &[u8],
    opts: &VerifyOptions,
    now: i64,
) -> Result<Claims, TokenError> {
    if token.len() > MAX_TOKEN_BYTES {
        return Err(TokenError::Malformed("token too large"));
    }

    let mut parts = token.split('.');
    let (header_b64, payload_b64, sig_b64) = match (parts.next(), parts.next(), parts.next()) {
        (Some(h), Some(p), Some(s)) if parts.next().is_none() => (h, p, s),
        _ => return Err(TokenError::Malformed("expected three segments")),
    };

    let header: Header = decode_json(header_b64, "header")?;
    let alg: Algorithm = header.alg.parse()?;

    let signature = URL_SAFE_NO_PAD
        .decode(sig_b64)
        .map_err(|_| TokenError::Malformed("signature is not base64url"))?;
    let signing_input = &token[..header_b64.len() + 1 + payload_b64.len()];
    let expected = compute_mac(alg, key, signing_input.as_bytes())?;

    // Constant-time comparison
    if !bool::from(expected.ct_eq(&signature)) {
        return Err(TokenError::BadSignature);
    }

    let payload: Value = decode_json(payload_b64, "payload")?;
    let claims = match payload {
        Value::Object(map) => Claims::from_map(map),
        _ => return Err(TokenError::Malformed("payload is not an object")),
    };

    check_time(&claims, opts.leeway_secs, now)?;

    if let Some(issuer) = &opts.issuer {
        if claims.issuer() != Some(issuer.as_str()) {
            return Err(TokenError::IssuerMismatch);
        }
    }
    if let Some(audience) = &opts.audience {
        if !claims.audiences().contains(&audience.as_str()) {
            return Err(TokenError::AudienceMismatch);
        }
    }

    Ok(claims)
}

/// Sign `claims` into a compact token.
pub fn sign(claims: &Claims, key: &[u8], alg: Algorithm) -> Result<String, TokenError> {
    let header = Header {
        alg: alg.as_str().to_string(),
        typ: Some("JWT".to_string()),
    };
    let header_json =
        serde_json::to_vec(&header).map_err(|_| TokenError::Malformed("header serialization"))?;
    let payload_json =
        serde_json::to_vec(claims).map_err(|_| TokenError::Malformed("payload serialization"))?;

    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(header_json),
        URL_SAFE_NO_PAD.encode(payload_json)
    );
    let mac = compute_mac(alg, key, signing_input.as_bytes())?;
    Ok(format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(mac)))
}

fn check_time(claims: &Claims, leeway: i64, now: i64) -> Result<(), TokenError> {
    if claims.has("exp") {
        let exp = claims
            .expires_at()
            .ok_or(TokenError::Malformed("exp is not numeric"))?;
        if now > exp.saturating_add(leeway) {
            return Err(TokenError::Expired);
        }
    }
    if claims.has("nbf") {
        let nbf = claims
            .not_before()
            .ok_or(TokenError::Malformed("nbf is not numeric"))?;
        if now.saturating_add(leeway) < nbf {
            return Err(TokenError::NotYetValid);
        }
    }
    Ok(())
}

fn decode_json<T: serde::de::DeserializeOwned>(
    segment: &str,
    what: &'static str,
) -> Result<T, TokenError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| TokenError::Malformed(what))?;
    serde_json::from_slice(&bytes).map_err(|_| TokenError::Malformed(what))
}

fn compute_mac(alg: Algorithm, key: &[u8], data: &[u8]) -> Result<Vec<u8>, TokenError> {
    match alg {
        Algorithm::HS256 => mac_bytes::<Hmac<Sha256>>(key, data),
        Algorithm::HS384 => mac_bytes::<Hmac<Sha384>>(key, data),
        Algorithm::HS512 => mac_bytes::<Hmac<Sha512>>(key, data),
    }
}

fn mac_bytes<M>(key: &[u8], data: &[u8]) -> Result<Vec<u8>, TokenError>
where
    M: Mac + hmac::digest::KeyInit,
{
    let mut mac =
        <M as hmac::digest::KeyInit>::new_from_slice(key).map_err(|_| TokenError::InvalidKey)?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}
