//! Shared fixtures: an in-memory cipher stub with call counters and token helpers.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Map, Value};

use cipher_gate::api::Gateway;
use cipher_gate::auth::claims::Claims;
use cipher_gate::auth::token::{self, Algorithm};
use cipher_gate::auth::Verifier;
use cipher_gate::cipher::{CipherError, CipherService, TAG_PREFIX};
use cipher_gate::session::SessionRegistry;

pub const SIGNING_KEY: &str = "test-signing-key-0123456789";
pub const SHARED_SECRET: &str = "shared-s3cret";

#[derive(Clone)]
pub enum Failure {
    Rejected(String),
    Unavailable(String),
}

/// Reversible digit transform standing in for the external service.
#[derive(Default)]
pub struct StubCipher {
    pub forward_calls: AtomicUsize,
    pub backward_calls: AtomicUsize,
    failure: Mutex<Option<Failure>>,
}

impl StubCipher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_with(&self, failure: Failure) {
        *self.failure.lock() = Some(failure);
    }

    pub fn forward_count(&self) -> usize {
        self.forward_calls.load(Ordering::SeqCst)
    }

    pub fn backward_count(&self) -> usize {
        self.backward_calls.load(Ordering::SeqCst)
    }

    fn check_failure(&self) -> Result<(), CipherError> {
        match self.failure.lock().clone() {
            Some(Failure::Rejected(m)) => Err(CipherError::Rejected(m)),
            Some(Failure::Unavailable(m)) => Err(CipherError::Unavailable(m)),
            None => Ok(()),
        }
    }
}

fn flip(digits: &str) -> String {
    digits
        .chars()
        .rev()
        .map(|c| match c.to_digit(10) {
            Some(d) => char::from(b'0' + (9 - d) as u8),
            None => c,
        })
        .collect()
}

impl CipherService for StubCipher {
    fn transform_forward(&self, value: &str) -> Result<String, CipherError> {
        self.forward_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;
        Ok(format!("{}{}", TAG_PREFIX, flip(value)))
    }

    fn transform_backward(&self, tagged: &str) -> Result<String, CipherError> {
        self.backward_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;
        let payload = tagged
            .strip_prefix(TAG_PREFIX)
            .ok_or_else(|| CipherError::Rejected("missing tag".into()))?;
        Ok(flip(payload))
    }
}

pub fn gateway(verifier: Verifier, cipher: Arc<StubCipher>) -> Arc<Gateway> {
    Arc::new(Gateway::new(verifier, Arc::new(SessionRegistry::new()), cipher))
}

pub fn claims(v: Value) -> Claims {
    match v {
        Value::Object(map) => Claims::from_map(map),
        _ => Claims::from_map(Map::new()),
    }
}

pub fn sign(v: Value) -> String {
    sign_with(v, SIGNING_KEY)
}

pub fn sign_with(v: Value, key: &str) -> String {
    token::sign(&claims(v), key.as_bytes(), Algorithm::HS256).unwrap()
}

pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}
