use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::{CipherError, CipherService, TAG_PREFIX};
use crate::config::CipherConfig;
use crate::error::{GateError, Result};

const API_KEY_HEADER: &str = "x-api-key";

#[derive(Serialize)]
struct TransformRequest<'a> {
    value: &'a str,
}

#[derive(Deserialize)]
struct TransformResponse {
    value: Option<String>,
    error: Option<String>,
}

/// Blocking HTTP client for the external cipher service.
///
/// `POST {base_url}/v1/forward` and `POST {base_url}/v1/backward`, each
/// taking and returning `{"value": ...}`. Refusals come back as a 4xx with
/// `{"error": ...}`.
pub struct HttpCipherService {
    client: Client,
    base_url: String,
    api_key: Option<SecretString>,
}

impl HttpCipherService {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GateError::Config(format!("cipher client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub fn from_config(config: &CipherConfig) -> Result<Self> {
        let base_url = config
            .base_url
            .clone()
            .ok_or_else(|| GateError::Config("cipher.base_url is required".into()))?;
        Self::new(base_url, config.api_key.clone(), config.timeout_duration()?)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn call(&self, operation: &str, value: &str) -> std::result::Result<String, CipherError> {
        let url = format!("{}/v1/{}", self.base_url, operation);
        let mut request = self.client.post(&url).json(&TransformRequest { value });
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key.expose_secret());
        }

        let response = request
            .send()
            .map_err(|e| CipherError::Unavailable(e.to_string()))?;
        let status = response.status();
        let body: Option<TransformResponse> = response.json().ok();

        if status.is_success() {
            return body
                .and_then(|b| b.value)
                .ok_or_else(|| CipherError::Protocol(format!("{} response has no value", operation)));
        }

        let message = body
            .and_then(|b| b.error)
            .unwrap_or_else(|| status_text(status));
        if status.is_client_error() {
            Err(CipherError::Rejected(message))
        } else {
            Err(CipherError::Unavailable(format!("{}: {}", status, message)))
        }
    }
}

impl CipherService for HttpCipherService {
    fn transform_forward(&self, value: &str) -> std::result::Result<String, CipherError> {
        let tagged = self.call("forward", value)?;
        if !tagged.starts_with(TAG_PREFIX) {
            return Err(CipherError::Protocol(
                "forward result is missing the tag marker".into(),
            ));
        }
        Ok(tagged)
    }

    fn transform_backward(&self, tagged: &str) -> std::result::Result<String, CipherError> {
        self.call("backward", tagged)
    }
}

fn status_text(status: StatusCode) -> String {
    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| status.as_str().to_string())
}
