//! MCP tool definitions and dispatch for the cipher gateway.

use std::sync::Arc;

use serde_json::Value;

use crate::cipher::{self, CipherError, CipherService};
use crate::error::{GateError, Result};

pub const ENCRYPT: &str = "encrypt";
pub const DECRYPT: &str = "decrypt";

/// Return JSON Schema definitions for all MCP tools.
pub fn tool_definitions() -> Vec<Value> {
    vec![
        serde_json::json!({
            "name": ENCRYPT,
            "description": "Encrypt a numeric value into a tagged value (ENC:...). Already-tagged input is returned unchanged.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "value": { "type": "string", "description": "Value to encrypt; spaces and dashes are ignored" },
                    "credential": { "type": "string", "description": "Signed token or shared secret (optional when sent as a header)" }
                },
                "required": ["value"]
            }
        }),
        serde_json::json!({
            "name": DECRYPT,
            "description": "Decrypt a tagged value (ENC:...) back into its original value",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "tagged_value": { "type": "string", "description": "Tagged value produced by encrypt" },
                    "credential": { "type": "string", "description": "Signed token or shared secret (optional when sent as a header)" }
                },
                "required": ["tagged_value"]
            }
        }),
    ]
}

/// Build an MCP success result carrying a structured payload.
pub fn tool_result(structured: Value) -> Value {
    serde_json::json!({
        "content": [{ "type": "text", "text": structured.to_string() }],
        "structuredContent": structured
    })
}

/// Validates tool arguments and forwards them to the cipher service.
/// No retries, no caching.
#[derive(Clone)]
pub struct ToolDispatcher {
    cipher: Arc<dyn CipherService>,
}

impl ToolDispatcher {
    pub fn new(cipher: Arc<dyn CipherService>) -> Self {
        Self { cipher }
    }

    /// Dispatch a tool call to the appropriate handler.
    pub fn dispatch(&self, tool_name: &str, args: &Value) -> Result<Value> {
        let result = match tool_name {
            ENCRYPT => self.handle_encrypt(args),
            DECRYPT => self.handle_decrypt(args),
            _ => Err(GateError::InvalidParams(format!("Unknown tool: {}", tool_name))),
        };
        match &result {
            Ok(_) => tracing::info!(tool = tool_name, "tool call succeeded"),
            Err(e) => tracing::info!(tool = tool_name, code = e.error_code(), "tool call failed"),
        }
        result
    }

    fn handle_encrypt(&self, args: &Value) -> Result<Value> {
        let value = required_str(args, "value")?;
        let tagged = self.encrypt(value)?;
        Ok(tool_result(serde_json::json!({ "tagged_value": tagged })))
    }

    fn handle_decrypt(&self, args: &Value) -> Result<Value> {
        let tagged = required_str(args, "tagged_value")?;
        let value = self.decrypt(tagged)?;
        Ok(tool_result(serde_json::json!({ "value": value })))
    }

    /// Forward-transform a value. Tagged input comes back as-is.
    pub fn encrypt(&self, value: &str) -> Result<String> {
        if cipher::is_tagged(value) {
            return Ok(value.trim().to_string());
        }
        let normalized = cipher::normalize(value);
        cipher::validate_plain(&normalized).map_err(GateError::InvalidParams)?;
        self.cipher
            .transform_forward(&normalized)
            .map_err(map_cipher_error)
    }

    /// Backward-transform a tagged value.
    pub fn decrypt(&self, tagged: &str) -> Result<String> {
        let tagged = cipher::validate_tagged(tagged).map_err(GateError::InvalidParams)?;
        self.cipher
            .transform_backward(tagged)
            .map_err(map_cipher_error)
    }
}

/// Length/charset refusals are the caller's fault; everything else is ours.
pub fn map_cipher_error(err: CipherError) -> GateError {
    if err.is_domain_violation() {
        GateError::InvalidParams(err.to_string())
    } else {
        GateError::Internal(err.to_string())
    }
}

fn required_str<'a>(args: &'a Value, name: &str) -> Result<&'a str> {
    let value = match args.get(name) {
        None | Some(Value::Null) => {
            return Err(GateError::InvalidParams(format!(
                "Missing required parameter: {}",
                name
            )))
        }
        Some(v) => v.as_str().ok_or_else(|| {
            GateError::InvalidParams(format!("Parameter '{}' must be a string", name))
        })?,
    };
    if value.trim().is_empty() {
        return Err(GateError::InvalidParams(format!(
            "Parameter '{}' must not be empty",
            name
        )));
    }
    Ok(value)
}

/// Optional string argument; non-strings are treated as absent.
pub fn optional_str<'a>(args: &'a Value, name: &str) -> Option<&'a str> {
    args.get(name).and_then(Value::as_str)
}
