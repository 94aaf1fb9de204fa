use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GateError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Invalid config: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Message shown to callers in place of internal detail.
pub const INTERNAL_MESSAGE: &str = "Internal error";

impl GateError {
    /// Return the JSON-RPC error code for this error category.
    pub fn rpc_code(&self) -> i64 {
        match self {
            GateError::Unauthorized(_) => -32001,
            GateError::SessionNotFound(_) => -32002,
            GateError::InvalidParams(_) => -32602,
            GateError::Internal(_)
            | GateError::Config(_)
            | GateError::Transport(_)
            | GateError::Io(_) => -32603,
        }
    }

    /// Return a string error code identifier.
    pub fn error_code(&self) -> &'static str {
        match self {
            GateError::Unauthorized(_) => "unauthorized",
            GateError::InvalidParams(_) => "invalid_params",
            GateError::SessionNotFound(_) => "not_found",
            GateError::Internal(_) => "internal_error",
            GateError::Config(_) => "config_error",
            GateError::Transport(_) => "transport_error",
            GateError::Io(_) => "io_error",
        }
    }

    /// Whether the full message may be shown to the caller.
    pub fn is_caller_facing(&self) -> bool {
        matches!(
            self,
            GateError::Unauthorized(_) | GateError::InvalidParams(_) | GateError::SessionNotFound(_)
        )
    }

    /// Caller-facing message. Internal detail is replaced by a generic
    /// string and logged for operators.
    pub fn public_message(&self) -> String {
        if self.is_caller_facing() {
            return self.to_string();
        }
        tracing::error!(code = self.error_code(), detail = %self, "internal failure");
        INTERNAL_MESSAGE.to_string()
    }
}

/// JSON error body for the `error.data` member of JSON-RPC responses.
#[derive(Serialize)]
pub struct ErrorData {
    pub code: &'static str,
}

impl ErrorData {
    pub fn from_error(e: &GateError) -> Self {
        Self {
            code: e.error_code(),
        }
    }
}

pub type Result<T> = std::result::Result<T, GateError>;
