//! MCP (Model Context Protocol) server over JSON-RPC 2.0.
//!
//! Implements the minimal MCP handshake (`initialize`, `notifications/initialized`,
//! `tools/list`, `tools/call`, `ping`). Request handling is transport-agnostic;
//! the stdio read loop lives here and the HTTP transport in [`http`].

pub mod http;
pub mod tools;

use std::io::{BufRead, Write};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::Gateway;
use crate::error::{ErrorData, GateError};
use crate::session::SessionHandle;

pub const PROTOCOL_VERSION: &str = "2025-03-26";

// ── JSON-RPC 2.0 types ──────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    #[allow(dead_code)]
    pub jsonrpc: String,
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl JsonRpcRequest {
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Option<Value>, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }

    /// Map a gateway error onto a JSON-RPC error, hiding internal detail.
    pub fn from_gate_error(id: Option<Value>, err: &GateError) -> Self {
        let mut resp = Self::error(id, err.rpc_code(), err.public_message());
        if let Some(error) = resp.error.as_mut() {
            error.data = serde_json::to_value(ErrorData::from_error(err)).ok();
        }
        resp
    }

    pub fn error_code(&self) -> Option<i64> {
        self.error.as_ref().map(|e| e.code)
    }
}

// ── Call context ─────────────────────────────────────────────────

/// What the transport knows about a call besides its payload.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    pub session: Option<SessionHandle>,
    /// Out-of-band credential, e.g. the `Authorization` header.
    pub credential: Option<String>,
}

impl CallContext {
    pub fn new(session: Option<SessionHandle>, credential: Option<String>) -> Self {
        Self {
            session,
            credential,
        }
    }
}

// ── MCP Server ───────────────────────────────────────────────────

/// MCP server that dispatches JSON-RPC requests to the [`Gateway`].
pub struct McpServer {
    gateway: Arc<Gateway>,
}

impl McpServer {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &Arc<Gateway> {
        &self.gateway
    }

    /// Run the stdio read loop on the given reader/writer pair.
    ///
    /// Reads line-delimited JSON-RPC from `reader`, dispatches, and writes
    /// responses to `writer`. `initialize` begins the session; EOF ends it.
    pub fn run<R: BufRead, W: Write>(&self, reader: R, mut writer: W) -> std::io::Result<()> {
        let mut session: Option<SessionHandle> = None;

        for line in reader.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let request: JsonRpcRequest = match serde_json::from_str(line) {
                Ok(r) => r,
                Err(e) => {
                    let resp =
                        JsonRpcResponse::error(None, -32700, format!("Parse error: {}", e));
                    Self::write_response(&mut writer, &resp)?;
                    continue;
                }
            };

            if request.method == "initialize" && session.is_none() {
                session = Some(self.gateway.begin_session());
            }

            let ctx = CallContext::new(session.clone(), None);
            let response = self.handle(&ctx, &request);

            // Notifications (no id) produce no response
            if !request.is_notification() {
                if let Some(resp) = response {
                    Self::write_response(&mut writer, &resp)?;
                }
            }
        }

        if let Some(s) = session {
            self.gateway.end_session(s.id().as_str());
        }
        Ok(())
    }

    fn write_response<W: Write>(writer: &mut W, resp: &JsonRpcResponse) -> std::io::Result<()> {
        let json = serde_json::to_string(resp).map_err(std::io::Error::other)?;
        writeln!(writer, "{}", json)?;
        writer.flush()
    }

    /// Handle one request. Returns `None` for notifications.
    pub fn handle(&self, ctx: &CallContext, req: &JsonRpcRequest) -> Option<JsonRpcResponse> {
        match req.method.as_str() {
            "initialize" => Some(self.handle_initialize(req)),
            "notifications/initialized" => None,
            "ping" => Some(self.handle_ping(req)),
            "tools/list" => Some(self.handle_tools_list(req)),
            "tools/call" => Some(self.handle_tools_call(ctx, req)),
            _ if req.is_notification() => None,
            _ => Some(JsonRpcResponse::error(
                req.id.clone(),
                -32601,
                format!("Method not found: {}", req.method),
            )),
        }
    }

    fn handle_initialize(&self, req: &JsonRpcRequest) -> JsonRpcResponse {
        let result = serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": {}
            },
            "serverInfo": {
                "name": "cipher-gate",
                "version": env!("CARGO_PKG_VERSION")
            }
        });
        JsonRpcResponse::success(req.id.clone(), result)
    }

    fn handle_ping(&self, req: &JsonRpcRequest) -> JsonRpcResponse {
        JsonRpcResponse::success(req.id.clone(), serde_json::json!({}))
    }

    fn handle_tools_list(&self, req: &JsonRpcRequest) -> JsonRpcResponse {
        let tool_defs = tools::tool_definitions();
        let result = serde_json::json!({ "tools": tool_defs });
        JsonRpcResponse::success(req.id.clone(), result)
    }

    fn handle_tools_call(&self, ctx: &CallContext, req: &JsonRpcRequest) -> JsonRpcResponse {
        let tool_name = req
            .params
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or("");
        let arguments = req
            .params
            .get("arguments")
            .cloned()
            .unwrap_or(Value::Object(Default::default()));

        match self.gateway.call_tool(
            ctx.session.as_ref(),
            ctx.credential.as_deref(),
            tool_name,
            &arguments,
        ) {
            Ok(result) => JsonRpcResponse::success(req.id.clone(), result),
            Err(e) => JsonRpcResponse::from_gate_error(req.id.clone(), &e),
        }
    }
}
