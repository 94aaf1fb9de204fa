//! Streamable-HTTP transport.
//!
//! `POST /mcp` carries one JSON-RPC message. `initialize` opens a session and
//! returns its id in the `Mcp-Session-Id` header; every other request must
//! present a live id. `DELETE /mcp` ends the session. The `Authorization`
//! header is the out-of-band credential.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};

use super::{CallContext, JsonRpcRequest, JsonRpcResponse, McpServer};
use crate::config::Config;
use crate::error::{GateError, Result};
use crate::session::SessionRegistry;

pub const SESSION_HEADER: &str = "mcp-session-id";

const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Clone)]
struct HttpState {
    server: Arc<McpServer>,
}

/// Build the axum router for the MCP endpoint.
pub fn router(server: Arc<McpServer>, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/mcp", post(handle_post).delete(handle_delete))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(HttpState { server })
}

/// Bind the configured address and serve until Ctrl-C.
pub async fn serve(server: Arc<McpServer>, config: &Config) -> Result<()> {
    let addr = config.server.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| GateError::Transport(format!("http bind {}: {}", addr, e)))?;
    tracing::info!(%addr, "http transport listening");
    serve_listener(
        listener,
        server,
        config.server.max_body_bytes,
        config.session.sweep_interval_duration()?,
        shutdown_signal(),
    )
    .await
}

/// Serve on an already-bound listener until `shutdown` resolves, then close
/// every session.
pub async fn serve_listener<F>(
    listener: tokio::net::TcpListener,
    server: Arc<McpServer>,
    max_body_bytes: usize,
    sweep_interval: Duration,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let registry = server.gateway().registry().clone();
    let sweeper = tokio::spawn(sweep_sessions(registry.clone(), sweep_interval));

    let result = axum::serve(listener, router(server, max_body_bytes))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| GateError::Transport(format!("http server: {}", e)));

    sweeper.abort();
    let closed = registry.close_all();
    tracing::info!(closed, "http transport stopped");
    result
}

async fn sweep_sessions(registry: Arc<SessionRegistry>, every: Duration) {
    let mut ticker = tokio::time::interval(every.max(MIN_SWEEP_INTERVAL));
    // First tick fires immediately.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        registry.sweep_expired();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

async fn handle_post(State(state): State<HttpState>, headers: HeaderMap, body: Bytes) -> Response {
    let request: JsonRpcRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            return rpc_response(
                StatusCode::BAD_REQUEST,
                JsonRpcResponse::error(None, -32700, format!("Parse error: {}", e)),
            )
        }
    };

    let gateway = state.server.gateway().clone();
    let request_id = request.id.clone();

    let (session, new_session) = if request.method == "initialize" {
        let session = gateway.begin_session();
        let id = session.id().clone();
        (Some(session), Some(id))
    } else {
        let Some(id) = header_str(&headers, SESSION_HEADER) else {
            return rpc_response(
                StatusCode::BAD_REQUEST,
                JsonRpcResponse::error(request_id, -32600, "Missing Mcp-Session-Id header"),
            );
        };
        match gateway.resume_session(id) {
            Ok(s) => (Some(s), None),
            Err(e) => {
                return rpc_response(
                    StatusCode::NOT_FOUND,
                    JsonRpcResponse::from_gate_error(request_id, &e),
                )
            }
        }
    };

    let ctx = CallContext::new(session, authorization(&headers));
    let is_notification = request.is_notification();
    let server = state.server.clone();
    let response = match tokio::task::spawn_blocking(move || server.handle(&ctx, &request)).await
    {
        Ok(r) => r,
        Err(e) => Some(JsonRpcResponse::from_gate_error(
            request_id,
            &GateError::Internal(format!("call task failed: {}", e)),
        )),
    };

    let mut http = match response {
        Some(resp) if !is_notification => rpc_response(status_for(&resp), resp),
        _ => StatusCode::ACCEPTED.into_response(),
    };
    if let Some(id) = new_session {
        if let Ok(value) = HeaderValue::from_str(id.as_str()) {
            http.headers_mut().insert(SESSION_HEADER, value);
        }
    }
    http
}

async fn handle_delete(State(state): State<HttpState>, headers: HeaderMap) -> StatusCode {
    match header_str(&headers, SESSION_HEADER) {
        Some(id) => {
            state.server.gateway().end_session(id);
            StatusCode::NO_CONTENT
        }
        None => StatusCode::BAD_REQUEST,
    }
}

/// The `Authorization` header as sent. A value that is not visible ASCII is
/// kept in lossy form so it still takes precedence over the in-band argument
/// and fails verification.
fn authorization(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn status_for(resp: &JsonRpcResponse) -> StatusCode {
    match resp.error_code() {
        Some(-32001) => StatusCode::UNAUTHORIZED,
        Some(-32002) => StatusCode::NOT_FOUND,
        Some(-32700) | Some(-32600) => StatusCode::BAD_REQUEST,
        _ => StatusCode::OK,
    }
}

fn rpc_response(status: StatusCode, resp: JsonRpcResponse) -> Response {
    (status, Json(resp)).into_response()
}
