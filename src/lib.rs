//! Cipher Gate: an MCP call gateway for tagged-value encryption.
//!
//! Callers reach two tools, `encrypt` and `decrypt`, over a persistent MCP
//! session. Every call is authorized under one of four enforcement modes
//! (open, permissive, dual, strict) and authorized calls are forwarded to an
//! external cipher service.
//!
//! # Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use cipher_gate::api::Gateway;
//! use cipher_gate::auth::{AuthMode, Verifier};
//! use cipher_gate::cipher::HttpCipherService;
//! use cipher_gate::session::SessionRegistry;
//!
//! let cipher = HttpCipherService::new("http://127.0.0.1:8080", None, Duration::from_secs(5))?;
//! let verifier = Verifier::new(AuthMode::Dual).with_shared_secret("s3cret");
//! let gateway = Gateway::new(verifier, Arc::new(SessionRegistry::new()), Arc::new(cipher));
//!
//! let tagged = gateway.encrypt("123-456-789", Some("s3cret"))?;
//! assert_eq!(gateway.decrypt(&tagged, Some("s3cret"))?, "123456789");
//! # Ok::<(), cipher_gate::error::GateError>(())
//! ```

pub mod api;
pub mod auth;
pub mod cipher;
pub mod config;
pub mod error;
pub mod mcp;
pub mod session;
pub mod types;
