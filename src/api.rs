//! High-level programmatic API for the gateway.
//!
//! [`Gateway`] ties the session registry, the authorization verifier and the
//! tool dispatcher together. Transports hold one `Arc<Gateway>` and route
//! every call through it.

use std::sync::Arc;

use serde_json::Value;

use crate::auth::{AuthDecision, Credential, Verifier};
use crate::cipher::CipherService;
use crate::config::Config;
use crate::error::Result;
use crate::mcp::tools::{self, ToolDispatcher};
use crate::session::{SessionHandle, SessionRegistry};

/// Name of the in-band credential argument accepted by every tool.
pub const CREDENTIAL_ARG: &str = "credential";

pub struct Gateway {
    verifier: Verifier,
    registry: Arc<SessionRegistry>,
    dispatcher: ToolDispatcher,
    serialize_calls: bool,
}

impl Gateway {
    pub fn new(
        verifier: Verifier,
        registry: Arc<SessionRegistry>,
        cipher: Arc<dyn CipherService>,
    ) -> Self {
        Self {
            verifier,
            registry,
            dispatcher: ToolDispatcher::new(cipher),
            serialize_calls: true,
        }
    }

    /// Build from validated configuration.
    pub fn from_config(config: &Config, cipher: Arc<dyn CipherService>) -> Result<Self> {
        let registry = SessionRegistry::with_idle_timeout(config.session.idle_timeout_duration()?);
        Ok(Self::new(Verifier::from_config(&config.auth), Arc::new(registry), cipher)
            .with_serialized_calls(config.session.serialize_calls))
    }

    /// Whether calls within one session run one at a time.
    pub fn with_serialized_calls(mut self, on: bool) -> Self {
        self.serialize_calls = on;
        self
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn verifier(&self) -> &Verifier {
        &self.verifier
    }

    pub fn begin_session(&self) -> SessionHandle {
        let session = self.registry.create_handle();
        tracing::info!(session = %session.id(), "session started");
        session
    }

    pub fn resume_session(&self, id: &str) -> Result<SessionHandle> {
        let session = self.registry.lookup(id)?;
        session.touch();
        Ok(session)
    }

    pub fn end_session(&self, id: &str) {
        if self.registry.remove(id) {
            tracing::info!(session = id, "session ended");
        }
    }

    /// Decide a call. A denial becomes `Unauthorized` naming the mode.
    pub fn authorize(&self, out_of_band: Option<&str>, in_band: Option<&str>) -> Result<AuthDecision> {
        let credential = Credential::extract(out_of_band, in_band);
        self.verifier.authorize(&credential).into_result()
    }

    /// Authorize, then run a tool. Authorization is re-evaluated on every
    /// call, including calls inside an established session.
    pub fn call_tool(
        &self,
        session: Option<&SessionHandle>,
        out_of_band: Option<&str>,
        name: &str,
        args: &Value,
    ) -> Result<Value> {
        let _guard = match session {
            Some(s) if self.serialize_calls => Some(s.enter()),
            _ => None,
        };
        if let Some(s) = session {
            s.touch();
        }

        let decision = self.authorize(out_of_band, tools::optional_str(args, CREDENTIAL_ARG))?;
        tracing::debug!(tool = name, actor = %decision.actor_name(), "dispatching tool call");
        self.dispatcher.dispatch(name, args)
    }

    /// `encrypt(value, credential?) -> tagged_value`
    pub fn encrypt(&self, value: &str, credential: Option<&str>) -> Result<String> {
        self.authorize(None, credential)?;
        self.dispatcher.encrypt(value)
    }

    /// `decrypt(tagged_value, credential?) -> value`
    pub fn decrypt(&self, tagged_value: &str, credential: Option<&str>) -> Result<String> {
        self.authorize(None, credential)?;
        self.dispatcher.decrypt(tagged_value)
    }
}
