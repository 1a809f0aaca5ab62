//! Transport-level state shared by the stdio and streamable-HTTP MCP
//! transports: session bookkeeping, HTTP app context, and the config
//! controlling origin validation and OAuth discovery.

use dashmap::DashMap;
use logai_core::Engine;
use std::sync::Arc;
use std::time::Instant;

/// Per-session JSON-RPC state. Currently just tracks whether `initialize`
/// has completed; room to grow (e.g. negotiated capabilities) without
/// disturbing callers that thread `Option<SessionState>` through dispatch.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub initialized: bool,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// One streamable-HTTP session: the negotiated protocol version, the
/// stdio-equivalent dispatch state, and an idle-eviction timestamp.
pub struct McpSession {
    pub protocol_version: String,
    pub session_state: SessionState,
    pub last_activity: Instant,
}

impl McpSession {
    pub fn new(protocol_version: String) -> Self {
        Self { protocol_version, session_state: SessionState::new(), last_activity: Instant::now() }
    }
}

/// Origin allowlist and OAuth discovery settings for the HTTP transport.
pub struct McpConfig {
    pub allowed_origins: Vec<String>,
    pub auth_issuer: Option<String>,
    pub server_url: String,
}

impl McpConfig {
    pub fn auth_enabled(&self) -> bool {
        self.auth_issuer.is_some()
    }
}

/// Axum application state for the MCP HTTP transport: the engine plus the
/// live session table.
#[derive(Clone)]
pub struct McpAppContext {
    pub engine: Arc<Engine>,
    pub sessions: Arc<DashMap<String, McpSession>>,
    pub config: Arc<McpConfig>,
}
