//! Test harness for MCP tool integration tests.
//!
//! Builds an `Engine` from a fixture catalog and log tree in a temp dir,
//! dispatches JSON-RPC requests via `dispatch_jsonrpc()` directly — no
//! subprocess, no HTTP.

pub mod fixtures;

use logai_core::coordination::local::LocalCoordination;
use logai_core::{Engine, EngineConfig};
use logai_server::mcp::dispatch_jsonrpc;
use logai_server::types::SessionState;
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;

pub struct TestHarness {
    pub engine: Arc<Engine>,
    pub session: Option<SessionState>,
    _temp_dir: TempDir,
}

impl TestHarness {
    /// Build a harness with a one-service catalog whose log tree contains
    /// `lines`, one per fixture log line.
    pub fn new(lines: &[&str]) -> Self {
        Self::with_preview_limit(lines, EngineConfig::default().preview_limit)
    }

    /// Same as [`Self::new`], but with a custom `preview_limit` — used by
    /// tests that exercise the overflow path without writing hundreds of
    /// fixture lines.
    pub fn with_preview_limit(lines: &[&str], preview_limit: usize) -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let root = temp_dir.path();
        let catalog_path = fixtures::write_catalog(root, lines);

        let config = EngineConfig {
            catalog_path: catalog_path.clone(),
            spill_root: root.join("spill"),
            deadline_seconds: 5,
            preview_limit,
            ..EngineConfig::default()
        };
        let catalog = logai_core::catalog::load_catalog(&catalog_path).expect("failed to load fixture catalog");
        let coordination = LocalCoordination::new(
            config.global_admission_cap,
            config.cache_byte_cap,
            config.cache_entry_cap,
            config.cache_ttl_seconds,
            config.catalog_path.clone(),
        );

        let engine = Engine { catalog: Arc::new(catalog), coordination: Arc::new(coordination), config: Arc::new(config) };

        TestHarness { engine: Arc::new(engine), session: Some(SessionState::new()), _temp_dir: temp_dir }
    }

    /// Build a harness over the three-locale-family fixture catalog (see
    /// [`fixtures::write_multi_locale_catalog`]), used by fuzzy multi-service
    /// resolution tests.
    pub fn new_multi_locale(line: &str) -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let root = temp_dir.path();
        let catalog_path = fixtures::write_multi_locale_catalog(root, line);

        let config = EngineConfig {
            catalog_path: catalog_path.clone(),
            spill_root: root.join("spill"),
            deadline_seconds: 5,
            ..EngineConfig::default()
        };
        let catalog = logai_core::catalog::load_catalog(&catalog_path).expect("failed to load fixture catalog");
        let coordination = LocalCoordination::new(
            config.global_admission_cap,
            config.cache_byte_cap,
            config.cache_entry_cap,
            config.cache_ttl_seconds,
            config.catalog_path.clone(),
        );

        let engine = Engine { catalog: Arc::new(catalog), coordination: Arc::new(coordination), config: Arc::new(config) };

        TestHarness { engine: Arc::new(engine), session: Some(SessionState::new()), _temp_dir: temp_dir }
    }

    /// Send a JSON-RPC request and return the response.
    pub async fn dispatch(&mut self, msg: Value) -> Option<Value> {
        dispatch_jsonrpc(&self.engine, &msg, &mut self.session).await
    }

    /// Call an MCP tool by name with the given arguments. Returns (text, is_error).
    pub async fn call_tool(&mut self, tool: &str, args: Value) -> (String, bool) {
        let msg = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tools/call",
            "params": { "name": tool, "arguments": args }
        });
        let resp = self.dispatch(msg).await.expect("expected response for tools/call");
        let result = &resp["result"];
        let text = result["content"][0]["text"].as_str().unwrap_or("").to_string();
        let is_error = result["isError"].as_bool().unwrap_or(false);
        (text, is_error)
    }

    /// Send an initialize request and return the response.
    pub async fn initialize(&mut self) -> Value {
        let msg = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "initialize",
            "params": {
                "protocolVersion": "2025-11-25",
                "capabilities": {},
                "clientInfo": { "name": "test", "version": "0.1.0" }
            }
        });
        self.dispatch(msg).await.expect("expected initialize response")
    }
}

/// RFC3339 bounds of the fixture hour: the full hour the fixture's log
/// file lives under, as a half-open `[start, end)` window.
pub fn fixture_window() -> (String, String) {
    let (y, m, d, h) = fixtures::FIXTURE_HOUR;
    (format!("{y:04}-{m:02}-{d:02}T{h:02}:00:00Z"), format!("{y:04}-{m:02}-{d:02}T{:02}:00:00Z", h + 1))
}
