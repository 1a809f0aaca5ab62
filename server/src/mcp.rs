//! MCP JSON-RPC server implementing the Model Context Protocol.
//!
//! Exposes the two operations `spec.md` §6 names as inbound interfaces —
//! `search_logs` (the Search Executor's `search` operation) and
//! `read_spill` (the Presenter's read-back operation) — as MCP tools.
//! Protocol version negotiation and the JSON-RPC envelope follow the same
//! shape regardless of which transport (stdio or streamable HTTP) carries
//! the request.

use crate::types::SessionState;
use logai_core::executor::{Engine, NullProgressSink, SearchRequest};
use logai_core::types::{MatchContent, TimeWindow};
use std::io::{self, BufRead, Write as IoWrite};
use std::sync::Arc;

const SUPPORTED_VERSIONS: &[&str] = &["2025-11-25", "2025-03-26"];
const LATEST_VERSION: &str = "2025-11-25";

/// Negotiate protocol version: echo the client's version if supported,
/// else fall back to the latest this server speaks.
pub(crate) fn negotiate_version(client_version: &str) -> &'static str {
    if SUPPORTED_VERSIONS.contains(&client_version) {
        SUPPORTED_VERSIONS.iter().find(|&&v| v == client_version).copied().unwrap()
    } else {
        LATEST_VERSION
    }
}

// ---------------------------------------------------------------------------
// Tool definitions
// ---------------------------------------------------------------------------

fn tool_definitions() -> serde_json::Value {
    let ro = serde_json::json!({
        "readOnlyHint": true,
        "destructiveHint": false,
        "idempotentHint": true,
        "openWorldHint": false
    });

    serde_json::json!([
        {
            "name": "search_logs",
            "annotations": ro,
            "description": "Search one or more services' logs for a literal pattern over a UTC time window. Fans out across resolved services, streams matches back, and always persists the full result to a spill file — the response is a bounded preview plus metadata (total_matches, overflow, cached, partial, saved_to).",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "service_name": {
                        "description": "A service name or list of service names, resolved fuzzily against the catalog.",
                        "oneOf": [
                            { "type": "string" },
                            { "type": "array", "items": { "type": "string" } }
                        ]
                    },
                    "locale": { "type": "string", "enum": ["ca", "us", "na"], "description": "Restricts resolution to a locale-qualified family of services." },
                    "pattern": { "type": "string", "description": "Literal pattern to search for, case-insensitive." },
                    "start_time_utc": { "type": "string", "description": "RFC3339 UTC timestamp, inclusive window start." },
                    "end_time_utc": { "type": "string", "description": "RFC3339 UTC timestamp, exclusive window end; must be >= start_time_utc." },
                    "format": { "type": "string", "enum": ["text", "structured"], "description": "Output shape. Default: text." }
                },
                "required": ["service_name", "pattern", "start_time_utc", "end_time_utc"]
            }
        },
        {
            "name": "read_spill",
            "annotations": ro,
            "description": "Read back the full match list a previous search_logs call spilled to disk. Rejects paths outside the configured output root or without the documented filename prefix.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "file_path": { "type": "string", "description": "Absolute path to a spill file, as returned in a previous search_logs response's saved_to field." },
                    "format": { "type": "string", "enum": ["text", "structured"], "description": "Output shape. Default: text." }
                },
                "required": ["file_path"]
            }
        }
    ])
}

// ---------------------------------------------------------------------------
// Tool handlers
// ---------------------------------------------------------------------------

fn service_names_from(args: &serde_json::Value) -> Result<Vec<String>, String> {
    match args.get("service_name") {
        Some(serde_json::Value::String(s)) => Ok(vec![s.clone()]),
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .map(|v| v.as_str().map(|s| s.to_string()).ok_or_else(|| "service_name entries must be strings".to_string()))
            .collect(),
        _ => Err("service_name is required (string or array of strings)".to_string()),
    }
}

fn format_match(m: &logai_core::types::Match) -> String {
    let content = match &m.content {
        MatchContent::Json(v) => v.to_string(),
        MatchContent::Raw(s) => s.clone(),
    };
    format!("[{}] {}:{}: {}", m.service, m.file_path, m.line_number, content)
}

async fn handle_search_logs(engine: &Engine, args: &serde_json::Value) -> (String, bool) {
    let services = match service_names_from(args) {
        Ok(s) => s,
        Err(e) => return (e, true),
    };
    let pattern = match args.get("pattern").and_then(|v| v.as_str()) {
        Some(p) => p.to_string(),
        None => return ("pattern is required".to_string(), true),
    };
    let start = match args.get("start_time_utc").and_then(|v| v.as_str()).and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok()) {
        Some(t) => t.with_timezone(&chrono::Utc),
        None => return ("start_time_utc must be an RFC3339 UTC timestamp".to_string(), true),
    };
    let end = match args.get("end_time_utc").and_then(|v| v.as_str()).and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok()) {
        Some(t) => t.with_timezone(&chrono::Utc),
        None => return ("end_time_utc must be an RFC3339 UTC timestamp".to_string(), true),
    };
    let window = match TimeWindow::new(start, end) {
        Ok(w) => w,
        Err(e) => return (e.to_string(), true),
    };
    let locale = args.get("locale").and_then(|v| v.as_str()).map(|s| s.to_string());
    let format = args.get("format").and_then(|v| v.as_str()).unwrap_or("text");

    let request = SearchRequest { service_queries: services, locale, pattern, window, preview_limit: None };
    match engine.search(request, Arc::new(NullProgressSink)).await {
        Ok(result) => {
            if format == "structured" {
                (serde_json::to_string_pretty(&result).unwrap_or_else(|e| format!("failed to encode result: {e}")), false)
            } else {
                let mut out = format!(
                    "Found {} match(es) across {} service(s), {} file(s) searched in {:.2}s{}{}.\n",
                    result.metadata.total_matches,
                    result.metadata.services.len(),
                    result.metadata.files_searched,
                    result.metadata.duration_seconds,
                    if result.metadata.cached { " (cached)" } else { "" },
                    if result.metadata.overflow { " (overflowed, see saved_to for full results)" } else { "" },
                );
                if let Some(err) = &result.metadata.error {
                    out.push_str(&format!("partial result: {err}\n"));
                }
                if let Some(saved_to) = &result.metadata.saved_to {
                    out.push_str(&format!("full results saved to: {saved_to}\n"));
                }
                for m in &result.matches {
                    out.push_str(&format_match(m));
                    out.push('\n');
                }
                (out, false)
            }
        }
        Err(e) => (e.to_string(), true),
    }
}

async fn handle_read_spill(engine: &Engine, args: &serde_json::Value) -> (String, bool) {
    let file_path = match args.get("file_path").and_then(|v| v.as_str()) {
        Some(p) => p,
        None => return ("file_path is required".to_string(), true),
    };
    let format = args.get("format").and_then(|v| v.as_str()).unwrap_or("text");
    let path = std::path::Path::new(file_path);

    match logai_core::presenter::read_spill(&engine.config.spill_root, path, engine.config.spill_read_cap_bytes).await {
        Ok(result) => {
            if format == "structured" {
                (serde_json::to_string_pretty(&result).unwrap_or_else(|e| format!("failed to encode result: {e}")), false)
            } else {
                let mut out = format!("{} match(es) in {file_path}.\n", result.metadata.total_matches);
                for m in &result.matches {
                    out.push_str(&format_match(m));
                    out.push('\n');
                }
                (out, false)
            }
        }
        Err(e) => (e.to_string(), true),
    }
}

async fn handle_tool_call(engine: &Engine, name: &str, args: &serde_json::Value) -> (String, bool) {
    match name {
        "search_logs" => handle_search_logs(engine, args).await,
        "read_spill" => handle_read_spill(engine, args).await,
        _ => (format!("Unknown tool: {name}"), true),
    }
}

// ---------------------------------------------------------------------------
// Shared JSON-RPC dispatch (used by both stdio and HTTP transports)
// ---------------------------------------------------------------------------

/// Process a single JSON-RPC request and return the response. Returns
/// `None` for notifications (no `id` field) — the caller assumes init
/// ordering has already been enforced.
pub async fn dispatch_jsonrpc(
    engine: &Arc<Engine>,
    msg: &serde_json::Value,
    session: &mut Option<SessionState>,
) -> Option<serde_json::Value> {
    let method = msg["method"].as_str().unwrap_or("");
    let id = msg.get("id").cloned();

    if id.is_none() || method.starts_with("notifications/") {
        return None;
    }

    let response = match method {
        "initialize" => {
            let client_version = msg["params"]["protocolVersion"].as_str().unwrap_or("");
            let negotiated = negotiate_version(client_version);
            if let Some(s) = session {
                s.initialized = true;
            }
            serde_json::json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": {
                    "protocolVersion": negotiated,
                    "capabilities": { "tools": { "listChanged": false } },
                    "serverInfo": { "name": "logai", "version": env!("CARGO_PKG_VERSION") },
                    "instructions": "logai searches service logs over a UTC time window. Use search_logs first; if its response is overflowed, use read_spill with the returned saved_to path to retrieve the full match list."
                }
            })
        }
        "tools/list" => {
            serde_json::json!({ "jsonrpc": "2.0", "id": id, "result": { "tools": tool_definitions() } })
        }
        "tools/call" => {
            let tool_name = msg["params"]["name"].as_str().unwrap_or("");
            let arguments = msg["params"].get("arguments").cloned().unwrap_or(serde_json::json!({}));
            let (text, is_error) = handle_tool_call(engine, tool_name, &arguments).await;
            serde_json::json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": { "content": [{ "type": "text", "text": text }], "isError": is_error }
            })
        }
        "ping" => serde_json::json!({ "jsonrpc": "2.0", "id": id, "result": {} }),
        _ => serde_json::json!({ "jsonrpc": "2.0", "id": id, "error": { "code": -32601, "message": "Method not found" } }),
    };

    Some(response)
}

// ---------------------------------------------------------------------------
// MCP stdio server loop
// ---------------------------------------------------------------------------

/// Run the MCP stdio server loop, reading JSON-RPC from stdin and writing
/// responses to stdout, one request per line.
pub async fn run_mcp(engine: Arc<Engine>) {
    tracing::info!("MCP stdio server ready");
    let mut session = Some(SessionState::new());
    let mut initialized = false;

    let stdin = io::stdin();
    let stdout = io::stdout();
    let reader = stdin.lock();

    for line in reader.lines() {
        let line = match line {
            Ok(l) => l,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let msg: serde_json::Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(_) => {
                let err = serde_json::json!({ "jsonrpc": "2.0", "id": null, "error": { "code": -32700, "message": "Parse error" } });
                let mut out = stdout.lock();
                let _ = writeln!(out, "{err}");
                let _ = out.flush();
                continue;
            }
        };

        let method = msg["method"].as_str().unwrap_or("");
        if method == "notifications/initialized" || method == "notifications/cancelled" {
            continue;
        }

        if !initialized && method != "initialize" && method != "ping" {
            if let Some(id) = msg.get("id").cloned() {
                let err = serde_json::json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "error": { "code": -32002, "message": "Server not initialized. Send 'initialize' first." }
                });
                let mut out = stdout.lock();
                let _ = writeln!(out, "{}", serde_json::to_string(&err).unwrap());
                let _ = out.flush();
            }
            continue;
        }

        if let Some(response) = dispatch_jsonrpc(&engine, &msg, &mut session).await {
            if method == "initialize" {
                initialized = true;
            }
            let mut out = stdout.lock();
            let _ = writeln!(out, "{}", serde_json::to_string(&response).unwrap());
            let _ = out.flush();
        }
    }
}
