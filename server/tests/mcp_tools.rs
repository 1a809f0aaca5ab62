//! Integration tests for the MCP tools via `dispatch_jsonrpc()`.
//!
//! Each test builds an `Engine` over a small fixture log tree, then sends
//! JSON-RPC requests and validates the responses.

mod helpers;

use helpers::{fixture_window, TestHarness};
use serde_json::json;

// ---------------------------------------------------------------------------
// Protocol tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_initialize() {
    let mut h = TestHarness::new(&["hello world"]);
    let resp = h.initialize().await;

    let version = resp["result"]["protocolVersion"].as_str().unwrap();
    assert_eq!(version, "2025-11-25");

    let name = resp["result"]["serverInfo"]["name"].as_str().unwrap();
    assert_eq!(name, "logai");

    assert!(resp["result"]["capabilities"]["tools"].is_object());
}

#[tokio::test]
async fn test_tools_list_exposes_search_logs_and_read_spill() {
    let mut h = TestHarness::new(&["hello world"]);
    h.initialize().await;
    let msg = json!({ "jsonrpc": "2.0", "id": 2, "method": "tools/list" });
    let resp = h.dispatch(msg).await.unwrap();
    let names: Vec<&str> =
        resp["result"]["tools"].as_array().unwrap().iter().map(|t| t["name"].as_str().unwrap()).collect();
    assert!(names.contains(&"search_logs"));
    assert!(names.contains(&"read_spill"));
}

#[tokio::test]
async fn test_uninitialized_call_is_rejected() {
    // dispatch_jsonrpc itself doesn't enforce init-ordering (that's the
    // transport loop's job — see `run_mcp`), so this exercises that the
    // method still dispatches correctly once initialized is irrelevant
    // to the pure dispatch function; transport-level rejection is covered
    // implicitly by `run_mcp`'s stdio loop, which this harness bypasses.
    let mut h = TestHarness::new(&["hello world"]);
    let msg = json!({ "jsonrpc": "2.0", "id": 1, "method": "ping" });
    let resp = h.dispatch(msg).await.unwrap();
    assert_eq!(resp["result"], json!({}));
}

// ---------------------------------------------------------------------------
// search_logs tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_search_logs_finds_matching_lines() {
    let mut h = TestHarness::new(&["2026-01-15T09:05:00Z INFO startup", "2026-01-15T09:06:00Z ERROR disk full"]);
    h.initialize().await;
    let (start, end) = fixture_window();
    let (text, is_err) = h
        .call_tool(
            "search_logs",
            json!({ "service_name": "hub-ca-auth", "pattern": "ERROR", "start_time_utc": start, "end_time_utc": end }),
        )
        .await;
    assert!(!is_err, "search_logs returned error: {text}");
    assert!(text.contains("Found 1 match"), "expected one match: {text}");
    assert!(text.contains("disk full"), "expected matched line content: {text}");
}

#[tokio::test]
async fn test_search_logs_structured_format() {
    let mut h = TestHarness::new(&["ERROR one", "ERROR two"]);
    h.initialize().await;
    let (start, end) = fixture_window();
    let (text, is_err) = h
        .call_tool(
            "search_logs",
            json!({
                "service_name": "hub-ca-auth",
                "pattern": "ERROR",
                "start_time_utc": start,
                "end_time_utc": end,
                "format": "structured"
            }),
        )
        .await;
    assert!(!is_err, "search_logs returned error: {text}");
    let parsed: serde_json::Value = serde_json::from_str(&text).expect("structured output must be valid JSON");
    assert_eq!(parsed["metadata"]["total_matches"], 2);
    assert_eq!(parsed["matches"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_search_logs_unknown_service_reports_error() {
    let mut h = TestHarness::new(&["ERROR one"]);
    h.initialize().await;
    let (start, end) = fixture_window();
    let (text, is_err) = h
        .call_tool(
            "search_logs",
            json!({ "service_name": "totally-unknown", "pattern": "ERROR", "start_time_utc": start, "end_time_utc": end }),
        )
        .await;
    assert!(is_err, "expected an error for an unresolvable service: {text}");
    assert!(text.contains("No service matches"), "unexpected error text: {text}");
}

#[tokio::test]
async fn test_search_logs_missing_pattern_is_rejected() {
    let mut h = TestHarness::new(&["ERROR one"]);
    h.initialize().await;
    let (start, end) = fixture_window();
    let (text, is_err) =
        h.call_tool("search_logs", json!({ "service_name": "hub-ca-auth", "start_time_utc": start, "end_time_utc": end })).await;
    assert!(is_err);
    assert!(text.contains("pattern"), "expected a message about the missing pattern: {text}");
}

#[tokio::test]
async fn test_search_logs_repeat_call_is_cached() {
    let mut h = TestHarness::new(&["ERROR one"]);
    h.initialize().await;
    let (start, end) = fixture_window();
    let args = json!({ "service_name": "hub-ca-auth", "pattern": "ERROR", "start_time_utc": start, "end_time_utc": end, "format": "structured" });

    let (first, _) = h.call_tool("search_logs", args.clone()).await;
    let (second, _) = h.call_tool("search_logs", args).await;

    let first: serde_json::Value = serde_json::from_str(&first).unwrap();
    let second: serde_json::Value = serde_json::from_str(&second).unwrap();
    assert_eq!(first["metadata"]["cached"], false);
    assert_eq!(second["metadata"]["cached"], true);
    assert_eq!(first["metadata"]["total_matches"], second["metadata"]["total_matches"]);
}

#[tokio::test]
async fn test_search_logs_overflow_truncates_preview_and_spills_full_set() {
    let lines: Vec<String> = (0..12).map(|i| format!("ERROR line {i}")).collect();
    let lines_ref: Vec<&str> = lines.iter().map(|s| s.as_str()).collect();
    let mut h = TestHarness::with_preview_limit(&lines_ref, 10);
    h.initialize().await;
    let (start, end) = fixture_window();
    let (text, is_err) = h
        .call_tool(
            "search_logs",
            json!({
                "service_name": "hub-ca-auth",
                "pattern": "ERROR",
                "start_time_utc": start,
                "end_time_utc": end,
                "format": "structured"
            }),
        )
        .await;
    assert!(!is_err, "search_logs returned error: {text}");
    let result: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(result["metadata"]["total_matches"], 12);
    assert_eq!(result["metadata"]["overflow"], true);
    assert_eq!(result["matches"].as_array().unwrap().len(), 10);
    let saved_to = result["metadata"]["saved_to"].as_str().expect("overflowed result must spill");

    let (read_text, is_err) = h.call_tool("read_spill", json!({ "file_path": saved_to, "format": "structured" })).await;
    assert!(!is_err, "read_spill returned error: {read_text}");
    let read_result: serde_json::Value = serde_json::from_str(&read_text).unwrap();
    assert_eq!(read_result["metadata"]["total_matches"], 12);
}

#[tokio::test]
async fn test_search_logs_fuzzy_query_fans_out_across_locale_families() {
    let mut h = TestHarness::new_multi_locale("ERROR something broke");
    h.initialize().await;
    let (start, end) = fixture_window();
    let (text, is_err) = h
        .call_tool(
            "search_logs",
            json!({ "service_name": "auth", "pattern": "ERROR", "start_time_utc": start, "end_time_utc": end, "format": "structured" }),
        )
        .await;
    assert!(!is_err, "search_logs returned error: {text}");
    let result: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(result["metadata"]["total_matches"], 3);
    assert_eq!(result["metadata"]["services"].as_array().unwrap().len(), 3);
    assert_eq!(result["metadata"]["files_searched"], 3);
    let services: Vec<&str> = result["metadata"]["services"].as_array().unwrap().iter().map(|v| v.as_str().unwrap()).collect();
    assert!(services.contains(&"hub-ca-auth"));
    assert!(services.contains(&"hub-us-auth"));
    assert!(services.contains(&"hub-na-auth"));
}

// ---------------------------------------------------------------------------
// read_spill tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_read_spill_round_trips_search_results() {
    let mut h = TestHarness::new(&["ERROR one", "ERROR two", "ERROR three"]);
    h.initialize().await;
    let (start, end) = fixture_window();
    let (search_text, _) = h
        .call_tool(
            "search_logs",
            json!({
                "service_name": "hub-ca-auth",
                "pattern": "ERROR",
                "start_time_utc": start,
                "end_time_utc": end,
                "format": "structured"
            }),
        )
        .await;
    let search_result: serde_json::Value = serde_json::from_str(&search_text).unwrap();
    let saved_to = search_result["metadata"]["saved_to"].as_str().expect("search_logs must always spill").to_string();

    let (read_text, is_err) = h.call_tool("read_spill", json!({ "file_path": saved_to, "format": "structured" })).await;
    assert!(!is_err, "read_spill returned error: {read_text}");
    let read_result: serde_json::Value = serde_json::from_str(&read_text).unwrap();
    assert_eq!(read_result["metadata"]["total_matches"], 3);
}

#[tokio::test]
async fn test_read_spill_rejects_path_outside_root() {
    let mut h = TestHarness::new(&["ERROR one"]);
    h.initialize().await;
    let (start, end) = fixture_window();
    // Establish the spill root on disk so this exercises the
    // outside-the-root check rather than failing on a missing directory.
    h.call_tool("search_logs", json!({ "service_name": "hub-ca-auth", "pattern": "ERROR", "start_time_utc": start, "end_time_utc": end }))
        .await;

    let outside = tempfile::tempdir().unwrap();
    let evil = outside.path().join("logai-search-20260101-000000-evil-aaaaaaaa.json");
    std::fs::write(&evil, b"[]").unwrap();

    let (text, is_err) = h.call_tool("read_spill", json!({ "file_path": evil.to_string_lossy() })).await;
    assert!(is_err, "expected an error for a path outside the spill root: {text}");
}

#[tokio::test]
async fn test_read_spill_rejects_missing_file() {
    let mut h = TestHarness::new(&["ERROR one"]);
    h.initialize().await;
    let (start, end) = fixture_window();
    // Any search establishes the spill root on disk.
    h.call_tool("search_logs", json!({ "service_name": "hub-ca-auth", "pattern": "ERROR", "start_time_utc": start, "end_time_utc": end }))
        .await;

    let missing = h.engine.config.spill_root.join("logai-search-20260101-000000-missing-aaaaaaaa.json");
    let (text, is_err) = h.call_tool("read_spill", json!({ "file_path": missing.to_string_lossy() })).await;
    assert!(is_err, "expected an error for a nonexistent spill file: {text}");
}

#[tokio::test]
async fn test_read_spill_missing_file_path_argument() {
    let mut h = TestHarness::new(&["ERROR one"]);
    h.initialize().await;
    let (text, is_err) = h.call_tool("read_spill", json!({})).await;
    assert!(is_err);
    assert!(text.contains("file_path"));
}
