//! Scanner Adapter: wraps an external line-scanner child process and
//! streams its output into `Match` records.
//!
//! Prefers `rg` (ripgrep) — a single process that already scans many
//! files in parallel, case-insensitively, emitting `file:line:content`.
//! When `rg` is not on `PATH`, falls back to piping a NUL-delimited file
//! list through `xargs -0` into `grep`, which is the second, slower
//! backend `spec.md` §4.D describes as the fallback fan-out wrapper.
//! Undefined behavior (per `spec.md` §9) on a host with neither binary —
//! that case surfaces as a `ScannerFailed` launch error.

use crate::types::{Match, MatchContent};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

/// A streamed scan progress/result event, fed into the Search Executor's
/// aggregator as matches arrive — never buffered all at once.
pub enum ScanEvent {
    Match(Match),
    /// Scanner exited. `Ok(())` if matches (possibly zero) were produced
    /// cleanly; `Err` carries a diagnostic built from captured stderr.
    Done(Result<(), String>),
}

async fn which(bin: &str) -> bool {
    Command::new("which").arg(bin).stdout(Stdio::null()).stderr(Stdio::null()).status().await.map(|s| s.success()).unwrap_or(false)
}

/// Scan `paths` for `pattern`, tagging every match with `service`. Streams
/// events to `tx` as they are produced; never buffers the full match list
/// in memory before returning.
pub async fn scan(paths: &[String], pattern: &str, service: &str, tx: mpsc::Sender<ScanEvent>) {
    if paths.is_empty() {
        let _ = tx.send(ScanEvent::Done(Ok(()))).await;
        return;
    }

    let result = if which("rg").await {
        scan_with_ripgrep(paths, pattern, service, &tx).await
    } else if which("grep").await {
        scan_with_xargs_grep(paths, pattern, service, &tx).await
    } else {
        Err("no line-scanner backend (rg or grep) found on PATH".to_string())
    };

    let _ = tx.send(ScanEvent::Done(result)).await;
}

async fn scan_with_ripgrep(
    paths: &[String],
    pattern: &str,
    service: &str,
    tx: &mpsc::Sender<ScanEvent>,
) -> Result<(), String> {
    let mut cmd = Command::new("rg");
    cmd.arg("--no-heading")
        .arg("--with-filename")
        .arg("--line-number")
        .arg("--ignore-case")
        .arg("--no-messages")
        .arg("--")
        .arg(pattern)
        .args(paths)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(|e| format!("failed to launch rg: {e}"))?;
    let stdout = child.stdout.take().expect("piped stdout");
    let stderr = child.stderr.take().expect("piped stderr");

    let mut produced_any = false;
    {
        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines.next_line().await.map_err(|e| format!("reading scanner stdout: {e}"))? {
            if let Some(m) = parse_match_line(&line, service) {
                produced_any = true;
                if tx.send(ScanEvent::Match(m)).await.is_err() {
                    // Receiver dropped (deadline expired, search cancelled) — stop reading.
                    let _ = child.start_kill();
                    return Ok(());
                }
            }
        }
    }

    let stderr_text = read_to_string_lossy(stderr).await;
    let status = child.wait().await.map_err(|e| format!("waiting on scanner: {e}"))?;

    // rg exits 1 for "no matches found" — not an error.
    if status.success() || (!status.success() && produced_any) {
        Ok(())
    } else if !status.success() && !produced_any && stderr_text.trim().is_empty() {
        Ok(())
    } else {
        Err(format!("rg exited with {status}: {}", stderr_text.trim()))
    }
}

async fn scan_with_xargs_grep(
    paths: &[String],
    pattern: &str,
    service: &str,
    tx: &mpsc::Sender<ScanEvent>,
) -> Result<(), String> {
    let mut xargs = Command::new("xargs")
        .arg("-0")
        .arg("grep")
        .arg("-H")
        .arg("-n")
        .arg("-i")
        .arg("--")
        .arg(pattern)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| format!("failed to launch xargs/grep: {e}"))?;

    let mut stdin = xargs.stdin.take().expect("piped stdin");
    let file_list: String = paths.iter().map(|p| format!("{p}\0")).collect();
    tokio::spawn(async move {
        let _ = stdin.write_all(file_list.as_bytes()).await;
        let _ = stdin.shutdown().await;
    });

    let stdout = xargs.stdout.take().expect("piped stdout");
    let stderr = xargs.stderr.take().expect("piped stderr");

    let mut produced_any = false;
    {
        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines.next_line().await.map_err(|e| format!("reading scanner stdout: {e}"))? {
            if let Some(m) = parse_match_line(&line, service) {
                produced_any = true;
                if tx.send(ScanEvent::Match(m)).await.is_err() {
                    let _ = xargs.start_kill();
                    return Ok(());
                }
            }
        }
    }

    let stderr_text = read_to_string_lossy(stderr).await;
    let status = xargs.wait().await.map_err(|e| format!("waiting on scanner: {e}"))?;

    if status.success() || produced_any || stderr_text.trim().is_empty() {
        Ok(())
    } else {
        Err(format!("grep exited with {status}: {}", stderr_text.trim()))
    }
}

async fn read_to_string_lossy(stderr: impl tokio::io::AsyncRead + Unpin) -> String {
    let mut out = String::new();
    let mut reader = BufReader::new(stderr);
    let _ = tokio::io::AsyncBufReadExt::read_to_string(&mut reader, &mut out).await;
    out
}

/// Parse a `file:line:content` line, splitting on the first two colons.
/// Content is JSON-decoded when it parses as JSON, kept as a raw string
/// otherwise.
fn parse_match_line(line: &str, service: &str) -> Option<Match> {
    let first_colon = line.find(':')?;
    let (file_path, rest) = line.split_at(first_colon);
    let rest = &rest[1..];
    let second_colon = rest.find(':')?;
    let (line_no, content) = rest.split_at(second_colon);
    let content = &content[1..];
    let line_number: u64 = line_no.parse().ok()?;

    Some(Match {
        service: service.to_string(),
        file_path: file_path.to_string(),
        line_number,
        content: MatchContent::from_line(content),
    })
}
