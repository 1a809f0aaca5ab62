//! Housekeeping: the two background tasks `spec.md` §4.G describes — spill
//! retention sweeps and a coordination heartbeat. Both run at wide
//! intervals and are tolerant of individual iteration failures: a failed
//! sweep is logged and the loop continues on its next tick rather than
//! exiting.

use crate::coordination::Coordination;
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Parse the `<yyyymmdd-hhmmss>` timestamp embedded in a spill filename
/// (see `presenter::spill_filename`'s grammar). Returns `None` for any
/// entry that doesn't look like a spill file — those are left alone.
fn embedded_timestamp(file_name: &str) -> Option<chrono::DateTime<Utc>> {
    let rest = file_name.strip_prefix("logai-search-").or_else(|| file_name.strip_prefix("logai-partial-"))?;
    let ts = rest.get(0..15)?; // yyyymmdd-hhmmss
    chrono::NaiveDateTime::parse_from_str(ts, "%Y%m%d-%H%M%S").ok().map(|naive| naive.and_utc())
}

/// Delete spill files under `spill_root` whose embedded timestamp is older
/// than `retention`. Returns the number of files removed. A single
/// unreadable or malformed entry does not abort the sweep — it's skipped.
pub async fn sweep_spill_directory(spill_root: &Path, retention: Duration) -> usize {
    let cutoff = Utc::now() - chrono::Duration::from_std(retention).unwrap_or(chrono::Duration::zero());
    let mut removed = 0;

    let mut entries = match tokio::fs::read_dir(spill_root).await {
        Ok(e) => e,
        Err(e) => {
            tracing::warn!(error = %e, root = %spill_root.display(), "spill retention sweep: could not read directory");
            return 0;
        }
    };

    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(e)) => e,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, "spill retention sweep: error reading directory entry");
                break;
            }
        };
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else { continue };
        let Some(ts) = embedded_timestamp(name) else { continue };
        if ts < cutoff {
            if let Err(e) = tokio::fs::remove_file(entry.path()).await {
                tracing::warn!(error = %e, path = %entry.path().display(), "spill retention sweep: failed to remove file");
            } else {
                removed += 1;
            }
        }
    }

    removed
}

/// Run the spill retention sweep forever, once per `retention_check_interval`.
/// Intended to be `tokio::spawn`ed once at startup and left running until
/// the process shuts down.
pub async fn run_retention_task(spill_root: std::path::PathBuf, retention: Duration, check_interval: Duration) {
    let mut ticker = tokio::time::interval(check_interval);
    loop {
        ticker.tick().await;
        let removed = sweep_spill_directory(&spill_root, retention).await;
        if removed > 0 {
            tracing::info!(removed, root = %spill_root.display(), "spill retention sweep complete");
        }
    }
}

/// Run the coordination heartbeat forever, once per `interval`. Delegates
/// the actual sampling to the active `Coordination` implementation (local
/// or distributed) — this task just drives the clock.
pub async fn run_heartbeat_task(coordination: Arc<dyn Coordination>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        coordination.heartbeat().await;
    }
}
