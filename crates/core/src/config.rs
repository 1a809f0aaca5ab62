//! Engine configuration, loaded once at startup and never hot-reloaded.
//!
//! Defaults mirror the donor implementation's Redis coordinator constants
//! where one exists (`original_source/src/redis_coordinator.py`); values
//! with no original analog (preview limit, deadline) use the figures from
//! the worked examples in the specification.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

fn default_global_admission_cap() -> usize {
    10
}
fn default_per_call_cap() -> usize {
    5
}
fn default_cache_byte_cap() -> u64 {
    100 * 1024 * 1024
}
fn default_cache_entry_cap() -> usize {
    1000
}
fn default_cache_ttl_seconds() -> u64 {
    3600
}
fn default_deadline_seconds() -> u64 {
    30
}
fn default_preview_limit() -> usize {
    100
}
fn default_spill_root() -> PathBuf {
    PathBuf::from("./logai-output")
}
fn default_retention_seconds() -> u64 {
    7 * 24 * 3600
}
fn default_progress_small_threshold() -> u64 {
    10
}
fn default_progress_large_threshold() -> u64 {
    100
}
fn default_progress_min_interval_seconds() -> u64 {
    2
}
fn default_heartbeat_interval_seconds() -> u64 {
    300
}

/// Everything the engine needs to know at startup. Loaded from an optional
/// TOML file and layered over the defaults above; the shared-store
/// connection URL may additionally be overridden by the `LOGAI_REDIS_URL`
/// environment variable, since that is the one value that legitimately
/// varies per deployment.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    #[serde(default = "default_global_admission_cap")]
    pub global_admission_cap: usize,
    #[serde(default = "default_per_call_cap")]
    pub per_call_cap: usize,
    #[serde(default = "default_cache_byte_cap")]
    pub cache_byte_cap: u64,
    #[serde(default = "default_cache_entry_cap")]
    pub cache_entry_cap: usize,
    #[serde(default = "default_cache_ttl_seconds")]
    pub cache_ttl_seconds: u64,
    #[serde(default = "default_deadline_seconds")]
    pub deadline_seconds: u64,
    #[serde(default = "default_preview_limit")]
    pub preview_limit: usize,
    #[serde(default = "default_spill_root")]
    pub spill_root: PathBuf,
    #[serde(default = "default_retention_seconds")]
    pub retention_seconds: u64,
    #[serde(default = "default_progress_small_threshold")]
    pub progress_small_threshold: u64,
    #[serde(default = "default_progress_large_threshold")]
    pub progress_large_threshold: u64,
    #[serde(default = "default_progress_min_interval_seconds")]
    pub progress_min_interval_seconds: u64,
    #[serde(default = "default_heartbeat_interval_seconds")]
    pub heartbeat_interval_seconds: u64,
    /// `None` selects the in-process Coordination Layer. `Some(url)`
    /// selects the distributed, Redis-backed implementation.
    #[serde(default)]
    pub shared_store_url: Option<String>,
    /// Path to the catalog TOML document. Required — the catalog cannot
    /// be empty per `spec.md` §3.
    pub catalog_path: PathBuf,
    /// File-size cap enforced on `read_spill`.
    #[serde(default = "default_spill_read_cap")]
    pub spill_read_cap_bytes: u64,
}

fn default_spill_read_cap() -> u64 {
    50 * 1024 * 1024
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            global_admission_cap: default_global_admission_cap(),
            per_call_cap: default_per_call_cap(),
            cache_byte_cap: default_cache_byte_cap(),
            cache_entry_cap: default_cache_entry_cap(),
            cache_ttl_seconds: default_cache_ttl_seconds(),
            deadline_seconds: default_deadline_seconds(),
            preview_limit: default_preview_limit(),
            spill_root: default_spill_root(),
            retention_seconds: default_retention_seconds(),
            progress_small_threshold: default_progress_small_threshold(),
            progress_large_threshold: default_progress_large_threshold(),
            progress_min_interval_seconds: default_progress_min_interval_seconds(),
            heartbeat_interval_seconds: default_heartbeat_interval_seconds(),
            shared_store_url: None,
            catalog_path: PathBuf::from("./services.toml"),
            spill_read_cap_bytes: default_spill_read_cap(),
        }
    }
}

impl EngineConfig {
    /// Load from a TOML file, falling back to defaults for any field the
    /// file omits. The `catalog_path` field is still required in the file
    /// (or must be set afterward) since there is no sane default for it.
    pub fn load(path: &std::path::Path) -> Result<Self, String> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read config file {}: {e}", path.display()))?;
        let mut cfg: Self = toml::from_str(&text)
            .map_err(|e| format!("failed to parse config file {}: {e}", path.display()))?;
        if let Ok(url) = std::env::var("LOGAI_REDIS_URL") {
            cfg.shared_store_url = Some(url);
        }
        Ok(cfg)
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_seconds)
    }

    pub fn progress_min_interval(&self) -> Duration {
        Duration::from_secs(self.progress_min_interval_seconds)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_seconds)
    }
}
