//! Coordination Layer: the facade over the Global Admission Semaphore,
//! Shared Result Cache, and Metrics Sink. Local (in-process) and
//! distributed (Redis-backed) implementations satisfy the same trait; the
//! Search Executor never branches on which is in use — the choice is made
//! once at startup from `EngineConfig::shared_store_url`.

pub mod local;
#[cfg(feature = "redis-coordination")]
pub mod redis_backed;
pub mod metrics;

use crate::error::SearchError;
use crate::types::{CacheEntry, Fingerprint, ResultSet};
use async_trait::async_trait;

/// An RAII-style admission slot. Dropping it releases the slot. Releasing
/// is best-effort — failures are logged, never surfaced to the caller.
pub trait AdmissionGuard: Send + Sync {}

/// Facade over the three coordination primitives `spec.md` §4.C describes.
/// `Send + Sync` because the engine is shared across concurrently running
/// searches.
#[async_trait]
pub trait Coordination: Send + Sync {
    /// Acquire one global admission slot. Blocks (cooperatively) until a
    /// slot is free. Returns a guard; dropping it releases the slot. Only
    /// the distributed implementation can fail here (bounded retries
    /// exhausted under sustained contention); the local implementation
    /// never does.
    async fn acquire_global(&self) -> Result<Box<dyn AdmissionGuard>, SearchError>;

    /// Instantiate a per-call sub-semaphore with the given capacity. The
    /// capacity is `min(per_call_cap, num_services)` — never larger than
    /// the global cap, and never larger than the work actually available.
    fn sub_semaphore(&self, capacity: usize) -> local::SubSemaphore;

    /// Look up a cache entry by fingerprint. Implementations apply their
    /// own TTL/staleness rules; a returned `None` always means "treat as
    /// a miss," regardless of why.
    async fn cache_get(&self, fingerprint: &Fingerprint) -> Option<ResultSet>;

    /// Insert a result into the cache. Best-effort: implementations may
    /// silently skip oversized entries or evict to make room. Never
    /// errors back to the caller.
    async fn cache_put(&self, fingerprint: &Fingerprint, result: &ResultSet);

    fn metrics(&self) -> &dyn metrics::MetricsSink;

    /// Sample admission-slot and connection-pool status for the
    /// Housekeeping heartbeat (`spec.md` §4.G).
    async fn heartbeat(&self);
}

/// Byte size estimate of a serialized cache candidate, used for the
/// byte-cap and the "entries over 1/10 of the cap are silently skipped"
/// rule in `spec.md` §4.C.2.
pub fn estimate_byte_size(result: &ResultSet) -> u64 {
    serde_json::to_vec(result).map(|v| v.len() as u64).unwrap_or(0)
}

pub(crate) fn too_large_for_cache(byte_size: u64, cap: u64) -> bool {
    byte_size > cap / 10
}

pub(crate) fn make_cache_entry(fingerprint: &Fingerprint, result: ResultSet, ttl_seconds: u64) -> CacheEntry {
    CacheEntry {
        fingerprint_digest: fingerprint.digest(),
        byte_size: estimate_byte_size(&result),
        result,
        inserted_at: chrono::Utc::now(),
        ttl_seconds,
    }
}
