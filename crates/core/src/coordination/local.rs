//! In-process Coordination Layer: a counting semaphore for admission, a
//! `DashMap`-backed LRU cache with TTL-on-read eviction, and a
//! `tracing`-only metrics sink. No fairness guarantee on the semaphore —
//! matches the donor's reliance on `tokio::sync::Semaphore`'s FIFO-ish but
//! unspecified wakeup order.

use super::metrics::MetricsSink;
use super::{estimate_byte_size, too_large_for_cache, AdmissionGuard, Coordination};
use crate::types::{CacheEntry, Fingerprint, ResultSet};
use async_trait::async_trait;
use dashmap::DashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use tokio::sync::{Semaphore, SemaphorePermit};

pub struct LocalGuard {
    _permit: tokio::sync::OwnedSemaphorePermit,
}
impl AdmissionGuard for LocalGuard {}

/// Per-call sub-semaphore: capacity `M <= N`, instantiated fresh for each
/// search. Lives only as long as the search's fan-out.
pub struct SubSemaphore {
    inner: Arc<Semaphore>,
}

impl SubSemaphore {
    pub fn new(capacity: usize) -> Self {
        Self { inner: Arc::new(Semaphore::new(capacity.max(1))) }
    }

    pub async fn acquire(&self) -> SemaphorePermit<'_> {
        // The semaphore is never closed while in use, so this cannot fail.
        self.inner.acquire().await.expect("sub-semaphore closed while in use")
    }
}

struct TracingMetrics;

impl MetricsSink for TracingMetrics {
    fn incr_counter(&self, name: &str, value: i64) {
        tracing::debug!(metric = name, value, "counter");
    }
    fn set_gauge(&self, name: &str, value: f64) {
        tracing::debug!(metric = name, value, "gauge");
    }
    fn record_timing(&self, name: &str, duration_ms: f64) {
        tracing::debug!(metric = name, duration_ms, "timing");
    }
}

/// Local Shared Result Cache: `DashMap` for concurrent access, insertion
/// order tracked separately for LRU eviction since `DashMap` iteration
/// order is not meaningful.
struct LocalCache {
    entries: DashMap<String, CacheEntry>,
    order: Mutex<std::collections::VecDeque<String>>,
    byte_cap: u64,
    entry_cap: usize,
    ttl_seconds: u64,
    total_bytes: AtomicU64,
    catalog_path: PathBuf,
    catalog_mtime: AtomicI64,
}

impl LocalCache {
    fn new(byte_cap: u64, entry_cap: usize, ttl_seconds: u64, catalog_path: PathBuf) -> Self {
        let mtime = catalog_mtime_secs(&catalog_path);
        Self {
            entries: DashMap::new(),
            order: Mutex::new(std::collections::VecDeque::new()),
            byte_cap,
            entry_cap,
            ttl_seconds,
            total_bytes: AtomicU64::new(0),
            catalog_path,
            catalog_mtime: AtomicI64::new(mtime),
        }
    }

    /// If the catalog file's mtime has advanced since we last checked,
    /// the catalog was reloaded out from under us — clear the cache
    /// entirely rather than risk serving stale resolutions.
    fn check_catalog_freshness(&self) {
        let current = catalog_mtime_secs(&self.catalog_path);
        let previous = self.catalog_mtime.swap(current, Ordering::SeqCst);
        if current > previous {
            self.entries.clear();
            self.order.lock().unwrap().clear();
            self.total_bytes.store(0, Ordering::SeqCst);
        }
    }

    fn get(&self, digest: &str) -> Option<ResultSet> {
        self.check_catalog_freshness();
        let now = chrono::Utc::now();
        if let Some(entry) = self.entries.get(digest) {
            if entry.is_expired(now) {
                drop(entry);
                self.remove(digest);
                return None;
            }
            let result = entry.result.clone();
            drop(entry);
            self.touch(digest);
            return Some(result);
        }
        None
    }

    /// Move `digest` to the back of the eviction queue, marking it
    /// most-recently-used.
    fn touch(&self, digest: &str) {
        let mut order = self.order.lock().unwrap();
        if let Some(pos) = order.iter().position(|k| k == digest) {
            order.remove(pos);
        }
        order.push_back(digest.to_string());
    }

    fn remove(&self, digest: &str) {
        if let Some((_, entry)) = self.entries.remove(digest) {
            self.total_bytes.fetch_sub(entry.byte_size, Ordering::SeqCst);
        }
        self.order.lock().unwrap().retain(|k| k != digest);
    }

    fn put(&self, fingerprint: &Fingerprint, result: ResultSet) {
        let byte_size = estimate_byte_size(&result);
        if too_large_for_cache(byte_size, self.byte_cap) {
            tracing::debug!(byte_size, cap = self.byte_cap, "cache entry too large, skipping");
            return;
        }

        let digest = fingerprint.digest();
        self.remove(&digest);

        while (self.entries.len() >= self.entry_cap
            || self.total_bytes.load(Ordering::SeqCst) + byte_size > self.byte_cap)
            && !self.entries.is_empty()
        {
            let oldest = { self.order.lock().unwrap().pop_front() };
            match oldest {
                Some(key) => self.remove(&key),
                None => break,
            }
        }

        let entry = super::make_cache_entry(fingerprint, result, self.ttl_seconds);
        self.total_bytes.fetch_add(entry.byte_size, Ordering::SeqCst);
        self.entries.insert(digest.clone(), entry);
        self.order.lock().unwrap().push_back(digest);
    }
}

fn catalog_mtime_secs(path: &std::path::Path) -> i64 {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map(|t| t.duration_since(SystemTime::UNIX_EPOCH).unwrap_or(Duration::ZERO).as_secs() as i64)
        .unwrap_or(0)
}

pub struct LocalCoordination {
    global: Arc<Semaphore>,
    global_cap: usize,
    cache: LocalCache,
    metrics: TracingMetrics,
}

impl LocalCoordination {
    pub fn new(global_cap: usize, cache_byte_cap: u64, cache_entry_cap: usize, cache_ttl_seconds: u64, catalog_path: PathBuf) -> Self {
        Self {
            global: Arc::new(Semaphore::new(global_cap.max(1))),
            global_cap: global_cap.max(1),
            cache: LocalCache::new(cache_byte_cap, cache_entry_cap, cache_ttl_seconds, catalog_path),
            metrics: TracingMetrics,
        }
    }
}

#[async_trait]
impl Coordination for LocalCoordination {
    async fn acquire_global(&self) -> Result<Box<dyn AdmissionGuard>, crate::error::SearchError> {
        let permit = Arc::clone(&self.global)
            .acquire_owned()
            .await
            .expect("global admission semaphore closed while in use");
        Ok(Box::new(LocalGuard { _permit: permit }))
    }

    fn sub_semaphore(&self, capacity: usize) -> SubSemaphore {
        SubSemaphore::new(capacity)
    }

    async fn cache_get(&self, fingerprint: &Fingerprint) -> Option<ResultSet> {
        self.cache.get(&fingerprint.digest())
    }

    async fn cache_put(&self, fingerprint: &Fingerprint, result: &ResultSet) {
        self.cache.put(fingerprint, result.clone());
    }

    fn metrics(&self) -> &dyn MetricsSink {
        &self.metrics
    }

    async fn heartbeat(&self) {
        let available = self.global.available_permits();
        let in_use = self.global_cap.saturating_sub(available);
        tracing::debug!(available, in_use, "local coordination heartbeat");
        super::metrics::record_admission_gauge(&self.metrics, in_use, self.global_cap);
    }
}
