//! Distributed Coordination Layer, backed by Redis.
//!
//! Grounded directly on `original_source/src/redis_coordinator.py`:
//! atomic `INCR`/`DECR` for the semaphore with a 1-hour TTL safety window
//! and a bounded 100-retry/0.5s-delay loop, `SETEX` for the cache with an
//! md5-of-canonical-form key (this repo's `Fingerprint::digest` plays the
//! same role, via SHA-256 rather than MD5), and `INCRBY`/`LPUSH`+`LTRIM`
//! for metrics. Falls back to an embedded `LocalCoordination` whenever the
//! Redis connection itself is unreachable, per the spec's "coordination
//! unreachable -> continue with local fallback" operational-error rule —
//! this differs from the original, which raises on a dead connection;
//! here an outage degrades to local behavior instead of failing searches.

use super::local::LocalCoordination;
use super::metrics::MetricsSink;
use super::{estimate_byte_size, too_large_for_cache, AdmissionGuard, Coordination};
use crate::error::SearchError;
use crate::types::{Fingerprint, ResultSet};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::sync::Arc;
use std::time::Duration;

const SEMAPHORE_TTL_SECONDS: u64 = 3600;
const SEMAPHORE_MAX_RETRIES: u32 = 100;
const SEMAPHORE_RETRY_DELAY: Duration = Duration::from_millis(500);
const CACHE_KEY_PREFIX: &str = "log-ai:cache:";
const SEM_KEY_PREFIX: &str = "log-ai:sem:";
const METRICS_COUNTER_PREFIX: &str = "log-ai:metrics:";
const METRICS_TIMING_PREFIX: &str = "log-ai:timings:";
const METRICS_TIMING_TTL_SECONDS: u64 = 3600;
const METRICS_TIMING_KEEP: isize = 99;

pub struct RedisGuard {
    conn: ConnectionManager,
    key: String,
}
impl AdmissionGuard for RedisGuard {}

impl Drop for RedisGuard {
    fn drop(&mut self) {
        // Best-effort release: spawn a detached decrement, matching the
        // original's "log but don't raise" release semantics. We cannot
        // `.await` in `Drop`, so this fires and forgets on the runtime.
        let mut conn = self.conn.clone();
        let key = self.key.clone();
        tokio::spawn(async move {
            if let Err(e) = conn.decr::<_, _, i64>(&key, 1).await {
                tracing::warn!(error = %e, key, "failed to release distributed admission slot");
            }
        });
    }
}

struct RedisMetrics {
    conn: ConnectionManager,
}

impl MetricsSink for RedisMetrics {
    fn incr_counter(&self, name: &str, value: i64) {
        let mut conn = self.conn.clone();
        let key = format!("{METRICS_COUNTER_PREFIX}{name}");
        tokio::spawn(async move {
            if let Err(e) = conn.incr::<_, _, i64>(&key, value).await {
                tracing::warn!(error = %e, key, "failed to increment distributed counter");
            }
        });
    }

    fn set_gauge(&self, name: &str, value: f64) {
        let mut conn = self.conn.clone();
        let key = format!("{METRICS_COUNTER_PREFIX}gauge:{name}");
        tokio::spawn(async move {
            if let Err(e) = conn.set::<_, _, ()>(&key, value).await {
                tracing::warn!(error = %e, key, "failed to set distributed gauge");
            }
        });
    }

    fn record_timing(&self, name: &str, duration_ms: f64) {
        let mut conn = self.conn.clone();
        let key = format!("{METRICS_TIMING_PREFIX}{name}");
        tokio::spawn(async move {
            let push: redis::RedisResult<i64> = conn.lpush(&key, duration_ms.to_string()).await;
            if let Err(e) = push {
                tracing::warn!(error = %e, key, "failed to record distributed timing");
                return;
            }
            let _: redis::RedisResult<()> = conn.ltrim(&key, 0, METRICS_TIMING_KEEP).await;
            let _: redis::RedisResult<()> = conn.expire(&key, METRICS_TIMING_TTL_SECONDS as i64).await;
        });
    }
}

pub struct RedisCoordination {
    conn: ConnectionManager,
    fallback: Arc<LocalCoordination>,
    global_cap: usize,
    cache_ttl_seconds: u64,
    cache_byte_cap: u64,
    metrics: RedisMetrics,
}

impl RedisCoordination {
    pub async fn connect(
        url: &str,
        global_cap: usize,
        cache_ttl_seconds: u64,
        cache_byte_cap: u64,
        fallback: Arc<LocalCoordination>,
    ) -> Result<Self, String> {
        let client = redis::Client::open(url).map_err(|e| format!("invalid redis url: {e}"))?;
        let conn = ConnectionManager::new(client).await.map_err(|e| format!("failed to connect to redis: {e}"))?;
        Ok(Self {
            metrics: RedisMetrics { conn: conn.clone() },
            conn,
            fallback,
            global_cap,
            cache_ttl_seconds,
            cache_byte_cap,
        })
    }

    fn cache_key(&self, fingerprint: &Fingerprint) -> String {
        format!("{CACHE_KEY_PREFIX}{}", fingerprint.digest())
    }
}

#[async_trait]
impl Coordination for RedisCoordination {
    async fn acquire_global(&self) -> Result<Box<dyn AdmissionGuard>, SearchError> {
        let key = format!("{SEM_KEY_PREFIX}global");
        let mut conn = self.conn.clone();

        for _ in 0..SEMAPHORE_MAX_RETRIES {
            let current: redis::RedisResult<i64> = conn.incr(&key, 1).await;
            let current = match current {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(error = %e, "redis unreachable during admission acquire, falling back to local");
                    return self.fallback.acquire_global().await;
                }
            };

            if current as usize <= self.global_cap {
                let _: redis::RedisResult<()> = conn.expire(&key, SEMAPHORE_TTL_SECONDS as i64).await;
                return Ok(Box::new(RedisGuard { conn: self.conn.clone(), key }));
            }

            let _: redis::RedisResult<i64> = conn.decr(&key, 1).await;
            tokio::time::sleep(SEMAPHORE_RETRY_DELAY).await;
        }

        Err(SearchError::Internal {
            reason: format!("could not acquire distributed admission slot after {SEMAPHORE_MAX_RETRIES} retries"),
        })
    }

    fn sub_semaphore(&self, capacity: usize) -> super::local::SubSemaphore {
        // The per-call sub-limit is always enforced locally within a
        // single search even under the distributed coordination layer —
        // only the cross-process global slot needs to be distributed.
        super::local::SubSemaphore::new(capacity)
    }

    async fn cache_get(&self, fingerprint: &Fingerprint) -> Option<ResultSet> {
        let key = self.cache_key(fingerprint);
        let mut conn = self.conn.clone();
        match conn.get::<_, Option<String>>(&key).await {
            Ok(Some(data)) => match serde_json::from_str::<ResultSet>(&data) {
                Ok(result) => Some(result),
                Err(e) => {
                    tracing::warn!(error = %e, key, "failed to decode cached result, treating as miss");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, key, "redis unreachable during cache get, falling back to local");
                self.fallback.cache_get(fingerprint).await
            }
        }
    }

    async fn cache_put(&self, fingerprint: &Fingerprint, result: &ResultSet) {
        let byte_size = estimate_byte_size(result);
        if too_large_for_cache(byte_size, self.cache_byte_cap) {
            tracing::debug!(byte_size, cap = self.cache_byte_cap, "cache entry too large, skipping");
            return;
        }

        let key = self.cache_key(fingerprint);
        let data = match serde_json::to_string(result) {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize result for cache put");
                return;
            }
        };

        let mut conn = self.conn.clone();
        let ttl = self.cache_ttl_seconds;
        if let Err(e) = conn.set_ex::<_, _, ()>(&key, data, ttl).await {
            tracing::warn!(error = %e, key, "redis unreachable during cache put, falling back to local");
            self.fallback.cache_put(fingerprint, result).await;
        }
    }

    fn metrics(&self) -> &dyn MetricsSink {
        &self.metrics
    }

    async fn heartbeat(&self) {
        let mut conn = self.conn.clone();
        let key = format!("{SEM_KEY_PREFIX}global");
        match conn.get::<_, Option<i64>>(&key).await {
            Ok(v) => {
                let in_use = v.unwrap_or(0).max(0) as usize;
                tracing::debug!(in_use, "distributed coordination heartbeat");
                super::metrics::record_admission_gauge(&self.metrics, in_use, self.global_cap);
            }
            Err(e) => {
                tracing::warn!(error = %e, "redis unreachable during heartbeat");
                self.fallback.heartbeat().await;
            }
        }
    }
}
