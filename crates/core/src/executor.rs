//! Search Executor: the seven-phase orchestration described in `spec.md`
//! §4.E — resolve, fingerprint+cache probe, admit, fan out, deadline,
//! assemble, publish.

use crate::catalog::{self};
use crate::config::EngineConfig;
use crate::coordination::Coordination;
use crate::discover;
use crate::error::SearchError;
use crate::presenter;
use crate::scanner::{self, ScanEvent};
use crate::types::{Catalog, Fingerprint, Match, ResultSet, SearchMetadata, ServiceDescriptor, TimeWindow};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::mpsc;

/// Sideband progress notification. Never part of the returned result —
/// consumers that don't care can simply not provide a sink.
#[derive(Debug, Clone)]
pub struct Progress {
    pub per_service: BTreeMap<String, u64>,
    pub total: u64,
}

pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, progress: Progress);
}

/// A sink that does nothing — the default when the caller doesn't need
/// progress notifications.
pub struct NullProgressSink;
impl ProgressSink for NullProgressSink {
    fn on_progress(&self, _progress: Progress) {}
}

pub struct SearchRequest {
    pub service_queries: Vec<String>,
    pub locale: Option<String>,
    pub pattern: String,
    pub window: TimeWindow,
    /// Overrides `EngineConfig::preview_limit` when set.
    pub preview_limit: Option<usize>,
}

/// The single context threaded through the engine: catalog, coordination
/// facade, and configuration. Constructed once at startup; cheap to clone
/// since everything inside is already `Arc`.
#[derive(Clone)]
pub struct Engine {
    pub catalog: Arc<Catalog>,
    pub coordination: Arc<dyn Coordination>,
    pub config: Arc<EngineConfig>,
}

impl Engine {
    pub async fn search(
        &self,
        request: SearchRequest,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<ResultSet, SearchError> {
        // Phase 1: resolve.
        let (resolved, unresolved) = catalog::resolve(&self.catalog, &request.service_queries, request.locale.as_deref());
        if !unresolved.is_empty() {
            let query = unresolved.join(", ");
            let suggestions = unresolved
                .iter()
                .flat_map(|q| catalog::suggest(&self.catalog, q))
                .take(5)
                .collect();
            crate::coordination::metrics::record_error(self.coordination.metrics(), "ServiceNotFound");
            return Err(SearchError::ServiceNotFound { query, suggestions });
        }
        if resolved.is_empty() {
            crate::coordination::metrics::record_error(self.coordination.metrics(), "ServiceNotFound");
            return Err(SearchError::ServiceNotFound { query: request.service_queries.join(", "), suggestions: vec![] });
        }

        // Phase 2: fingerprint + cache probe.
        let fingerprint = Fingerprint::new(&resolved, &request.pattern, request.window);
        let started = Instant::now();
        if let Some(mut cached) = self.coordination.cache_get(&fingerprint).await {
            crate::coordination::metrics::record_cache_hit(self.coordination.metrics());
            cached.metadata.cached = true;
            cached.metadata.duration_seconds = started.elapsed().as_secs_f64();
            return Ok(cached);
        }
        crate::coordination::metrics::record_cache_miss(self.coordination.metrics());

        // Phase 3: admit.
        let _global_guard = self.coordination.acquire_global().await?;
        let sub_capacity = self.config.per_call_cap.min(resolved.len());
        let sub_semaphore = Arc::new(self.coordination.sub_semaphore(sub_capacity));

        let descriptors: Vec<ServiceDescriptor> = resolved
            .iter()
            .filter_map(|name| self.catalog.services.iter().find(|s| &s.name == name).cloned())
            .collect();

        // Phase 4: fan out.
        let aggregator = Arc::new(Aggregator::new(resolved.clone(), self.config.clone(), progress));
        let preview_limit = request.preview_limit.unwrap_or(self.config.preview_limit);
        let pattern = request.pattern.clone();
        let window = request.window;

        let mut tasks = tokio::task::JoinSet::new();
        for descriptor in descriptors {
            let sub_semaphore = Arc::clone(&sub_semaphore);
            let aggregator = Arc::clone(&aggregator);
            let pattern = pattern.clone();
            tasks.spawn(async move {
                let _permit = sub_semaphore.acquire().await;
                run_one_service(descriptor, window, pattern, aggregator).await;
            });
        }

        // Phase 5: deadline. On expiry, abort any survivors so their child
        // processes are reaped promptly; matches already pushed into the
        // aggregator before abort are retained as the partial result.
        let deadline = self.config.deadline();
        let partial_from_timeout = match tokio::time::timeout(deadline, async {
            while tasks.join_next().await.is_some() {}
        })
        .await
        {
            Ok(()) => false,
            Err(_) => {
                tasks.abort_all();
                crate::coordination::metrics::record_timeout(self.coordination.metrics());
                true
            }
        };

        // Phase 6: assemble.
        let matches = aggregator.take_matches();
        let service_failures = aggregator.take_failures();
        let files_searched = aggregator.files_searched();
        let total = matches.len();
        let overflow = total > preview_limit;
        let partial = partial_from_timeout || !service_failures.is_empty();

        let spill_result = presenter::write_spill(&self.config.spill_root, &resolved, partial, &matches).await;
        let saved_to = match &spill_result {
            Ok(path) => Some(path.display().to_string()),
            Err(e) => {
                return Err(SearchError::SpillFailed { reason: e.clone() });
            }
        };

        let error = if partial_from_timeout {
            Some(format!("{}: deadline elapsed with {} match(es) collected so far", SearchError::Timeout.kind(), total))
        } else if !service_failures.is_empty() {
            // One line naming the failing services; if both discovery and
            // scanner failures occurred in the same call, lead with the
            // first failure's kind and fold the rest into the detail list.
            let kind = service_failures[0].1;
            Some(format!(
                "{kind}: {}",
                service_failures.iter().map(|(s, k, r)| format!("{s} ({k}): {r}")).collect::<Vec<_>>().join("; ")
            ))
        } else {
            None
        };

        let preview = if overflow { matches[..preview_limit].to_vec() } else { matches.clone() };

        let metadata = SearchMetadata {
            services: resolved.clone(),
            files_searched,
            duration_seconds: started.elapsed().as_secs_f64(),
            total_matches: total,
            cached: false,
            partial,
            overflow,
            saved_to,
            error,
        };

        crate::coordination::metrics::record_search(self.coordination.metrics(), metadata.duration_seconds * 1000.0, total, files_searched);
        if overflow {
            crate::coordination::metrics::record_overflow(self.coordination.metrics());
        }
        for (_, kind, _) in &service_failures {
            crate::coordination::metrics::record_error(self.coordination.metrics(), kind);
        }

        let result = ResultSet { matches: preview, metadata };

        // Phase 7: publish. Only cache clean, non-partial, non-overflowed results.
        if !result.metadata.partial && !result.metadata.overflow {
            self.coordination.cache_put(&fingerprint, &result).await;
        }

        Ok(result)
    }
}

async fn run_one_service(descriptor: ServiceDescriptor, window: TimeWindow, pattern: String, aggregator: Arc<Aggregator>) {
    let files = match discover::discover(&descriptor, window) {
        Ok(f) => f,
        Err(e) => {
            aggregator.record_failure(&descriptor.name, "DiscoveryFailed", e);
            return;
        }
    };
    aggregator.add_files_searched(files.len());

    if files.is_empty() {
        return;
    }

    let (tx, mut rx) = mpsc::channel(256);
    let service_name = descriptor.name.clone();
    let scan_task = tokio::spawn(async move {
        scanner::scan(&files, &pattern, &service_name, tx).await;
    });

    while let Some(event) = rx.recv().await {
        match event {
            ScanEvent::Match(m) => aggregator.add_match(&descriptor.name, m),
            ScanEvent::Done(Ok(())) => {}
            ScanEvent::Done(Err(e)) => aggregator.record_failure(&descriptor.name, "ScannerFailed", e),
        }
    }
    let _ = scan_task.await;
}

/// Shared, mutex-guarded accumulator: the "exactly one producer per
/// service, one consumer" aggregator `spec.md` §5 describes.
struct Aggregator {
    matches: Mutex<Vec<Match>>,
    per_service_counts: Mutex<BTreeMap<String, u64>>,
    failures: Mutex<Vec<(String, &'static str, String)>>,
    files_searched: AtomicU64,
    total: AtomicU64,
    last_notified_total: AtomicU64,
    last_notified_at: Mutex<Instant>,
    config: Arc<EngineConfig>,
    progress: Arc<dyn ProgressSink>,
}

impl Aggregator {
    fn new(services: Vec<String>, config: Arc<EngineConfig>, progress: Arc<dyn ProgressSink>) -> Self {
        let mut per_service_counts = BTreeMap::new();
        for s in services {
            per_service_counts.insert(s, 0);
        }
        Self {
            matches: Mutex::new(Vec::new()),
            per_service_counts: Mutex::new(per_service_counts),
            failures: Mutex::new(Vec::new()),
            files_searched: AtomicU64::new(0),
            total: AtomicU64::new(0),
            last_notified_total: AtomicU64::new(0),
            last_notified_at: Mutex::new(Instant::now()),
            config,
            progress,
        }
    }

    fn add_match(&self, service: &str, m: Match) {
        self.matches.lock().unwrap().push(m);
        *self.per_service_counts.lock().unwrap().entry(service.to_string()).or_insert(0) += 1;
        let total = self.total.fetch_add(1, Ordering::SeqCst) + 1;
        self.maybe_notify(total);
    }

    fn maybe_notify(&self, total: u64) {
        let threshold =
            if total < 1000 { self.config.progress_small_threshold } else { self.config.progress_large_threshold };
        let last_total = self.last_notified_total.load(Ordering::SeqCst);
        let delta = total.saturating_sub(last_total);

        let elapsed_enough = {
            let mut last = self.last_notified_at.lock().unwrap();
            if last.elapsed() >= self.config.progress_min_interval() && total > last_total {
                *last = Instant::now();
                true
            } else {
                false
            }
        };

        if delta >= threshold || elapsed_enough {
            self.last_notified_total.store(total, Ordering::SeqCst);
            let per_service = self.per_service_counts.lock().unwrap().clone();
            self.progress.on_progress(Progress { per_service, total });
        }
    }

    fn record_failure(&self, service: &str, kind: &'static str, reason: String) {
        self.failures.lock().unwrap().push((service.to_string(), kind, reason));
    }

    fn add_files_searched(&self, n: usize) {
        self.files_searched.fetch_add(n as u64, Ordering::SeqCst);
    }

    fn files_searched(&self) -> usize {
        self.files_searched.load(Ordering::SeqCst) as usize
    }

    fn take_matches(&self) -> Vec<Match> {
        self.matches.lock().unwrap().clone()
    }

    fn take_failures(&self) -> Vec<(String, &'static str, String)> {
        self.failures.lock().unwrap().clone()
    }
}
