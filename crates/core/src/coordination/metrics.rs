//! Metrics Sink: counters, gauges, and timing histograms. Every method is
//! non-throwing and best-effort — a metrics backend outage never changes
//! a search's outcome, only its observability.

/// Minimal metrics facade. Local and distributed coordination layers each
/// provide an implementation; both also emit the same events via
/// `tracing` so metrics are recoverable from logs even with no backend.
pub trait MetricsSink: Send + Sync {
    fn incr_counter(&self, name: &str, value: i64);
    fn set_gauge(&self, name: &str, value: f64);
    fn record_timing(&self, name: &str, duration_ms: f64);
}

pub fn record_cache_hit(sink: &dyn MetricsSink) {
    sink.incr_counter("cache.hit", 1);
}

pub fn record_cache_miss(sink: &dyn MetricsSink) {
    sink.incr_counter("cache.miss", 1);
}

pub fn record_search(sink: &dyn MetricsSink, duration_ms: f64, matches: usize, files_scanned: usize) {
    sink.record_timing("search.duration_ms", duration_ms);
    sink.incr_counter("search.matches", matches as i64);
    sink.incr_counter("search.files_scanned", files_scanned as i64);
}

pub fn record_overflow(sink: &dyn MetricsSink) {
    sink.incr_counter("search.overflow", 1);
}

pub fn record_timeout(sink: &dyn MetricsSink) {
    sink.incr_counter("search.timeout", 1);
}

pub fn record_error(sink: &dyn MetricsSink, kind: &str) {
    sink.incr_counter(&format!("search.error.{kind}"), 1);
}

pub fn record_admission_gauge(sink: &dyn MetricsSink, in_use: usize, capacity: usize) {
    sink.set_gauge("admission.in_use", in_use as f64);
    sink.set_gauge(
        "admission.utilization",
        if capacity > 0 { in_use as f64 / capacity as f64 } else { 0.0 },
    );
}
