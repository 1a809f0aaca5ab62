//! Data model shared across the engine: service descriptors, time windows,
//! fingerprints, matches, and result sets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single entry in the Service Catalog. Name is unique, path template is
/// immutable once loaded. External-tracking attributes (ticketing links,
/// on-call rotation ids, etc.) are deliberately not modeled — out of scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub name: String,
    #[serde(default)]
    pub alternate_names: Vec<String>,
    pub path_template: String,
}

/// An ordered, read-only sequence of descriptors, built once at startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    pub services: Vec<ServiceDescriptor>,
}

/// Half-open UTC time range, second precision. `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, &'static str> {
        if start > end {
            return Err("start_time_utc must be <= end_time_utc");
        }
        Ok(Self { start, end })
    }

    /// Canonical textual form used when building a fingerprint: fixed UTC
    /// RFC3339 representations of both endpoints.
    pub fn canonical(&self) -> (String, String) {
        (self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

/// A single line match produced by a scanner child process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
    pub service: String,
    pub file_path: String,
    pub line_number: u64,
    pub content: MatchContent,
}

/// Scanned line content: decoded JSON when the line parses as JSON, the raw
/// string otherwise. A tagged union rather than an enum with a discriminant
/// field, so serialized matches read naturally either way.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MatchContent {
    Json(serde_json::Value),
    Raw(String),
}

impl MatchContent {
    pub fn from_line(raw: &str) -> Self {
        match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(v) => MatchContent::Json(v),
            Err(_) => MatchContent::Raw(raw.to_string()),
        }
    }
}

/// Deterministic, order-invariant cache/spill key for a query.
///
/// Built from the sorted resolved service names, the literal pattern, and
/// the canonical textual form of the time window. Any change to any
/// component changes the fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fingerprint {
    pub services: Vec<String>,
    pub pattern: String,
    pub start: String,
    pub end: String,
}

impl Fingerprint {
    pub fn new(services: &[String], pattern: &str, window: TimeWindow) -> Self {
        let mut services: Vec<String> = services.to_vec();
        services.sort();
        services.dedup();
        let (start, end) = window.canonical();
        Self { services, pattern: pattern.to_string(), start, end }
    }

    /// Stable canonical JSON (sorted keys, deterministic field order) used
    /// as the hash input for the on-the-wire cache/spill key.
    pub fn canonical_json(&self) -> String {
        serde_json::json!({
            "end": self.end,
            "pattern": self.pattern,
            "services": self.services,
            "start": self.start,
        })
        .to_string()
    }

    /// Short hex digest of the canonical form, used as a map/file key.
    pub fn digest(&self) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(self.canonical_json().as_bytes());
        let out = hasher.finalize();
        out.iter().take(8).map(|b| format!("{b:02x}")).collect()
    }
}

/// Metadata accompanying a `ResultSet`: everything about a search except
/// the matches themselves.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SearchMetadata {
    pub services: Vec<String>,
    pub files_searched: usize,
    pub duration_seconds: f64,
    pub total_matches: usize,
    pub cached: bool,
    pub partial: bool,
    pub overflow: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The result of a search: a preview (possibly truncated) of matches plus
/// metadata. The full match list always lives in the spill file named in
/// `metadata.saved_to`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultSet {
    pub matches: Vec<Match>,
    pub metadata: SearchMetadata,
}

impl ResultSet {
    /// Multiset-equality check used by cache-hit and round-trip invariants:
    /// same matches regardless of order, same services/pattern/window
    /// already implied by fingerprint equality.
    pub fn same_matches_multiset(&self, other: &ResultSet) -> bool {
        fn key(m: &Match) -> (String, String, u64, String) {
            let content = match &m.content {
                MatchContent::Json(v) => v.to_string(),
                MatchContent::Raw(s) => s.clone(),
            };
            (m.service.clone(), m.file_path.clone(), m.line_number, content)
        }
        let mut a: Vec<_> = self.matches.iter().map(key).collect();
        let mut b: Vec<_> = other.matches.iter().map(key).collect();
        a.sort();
        b.sort();
        a == b
    }
}

/// A cached `ResultSet` plus the bookkeeping needed for TTL expiry and LRU
/// eviction.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub fingerprint_digest: String,
    pub result: ResultSet,
    pub byte_size: u64,
    pub inserted_at: DateTime<Utc>,
    pub ttl_seconds: u64,
}

impl CacheEntry {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let age = (now - self.inserted_at).num_seconds();
        age < 0 || age as u64 >= self.ttl_seconds
    }
}
