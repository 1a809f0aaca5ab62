//! Error taxonomy for the search engine.
//!
//! Mirrors the donor codebase's convention: plain enums with hand-written
//! `Display` impls rather than a derive-macro error crate. Operational
//! failures (cache, admission-store, metrics, retention) are never
//! constructed here — call sites log them with `tracing` and continue.

use std::fmt;

/// Errors that can terminate or partially terminate a search.
#[derive(Debug, Clone)]
pub enum SearchError {
    /// A requested service token did not resolve to any catalog entry.
    /// Carries up to 5 suggested service names.
    ServiceNotFound { query: String, suggestions: Vec<String> },
    /// A per-service scanner invocation failed (non-fatal to the overall search).
    ScannerFailed { service: String, reason: String },
    /// File discovery failed for a service (non-fatal to the overall search).
    DiscoveryFailed { service: String, reason: String },
    /// The overall configured deadline elapsed before the fan-out completed.
    Timeout,
    /// The full match list could not be persisted to the spill directory.
    SpillFailed { reason: String },
    /// Catch-all for conditions that do not fit the other variants.
    Internal { reason: String },
}

impl fmt::Display for SearchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchError::ServiceNotFound { query, suggestions } => {
                if suggestions.is_empty() {
                    write!(f, "No service matches '{query}'")
                } else {
                    write!(f, "No service matches '{query}'. Did you mean: {}?", suggestions.join(", "))
                }
            }
            SearchError::ScannerFailed { service, reason } => {
                write!(f, "scanner failed for service '{service}': {reason}")
            }
            SearchError::DiscoveryFailed { service, reason } => {
                write!(f, "file discovery failed for service '{service}': {reason}")
            }
            SearchError::Timeout => write!(f, "search deadline elapsed"),
            SearchError::SpillFailed { reason } => write!(f, "failed to persist results: {reason}"),
            SearchError::Internal { reason } => write!(f, "internal error: {reason}"),
        }
    }
}

impl std::error::Error for SearchError {}

impl SearchError {
    /// One-line kind label used in `ResultSet` metadata's `error` field.
    pub fn kind(&self) -> &'static str {
        match self {
            SearchError::ServiceNotFound { .. } => "ServiceNotFound",
            SearchError::ScannerFailed { .. } => "ScannerFailed",
            SearchError::DiscoveryFailed { .. } => "DiscoveryFailed",
            SearchError::Timeout => "Timeout",
            SearchError::SpillFailed { .. } => "SpillFailed",
            SearchError::Internal { .. } => "Internal",
        }
    }
}

/// Errors surfaced by the spill read-back operation (`spec.md` §6).
#[derive(Debug, Clone)]
pub enum SpillReadError {
    /// Path escapes the configured output root, or is otherwise malformed.
    InvalidPath(String),
    /// Path is inside the output root but lacks the documented filename prefix.
    PrefixMismatch(String),
    /// Path does not exist.
    NotFound(String),
    /// File exceeds the configured size cap.
    FileTooLarge { path: String, size: u64, cap: u64 },
    /// File exists and is readable but failed to decode as a match list.
    DecodeError { path: String, reason: String },
}

impl fmt::Display for SpillReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpillReadError::InvalidPath(p) => write!(f, "invalid path: {p}"),
            SpillReadError::PrefixMismatch(p) => write!(f, "path does not carry a recognized spill prefix: {p}"),
            SpillReadError::NotFound(p) => write!(f, "no such spill file: {p}"),
            SpillReadError::FileTooLarge { path, size, cap } => {
                write!(f, "spill file {path} is {size} bytes, exceeding the {cap} byte cap")
            }
            SpillReadError::DecodeError { path, reason } => write!(f, "failed to decode spill file {path}: {reason}"),
        }
    }
}

impl std::error::Error for SpillReadError {}

impl SpillReadError {
    pub fn kind(&self) -> &'static str {
        match self {
            SpillReadError::InvalidPath(_) => "InvalidPath",
            SpillReadError::PrefixMismatch(_) => "PrefixMismatch",
            SpillReadError::NotFound(_) => "NotFound",
            SpillReadError::FileTooLarge { .. } => "FileTooLarge",
            SpillReadError::DecodeError { .. } => "DecodeError",
        }
    }
}
