//! `logai-core` — concurrent, cache-backed log search across time-windowed
//! service logs.
//!
//! Module layout mirrors `spec.md`'s component letters: [`catalog`] is the
//! Service Catalog (A), [`discover`] is the Path Expander / File Discoverer
//! (B), [`coordination`] is the Coordination Layer (C), [`scanner`] is the
//! Scanner Adapter (D), [`executor`] is the Search Executor (E),
//! [`presenter`] is the Result Presenter & Spill Layer (F), and
//! [`housekeeping`] is Housekeeping (G).

pub mod catalog;
pub mod config;
pub mod coordination;
pub mod discover;
pub mod error;
pub mod executor;
pub mod housekeeping;
pub mod presenter;
pub mod scanner;
pub mod types;

pub use config::EngineConfig;
pub use error::{SearchError, SpillReadError};
pub use executor::{Engine, NullProgressSink, Progress, ProgressSink, SearchRequest};
pub use types::{Catalog, Fingerprint, Match, MatchContent, ResultSet, SearchMetadata, ServiceDescriptor, TimeWindow};
