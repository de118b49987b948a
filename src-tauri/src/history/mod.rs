//! Bounded, persisted log of past analyses.

pub mod backend;
pub mod store;
pub mod types;

pub use backend::{HistoryBackend, SqliteBackend, HISTORY_KEY};
pub use store::HistoryStore;
pub use types::{AnalysisRecord, HistoryLog, HISTORY_CAPACITY};
