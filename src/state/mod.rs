//! State kept across runs: the shared key-value store and run history.

mod history;
mod store;

pub use history::RunHistory;
pub use store::{FileStateStore, MemoryStateStore, StateStore, LAST_RESULT_KEY, METRICS_KEY};
