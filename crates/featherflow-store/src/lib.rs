//! Featherflow Store
//!
//! This crate provides the persistent schedule store: named schedule
//! entries binding a flow to a cron expression plus its run-state. All
//! entries live in a single JSON document, loaded once when the store is
//! constructed and saved after every mutation.
//!
//! The store owns the entries exclusively; the scheduler daemon only ever
//! holds clones while a run is in flight. The in-memory entry map is
//! mutex-guarded because the daemon's control loop and its worker tasks
//! both mutate run-state.

mod entry;
mod store;

pub use entry::ScheduleEntry;
pub use store::ScheduleStore;

/// Error type for schedule store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
  /// The cron expression failed validation; nothing was persisted.
  #[error("invalid cron expression: {0}")]
  InvalidExpression(#[from] featherflow_cron::CronError),

  /// No schedule exists for the named flow.
  #[error("no schedule for flow: {0}")]
  UnknownFlow(String),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  /// The schedule document on disk is not valid JSON.
  #[error("malformed schedule document: {0}")]
  Malformed(#[from] serde_json::Error),
}
