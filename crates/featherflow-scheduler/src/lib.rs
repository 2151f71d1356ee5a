//! Featherflow Scheduler
//!
//! The polling scheduler daemon: a single long-lived control loop that
//! asks the schedule store which entries are due, marks them running, and
//! dispatches each flow onto its own task. Actual execution is delegated
//! to an [`Orchestrator`] implementation; the daemon never embeds
//! execution logic.
//!
//! The daemon is an explicit object constructed once by the process's
//! composition root and shared by reference. There is no global scheduler
//! state.

mod daemon;
mod orchestrator;

pub use daemon::{RunningFlow, SchedulerConfig, SchedulerDaemon};
pub use orchestrator::{Orchestrator, OrchestratorError};

/// Error type for daemon lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
  #[error("scheduler is already running")]
  AlreadyRunning,

  #[error("scheduler is not running")]
  NotRunning,

  /// The control loop did not terminate within the shutdown timeout.
  /// Callers must treat the daemon as possibly still running.
  #[error("control loop did not stop within {timeout_secs}s")]
  ShutdownTimeout { timeout_secs: u64 },
}
