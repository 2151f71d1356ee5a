use thiserror::Error;

/// Errors from script emission and execution.
#[derive(Debug, Error)]
pub enum ExecutionError {
  /// A flow run exited non-zero. Remaining steps of that run were aborted;
  /// other flows and the scheduler are unaffected.
  #[error("flow {flow} failed with exit status {status}")]
  Failed { flow: String, status: i32 },

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}
