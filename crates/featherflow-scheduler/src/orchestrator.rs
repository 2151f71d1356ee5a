use async_trait::async_trait;

/// Failure reported by an execution backend for one flow run.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct OrchestratorError {
  message: String,
}

impl OrchestratorError {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
    }
  }
}

/// Execution backend boundary for the scheduler daemon.
///
/// Implementations run one flow to completion. The daemon dispatches
/// fire-and-forget and never cancels a run once started; a failure aborts
/// only that flow run, never the control loop or other flows.
#[async_trait]
pub trait Orchestrator: Send + Sync {
  async fn run_flow(&self, flow_name: &str) -> Result<(), OrchestratorError>;
}
