//! The execution-target capability.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{error, info};

use crate::error::ExecutionError;

/// Something that can run a command with a given environment and report
/// its exit status.
///
/// Local process execution is the default backend; container or remote
/// dispatch can satisfy the same capability without the planner noticing.
#[async_trait]
pub trait ExecutionTarget: Send + Sync {
  async fn run(
    &self,
    command: &str,
    env: &HashMap<String, String>,
  ) -> Result<i32, ExecutionError>;
}

/// Runs commands as local child processes through `bash -c`.
///
/// The invocation is synchronous from the caller's point of view: `run`
/// resolves only once the child has exited.
pub struct ProcessTarget;

#[async_trait]
impl ExecutionTarget for ProcessTarget {
  async fn run(
    &self,
    command: &str,
    env: &HashMap<String, String>,
  ) -> Result<i32, ExecutionError> {
    let status = Command::new("bash")
      .arg("-c")
      .arg(command)
      .envs(env)
      .status()
      .await?;

    // A None exit code means the child was killed by a signal.
    Ok(status.code().unwrap_or(-1))
  }
}

/// Run a written execution script through a target, failing on non-zero
/// exit.
pub async fn run_script(
  target: &dyn ExecutionTarget,
  flow_name: &str,
  script_path: &Path,
) -> Result<(), ExecutionError> {
  info!(flow = %flow_name, script = %script_path.display(), "executing flow script");

  let command = format!("bash '{}'", script_path.display());
  let status = target.run(&command, &HashMap::new()).await?;
  if status != 0 {
    error!(flow = %flow_name, status, "flow script failed");
    return Err(ExecutionError::Failed {
      flow: flow_name.to_string(),
      status,
    });
  }

  info!(flow = %flow_name, "flow script completed");
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn process_target_reports_exit_status() {
    let target = ProcessTarget;
    assert_eq!(target.run("exit 0", &HashMap::new()).await.unwrap(), 0);
    assert_eq!(target.run("exit 3", &HashMap::new()).await.unwrap(), 3);
  }

  #[tokio::test]
  async fn process_target_passes_environment() {
    let target = ProcessTarget;
    let env = HashMap::from([("FEATHERFLOW_PROBE".to_string(), "ok".to_string())]);
    let status = target
      .run(r#"[[ "$FEATHERFLOW_PROBE" == "ok" ]]"#, &env)
      .await
      .unwrap();
    assert_eq!(status, 0);
  }

  #[tokio::test]
  async fn run_script_fails_on_non_zero_exit() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fail.sh");
    tokio::fs::write(&path, "#!/usr/bin/env bash\nexit 7\n")
      .await
      .unwrap();

    let err = run_script(&ProcessTarget, "etl", &path).await.unwrap_err();
    match err {
      ExecutionError::Failed { flow, status } => {
        assert_eq!(flow, "etl");
        assert_eq!(status, 7);
      }
      other => panic!("expected Failed, got {other:?}"),
    }
  }
}
