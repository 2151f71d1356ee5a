//! Bash script emission for execution plans.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::Utc;
use featherflow_flow::{ExecutionPlan, TaskArgs, TaskDef};
use tracing::info;

use crate::error::ExecutionError;
use crate::resolver::CommandResolver;

/// Poll interval, in seconds, for dependency pre-flight gates.
const GATE_POLL_SECONDS: u32 = 5;

/// A rendered execution script for one flow run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionScript {
  flow_name: String,
  contents: String,
}

impl ExecutionScript {
  pub fn flow_name(&self) -> &str {
    &self.flow_name
  }

  pub fn contents(&self) -> &str {
    &self.contents
  }

  /// Write the script into `output_dir` as `<flow>_<timestamp>.sh` with
  /// mode 0755, creating the directory if needed.
  pub async fn write_to(&self, output_dir: &Path) -> Result<PathBuf, ExecutionError> {
    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    let path = output_dir.join(format!("{}_{timestamp}.sh", self.flow_name));

    tokio::fs::create_dir_all(output_dir).await?;
    tokio::fs::write(&path, &self.contents).await?;
    #[cfg(unix)]
    {
      use std::os::unix::fs::PermissionsExt;
      tokio::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).await?;
    }

    info!(flow = %self.flow_name, script = %path.display(), "execution script written");
    Ok(path)
  }
}

/// Render a plan into a bash program.
///
/// The script starts with a strict-failure preamble, creates a scoped
/// working directory, and installs an EXIT trap so the directory is
/// removed on every exit path. Each task step, in plan order, emits echo
/// markers, a pre-flight gate per declared dependency, a step-scoped
/// environment, the resolved command, and a status line of the form
/// `[FEATHERFLOW_STATUS] Task <id> completed with status <n>`; the status
/// is persisted to `<id>.status` in the working directory and a non-zero
/// status aborts the rest of the script.
///
/// Steps are emitted strictly sequentially, so the dependency gates can
/// never actually wait today. They are kept so the per-step contract stays
/// correct if a future version dispatches independent steps concurrently.
pub fn emit(plan: &ExecutionPlan, resolver: &dyn CommandResolver) -> ExecutionScript {
  let flow_name = &plan.flow.name;
  let generated = Utc::now().format("%Y-%m-%d %H:%M:%S");

  let mut script = String::new();
  let _ = write!(
    script,
    r#"#!/usr/bin/env bash

# Featherflow execution script for flow: {flow_name}
# Generated on: {generated}

set -euo pipefail

WORK_DIR="$(mktemp -d "${{TMPDIR:-/tmp}}/featherflow.{flow_name}.XXXXXX")"
echo "Created working directory: $WORK_DIR"

trap 'echo "Cleaning up working directory"; rm -rf "$WORK_DIR"; echo "Cleanup complete"' EXIT

echo "Starting flow: {flow_name}"
"#
  );

  for task_id in &plan.order {
    // Plan order only ever names tasks from the validated flow.
    let Some(task) = plan.flow.task(task_id) else {
      continue;
    };
    script.push('\n');
    script.push_str(&render_step(task, resolver));
  }

  let _ = write!(
    script,
    "\necho \"Flow completed successfully: {flow_name}\"\n"
  );

  ExecutionScript {
    flow_name: flow_name.clone(),
    contents: script,
  }
}

fn render_step(task: &TaskDef, resolver: &dyn CommandResolver) -> String {
  let id = &task.id;
  let mut step = String::new();

  let _ = writeln!(step, "echo 'Running task: {id}'");
  for dep in &task.depends_on {
    let _ = write!(
      step,
      r#"echo "Checking dependency {dep} for task {id}"
while ! [[ -f "$WORK_DIR/{dep}.status" && "$(cat "$WORK_DIR/{dep}.status")" == "0" ]]; do
  echo "Waiting for dependency {dep} to complete..."
  sleep {GATE_POLL_SECONDS}
done
"#
    );
  }

  let command = render_command(task, resolver);
  let env = render_env(task);
  let _ = write!(
    step,
    r#"task_status=0
{env} {command} || task_status=$?
echo "[FEATHERFLOW_STATUS] Task {id} completed with status $task_status"
echo "$task_status" > "$WORK_DIR/{id}.status"
if [[ $task_status -ne 0 ]]; then
  echo "Task {id} failed with status $task_status"
  exit "$task_status"
fi
"#
  );

  step
}

fn render_command(task: &TaskDef, resolver: &dyn CommandResolver) -> String {
  let mut command = resolver.resolve(task);
  match &task.args {
    // Positional args are caller-controlled shell tokens, passed verbatim.
    Some(TaskArgs::List(items)) => {
      for arg in items {
        command.push(' ');
        command.push_str(arg);
      }
    }
    Some(TaskArgs::Map(map)) => {
      for (key, value) in map {
        if key.chars().count() == 1 {
          let _ = write!(command, " -{key} {}", shell_word(value));
        } else {
          let _ = write!(command, " --{key}={}", shell_word(value));
        }
      }
    }
    None => {}
  }
  command
}

/// Step-scoped environment prefix. Every task sees `TMP_DIR` pointing at
/// the run's working directory, plus its own declared overrides.
fn render_env(task: &TaskDef) -> String {
  let mut prefix = String::from("TMP_DIR=\"$WORK_DIR\"");
  for (key, value) in &task.env {
    let _ = write!(prefix, " {key}={}", shell_word(value));
  }
  prefix
}

/// Quote a value so it stays a single shell word.
fn shell_word(value: &str) -> String {
  let safe = !value.is_empty()
    && value
      .chars()
      .all(|c| c.is_ascii_alphanumeric() || "_-./:=@%+".contains(c));
  if safe {
    value.to_string()
  } else {
    format!("'{}'", value.replace('\'', r"'\''"))
  }
}
