//! Filesystem-backed flow orchestration shared by the CLI commands and
//! the scheduler daemon.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use featherflow_executor::{ProcessTarget, TasksDirResolver, emit, run_script};
use featherflow_flow::{FlowDef, plan};
use featherflow_scheduler::{Orchestrator, OrchestratorError};
use tracing::info;

/// Loads flow definitions from a flows directory and runs them through
/// the local process target.
pub struct FlowOrchestrator {
  flows_dir: PathBuf,
  tasks_dir: PathBuf,
  output_dir: PathBuf,
  target: ProcessTarget,
}

impl FlowOrchestrator {
  pub fn new(
    flows_dir: impl Into<PathBuf>,
    tasks_dir: impl Into<PathBuf>,
    output_dir: impl Into<PathBuf>,
  ) -> Self {
    Self {
      flows_dir: flows_dir.into(),
      tasks_dir: tasks_dir.into(),
      output_dir: output_dir.into(),
      target: ProcessTarget,
    }
  }

  /// Read and parse a flow definition by name. A bare name resolves to
  /// `<flows_dir>/<name>.json`; a name with an extension is used as-is.
  pub async fn load_flow(&self, flow_name: &str) -> Result<FlowDef> {
    let file_name = if Path::new(flow_name).extension().is_some() {
      flow_name.to_string()
    } else {
      format!("{flow_name}.json")
    };
    let path = self.flows_dir.join(file_name);

    let contents = tokio::fs::read_to_string(&path)
      .await
      .with_context(|| format!("failed to read flow file: {}", path.display()))?;
    let flow: FlowDef = serde_json::from_str(&contents)
      .with_context(|| format!("failed to parse flow file: {}", path.display()))?;
    Ok(flow)
  }

  /// Names of the flows available in the flows directory, sorted.
  pub async fn list_flows(&self) -> Result<Vec<String>> {
    let mut names = Vec::new();
    let mut dir = tokio::fs::read_dir(&self.flows_dir).await.with_context(|| {
      format!(
        "failed to read flows directory: {}",
        self.flows_dir.display()
      )
    })?;

    while let Some(entry) = dir.next_entry().await? {
      let path = entry.path();
      if path.extension().and_then(|e| e.to_str()) == Some("json")
        && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
      {
        names.push(stem.to_string());
      }
    }

    names.sort();
    Ok(names)
  }

  /// Plan a flow, write its execution script, and run it unless `dry_run`
  /// is set. Returns the script path either way.
  pub async fn execute(&self, flow_name: &str, dry_run: bool) -> Result<PathBuf> {
    let flow = self.load_flow(flow_name).await?;
    let plan = plan(&flow).with_context(|| format!("invalid flow definition '{flow_name}'"))?;

    let resolver = TasksDirResolver::new(&self.tasks_dir);
    let script = emit(&plan, &resolver);
    let path = script
      .write_to(&self.output_dir)
      .await
      .context("failed to write execution script")?;

    if dry_run {
      info!(flow = %flow.name, script = %path.display(), "dry run, skipping execution");
      return Ok(path);
    }

    run_script(&self.target, &flow.name, &path).await?;
    Ok(path)
  }
}

#[async_trait]
impl Orchestrator for FlowOrchestrator {
  async fn run_flow(&self, flow_name: &str) -> Result<(), OrchestratorError> {
    self
      .execute(flow_name, false)
      .await
      .map(|_| ())
      .map_err(|e| OrchestratorError::new(format!("{e:#}")))
  }
}
