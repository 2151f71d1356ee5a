use std::path::{Path, PathBuf};

use featherflow_flow::TaskDef;

/// Maps a task to a fully-qualified runnable command.
///
/// Script references in flow definitions are bare names; something outside
/// the planner has to decide what actually gets invoked.
pub trait CommandResolver {
  fn resolve(&self, task: &TaskDef) -> String;
}

/// Resolves task scripts against a tasks directory, picking an interpreter
/// by file extension: `.py` runs under `python3`, `.sh` under `bash`, and
/// anything else is invoked directly.
pub struct TasksDirResolver {
  tasks_dir: PathBuf,
}

impl TasksDirResolver {
  pub fn new(tasks_dir: impl Into<PathBuf>) -> Self {
    Self {
      tasks_dir: tasks_dir.into(),
    }
  }
}

impl CommandResolver for TasksDirResolver {
  fn resolve(&self, task: &TaskDef) -> String {
    let path = self.tasks_dir.join(&task.script);
    let path = path.display();
    match Path::new(&task.script).extension().and_then(|e| e.to_str()) {
      Some("py") => format!("python3 {path}"),
      Some("sh") => format!("bash {path}"),
      _ => format!("{path}"),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn task(script: &str) -> TaskDef {
    TaskDef {
      id: "t".to_string(),
      script: script.to_string(),
      args: None,
      env: Default::default(),
      depends_on: Vec::new(),
    }
  }

  #[test]
  fn picks_interpreter_by_extension() {
    let resolver = TasksDirResolver::new("/opt/tasks");
    assert_eq!(
      resolver.resolve(&task("fetch.py")),
      "python3 /opt/tasks/fetch.py"
    );
    assert_eq!(resolver.resolve(&task("clean.sh")), "bash /opt/tasks/clean.sh");
    assert_eq!(resolver.resolve(&task("report")), "/opt/tasks/report");
  }
}
