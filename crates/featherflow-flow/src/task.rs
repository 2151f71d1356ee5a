use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// Arguments for a task invocation.
///
/// Flows may declare arguments either as a positional list or as a
/// key -> value map; the map form is rendered as command-line flags
/// (`-k value` for single-character keys, `--key=value` otherwise).
/// The two forms are mutually exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskArgs {
  List(Vec<String>),
  Map(BTreeMap<String, String>),
}

/// A single unit of work within a flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDef {
  /// Identifier, unique within the flow.
  pub id: String,
  /// Script reference, resolved externally to a runnable command.
  pub script: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub args: Option<TaskArgs>,
  /// Environment overrides scoped to this task's invocation.
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub env: BTreeMap<String, String>,
  /// Ids of tasks that must complete successfully first.
  /// Accepts a single string or a list in JSON; normalized to a list.
  #[serde(
    default,
    deserialize_with = "string_or_list",
    skip_serializing_if = "Vec::is_empty"
  )]
  pub depends_on: Vec<String>,
}

/// A named set of tasks with dependency relations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowDef {
  /// Flow name, used as the dependency-graph and schedule key.
  pub name: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  pub tasks: Vec<TaskDef>,
}

impl FlowDef {
  /// Look up a task by id.
  pub fn task(&self, id: &str) -> Option<&TaskDef> {
    self.tasks.iter().find(|t| t.id == id)
  }
}

/// A validated flow paired with a topologically valid run order.
///
/// Immutable once produced; recomputed on every planning call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPlan {
  pub flow: FlowDef,
  pub order: Vec<String>,
}

fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
  D: Deserializer<'de>,
{
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum StringOrList {
    One(String),
    Many(Vec<String>),
  }

  Ok(match StringOrList::deserialize(deserializer)? {
    StringOrList::One(value) => vec![value],
    StringOrList::Many(values) => values,
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn depends_on_accepts_single_string() {
    let task: TaskDef = serde_json::from_str(
      r#"{"id": "b", "script": "b.py", "depends_on": "a"}"#,
    )
    .unwrap();
    assert_eq!(task.depends_on, vec!["a"]);
  }

  #[test]
  fn depends_on_accepts_list() {
    let task: TaskDef = serde_json::from_str(
      r#"{"id": "c", "script": "c.py", "depends_on": ["a", "b"]}"#,
    )
    .unwrap();
    assert_eq!(task.depends_on, vec!["a", "b"]);
  }

  #[test]
  fn args_parse_as_list_or_map() {
    let listed: TaskDef = serde_json::from_str(
      r#"{"id": "a", "script": "a.py", "args": ["--fast", "input.csv"]}"#,
    )
    .unwrap();
    assert!(matches!(listed.args, Some(TaskArgs::List(ref v)) if v.len() == 2));

    let mapped: TaskDef = serde_json::from_str(
      r#"{"id": "a", "script": "a.py", "args": {"n": "3", "mode": "full"}}"#,
    )
    .unwrap();
    match mapped.args {
      Some(TaskArgs::Map(map)) => {
        assert_eq!(map.get("n").map(String::as_str), Some("3"));
        assert_eq!(map.get("mode").map(String::as_str), Some("full"));
      }
      other => panic!("expected map args, got {other:?}"),
    }
  }

  #[test]
  fn flow_round_trips_through_json() {
    let flow = FlowDef {
      name: "etl".to_string(),
      description: Some("nightly pipeline".to_string()),
      tasks: vec![TaskDef {
        id: "extract".to_string(),
        script: "extract.py".to_string(),
        args: None,
        env: BTreeMap::from([("REGION".to_string(), "eu".to_string())]),
        depends_on: Vec::new(),
      }],
    };

    let text = serde_json::to_string(&flow).unwrap();
    let parsed: FlowDef = serde_json::from_str(&text).unwrap();
    assert_eq!(parsed, flow);
  }
}
