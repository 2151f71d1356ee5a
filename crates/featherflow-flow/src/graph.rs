//! Dependency-graph validation and deterministic topological ordering.

use std::collections::{HashMap, HashSet};

use crate::error::{CycleError, DefinitionError, PlanError};
use crate::task::{ExecutionPlan, FlowDef, TaskDef};

/// Validate a flow definition.
///
/// Checks run in a fixed order and the first failure wins: flow name
/// present, at least one task, every task has an id and a script, task ids
/// unique, every dependency resolves to a task in the same flow. Cycles
/// are not checked here; they surface during [`compute_order`].
pub fn validate(flow: &FlowDef) -> Result<(), DefinitionError> {
  if flow.name.trim().is_empty() {
    return Err(DefinitionError::MissingFlowName);
  }
  if flow.tasks.is_empty() {
    return Err(DefinitionError::NoTasks);
  }

  for (index, task) in flow.tasks.iter().enumerate() {
    if task.id.trim().is_empty() {
      return Err(DefinitionError::MissingTaskId { index });
    }
    if task.script.trim().is_empty() {
      return Err(DefinitionError::MissingScript {
        task: task.id.clone(),
      });
    }
  }

  let mut ids: HashSet<&str> = HashSet::with_capacity(flow.tasks.len());
  for task in &flow.tasks {
    if !ids.insert(task.id.as_str()) {
      return Err(DefinitionError::DuplicateTaskId {
        id: task.id.clone(),
      });
    }
  }

  for task in &flow.tasks {
    for dependency in &task.depends_on {
      if !ids.contains(dependency.as_str()) {
        return Err(DefinitionError::UnknownDependency {
          task: task.id.clone(),
          dependency: dependency.clone(),
        });
      }
    }
  }

  Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
  Unvisited,
  InProgress,
  Done,
}

/// Compute a deterministic topological execution order.
///
/// Depth-first post-order over the dependency relation, driven by an
/// explicit stack so large graphs cannot exhaust the call stack. Roots are
/// visited in declaration order and each task's dependencies in their
/// declared order, so ties between independent tasks break by declaration
/// order. Hitting an in-progress node is a cycle; the error names both
/// endpoints of the back-edge.
///
/// Expects task ids and dependencies to have been validated already;
/// unknown dependency ids are ignored here rather than reported.
pub fn compute_order(tasks: &[TaskDef]) -> Result<Vec<String>, CycleError> {
  let deps: HashMap<&str, &[String]> = tasks
    .iter()
    .map(|t| (t.id.as_str(), t.depends_on.as_slice()))
    .collect();
  let mut marks: HashMap<&str, Mark> = tasks
    .iter()
    .map(|t| (t.id.as_str(), Mark::Unvisited))
    .collect();
  let mut order: Vec<String> = Vec::with_capacity(tasks.len());

  for root in tasks {
    if marks[root.id.as_str()] != Mark::Unvisited {
      continue;
    }
    marks.insert(root.id.as_str(), Mark::InProgress);

    // Each frame is (node, index of the next dependency to visit).
    let mut stack: Vec<(&str, usize)> = vec![(root.id.as_str(), 0)];
    while let Some(frame) = stack.last_mut() {
      let (node, next_dep) = (frame.0, frame.1);
      let node_deps = deps[node];

      if next_dep < node_deps.len() {
        frame.1 += 1;
        let dep = node_deps[next_dep].as_str();
        match marks.get(dep).copied() {
          Some(Mark::Unvisited) => {
            marks.insert(dep, Mark::InProgress);
            stack.push((dep, 0));
          }
          Some(Mark::InProgress) => {
            return Err(CycleError {
              from: node.to_string(),
              to: dep.to_string(),
            });
          }
          // Done, or a dangling id validation would have rejected.
          _ => {}
        }
      } else {
        marks.insert(node, Mark::Done);
        order.push(node.to_string());
        stack.pop();
      }
    }
  }

  Ok(order)
}

/// Validate a flow and compute its execution plan.
pub fn plan(flow: &FlowDef) -> Result<ExecutionPlan, PlanError> {
  validate(flow)?;
  let order = compute_order(&flow.tasks)?;
  Ok(ExecutionPlan {
    flow: flow.clone(),
    order,
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  fn task(id: &str, depends_on: &[&str]) -> TaskDef {
    TaskDef {
      id: id.to_string(),
      script: format!("{id}.py"),
      args: None,
      env: Default::default(),
      depends_on: depends_on.iter().map(|d| d.to_string()).collect(),
    }
  }

  fn flow(tasks: Vec<TaskDef>) -> FlowDef {
    FlowDef {
      name: "test-flow".to_string(),
      description: None,
      tasks,
    }
  }

  #[test]
  fn empty_name_is_rejected() {
    let mut f = flow(vec![task("a", &[])]);
    f.name = "  ".to_string();
    assert_eq!(validate(&f), Err(DefinitionError::MissingFlowName));
  }

  #[test]
  fn empty_task_list_is_rejected() {
    assert_eq!(validate(&flow(Vec::new())), Err(DefinitionError::NoTasks));
  }

  #[test]
  fn missing_script_names_the_task() {
    let mut t = task("a", &[]);
    t.script = String::new();
    assert_eq!(
      validate(&flow(vec![t])),
      Err(DefinitionError::MissingScript {
        task: "a".to_string()
      })
    );
  }

  #[test]
  fn duplicate_ids_are_rejected() {
    let f = flow(vec![task("a", &[]), task("a", &[])]);
    assert_eq!(
      validate(&f),
      Err(DefinitionError::DuplicateTaskId {
        id: "a".to_string()
      })
    );
  }

  #[test]
  fn unknown_dependency_fails_before_ordering() {
    let f = flow(vec![task("a", &["ghost"])]);
    assert_eq!(
      plan(&f),
      Err(PlanError::Definition(DefinitionError::UnknownDependency {
        task: "a".to_string(),
        dependency: "ghost".to_string(),
      }))
    );
  }

  #[test]
  fn no_dependencies_yields_declaration_order() {
    let f = flow(vec![task("c", &[]), task("a", &[]), task("b", &[])]);
    assert_eq!(compute_order(&f.tasks).unwrap(), vec!["c", "a", "b"]);
  }

  #[test]
  fn chain_yields_chain_order() {
    let f = flow(vec![task("c", &["b"]), task("b", &["a"]), task("a", &[])]);
    assert_eq!(compute_order(&f.tasks).unwrap(), vec!["a", "b", "c"]);
  }

  #[test]
  fn diamond_orders_dependencies_first() {
    // A (no deps), B -> A, C -> A and B.
    let f = flow(vec![
      task("A", &[]),
      task("B", &["A"]),
      task("C", &["A", "B"]),
    ]);
    assert_eq!(compute_order(&f.tasks).unwrap(), vec!["A", "B", "C"]);
  }

  #[test]
  fn every_task_appears_after_its_dependencies() {
    let f = flow(vec![
      task("report", &["aggregate", "signals"]),
      task("signals", &["indicators"]),
      task("aggregate", &["download"]),
      task("indicators", &["download"]),
      task("download", &[]),
    ]);
    let order = compute_order(&f.tasks).unwrap();
    assert_eq!(order.len(), f.tasks.len());
    for t in &f.tasks {
      let pos = order.iter().position(|id| id == &t.id).unwrap();
      for dep in &t.depends_on {
        let dep_pos = order.iter().position(|id| id == dep).unwrap();
        assert!(dep_pos < pos, "{dep} must precede {}", t.id);
      }
    }
  }

  #[test]
  fn two_node_cycle_names_both_tasks() {
    let f = flow(vec![task("A", &["B"]), task("B", &["A"])]);
    let err = compute_order(&f.tasks).unwrap_err();
    let named = [err.from.as_str(), err.to.as_str()];
    assert!(named.contains(&"A"));
    assert!(named.contains(&"B"));
  }

  #[test]
  fn self_dependency_is_a_cycle() {
    let f = flow(vec![task("a", &["a"])]);
    let err = compute_order(&f.tasks).unwrap_err();
    assert_eq!(err.from, "a");
    assert_eq!(err.to, "a");
  }

  #[test]
  fn planning_is_deterministic() {
    let f = flow(vec![
      task("z", &[]),
      task("m", &["z"]),
      task("a", &["z"]),
      task("end", &["m", "a"]),
    ]);
    let first = plan(&f).unwrap();
    let second = plan(&f).unwrap();
    assert_eq!(first.order, second.order);
    assert_eq!(first.order, vec!["z", "m", "a", "end"]);
  }
}
