use thiserror::Error;

/// Errors raised while validating a flow definition.
///
/// Validation runs before planning or execution; these are surfaced
/// directly to the caller and never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
  /// The flow has no name.
  #[error("flow definition missing required field: name")]
  MissingFlowName,

  /// The flow declares no tasks.
  #[error("flow must contain at least one task")]
  NoTasks,

  /// A task has an empty id.
  #[error("task at position {index} is missing an id")]
  MissingTaskId { index: usize },

  /// A task has an empty script reference.
  #[error("task {task} is missing required field: script")]
  MissingScript { task: String },

  /// Two tasks share the same id.
  #[error("duplicate task id: {id}")]
  DuplicateTaskId { id: String },

  /// A dependency names a task that does not exist in the flow.
  #[error("task {task} depends on non-existent task {dependency}")]
  UnknownDependency { task: String, dependency: String },
}

/// A cycle in the dependency graph, named by the back-edge that closed it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cycle detected in task dependencies involving {from} and {to}")]
pub struct CycleError {
  pub from: String,
  pub to: String,
}

/// Any error that can abort a planning attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
  #[error(transparent)]
  Definition(#[from] DefinitionError),

  #[error(transparent)]
  Cycle(#[from] CycleError),
}
