//! Featherflow Flow
//!
//! This crate provides the flow definition types and the dependency-graph
//! planner for Featherflow. A flow is a named set of tasks with dependency
//! relations; planning validates the definition and computes a
//! deterministic topological execution order.
//!
//! Planning happens in two stages:
//! - [`validate`] checks structural invariants (required fields, unique
//!   task ids, resolvable dependencies) and fails with a
//!   [`DefinitionError`] before any ordering attempt.
//! - [`compute_order`] orders the tasks so every task appears after all of
//!   its dependencies, failing with a [`CycleError`] that names both
//!   endpoints of the back-edge when the graph is cyclic.
//!
//! [`plan`] combines both into an [`ExecutionPlan`], which is recomputed on
//! every call and never cached.

mod error;
mod graph;
mod task;

pub use error::{CycleError, DefinitionError, PlanError};
pub use graph::{compute_order, plan, validate};
pub use task::{ExecutionPlan, FlowDef, TaskArgs, TaskDef};
