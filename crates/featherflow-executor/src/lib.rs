//! Featherflow Executor
//!
//! Turns a validated [`featherflow_flow::ExecutionPlan`] into a runnable
//! bash script, and provides the execution-target capability used to run
//! it. The planning and validation layers never see shell text; the script
//! is a serialization detail of the [`ExecutionTarget`] boundary, which any
//! backend able to run a command and report an exit status can satisfy.

mod error;
mod resolver;
mod script;
mod target;

pub use error::ExecutionError;
pub use resolver::{CommandResolver, TasksDirResolver};
pub use script::{ExecutionScript, emit};
pub use target::{ExecutionTarget, ProcessTarget, run_script};
