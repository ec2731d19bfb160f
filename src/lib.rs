//! cirun - run CI workflow definitions on the local machine

pub mod cli;
pub mod core;
pub mod execution;

// Re-export commonly used types
pub use core::{Event, EventKind, ExecutionStatus, Job, RunContext, Step, StepState, Workflow};
pub use execution::{
    CommandRunner, DryRunRunner, EngineError, ExecutionEngine, ExecutionEvent, RunOptions,
    ShellRunner,
};
