//! Workflow execution engine

pub mod actions;
pub mod engine;
pub mod executor;
pub mod runner;
pub mod scheduler;

pub use engine::{EngineError, ExecutionEngine, ExecutionEvent, RunOptions};
pub use executor::{ExecutionResult, StepExecutor};
pub use runner::{
    CommandOutput, CommandRequest, CommandRunner, DryRunRunner, OutputCallback, OutputLine,
    OutputStream, RunnerError, ShellRunner,
};
pub use scheduler::JobScheduler;
