//! Step executor - runs individual steps with a command runner

use crate::{
    core::{RunContext, Step, StepAction},
    execution::{
        actions::run_action,
        runner::{CommandRequest, CommandRunner, OutputCallback, OutputLine, OutputStream},
    },
};
use indexmap::IndexMap;
use tokio::time::{timeout, Duration};
use tracing::{debug, error, info};

/// Result of executing a step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionResult {
    /// Step completed successfully
    Success { output: String },
    /// Step failed
    Failed {
        error: String,
        exit_code: Option<i32>,
        output: String,
    },
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionResult::Success { .. })
    }
}

/// Executes a single step
pub struct StepExecutor<R> {
    runner: R,
}

impl<R: CommandRunner> StepExecutor<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    /// Execute a step and return the result
    ///
    /// The context must already contain the step's own environment
    /// (see [`RunContext::for_step`]).
    pub async fn execute(
        &self,
        step: &Step,
        context: &RunContext,
        callback: Option<&dyn OutputCallback>,
    ) -> ExecutionResult {
        info!("Executing step: {} ({})", step.name, step.id);

        match &step.action {
            StepAction::Uses { action, inputs } => {
                self.execute_action(step, action, inputs, context, callback)
            }
            StepAction::Run { script } => self.execute_script(step, script, context, callback).await,
        }
    }

    fn execute_action(
        &self,
        step: &Step,
        action: &str,
        inputs: &IndexMap<String, String>,
        context: &RunContext,
        callback: Option<&dyn OutputCallback>,
    ) -> ExecutionResult {
        let inputs: IndexMap<String, String> = inputs
            .iter()
            .map(|(k, v)| (k.clone(), context.render(v)))
            .collect();

        match run_action(action, &inputs, &context.workspace) {
            Ok(message) => {
                if let Some(cb) = callback {
                    cb.on_line(&OutputLine {
                        stream: OutputStream::Stdout,
                        text: message.clone(),
                    });
                }
                ExecutionResult::Success { output: message }
            }
            Err(e) => {
                error!("Action {} failed for step {}: {}", action, step.id, e);
                ExecutionResult::Failed {
                    error: e,
                    exit_code: None,
                    output: String::new(),
                }
            }
        }
    }

    async fn execute_script(
        &self,
        step: &Step,
        script: &str,
        context: &RunContext,
        callback: Option<&dyn OutputCallback>,
    ) -> ExecutionResult {
        let request = CommandRequest {
            script: context.render(script),
            shell: step.shell.as_ref().map(|s| context.render(s)),
            working_dir: context.resolve_dir(step.working_directory.as_deref()),
            env: context.process_env(),
        };
        debug!("Rendered script for step {}:\n{}", step.id, request.script);

        let timeout_duration = Duration::from_secs(step.timeout_secs);
        let output = match timeout(timeout_duration, self.runner.run(&request, callback)).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                error!("Runner error for step {}: {}", step.id, e);
                return ExecutionResult::Failed {
                    error: e.to_string(),
                    exit_code: None,
                    output: String::new(),
                };
            }
            Err(_) => {
                error!("Timeout for step {} after {}s", step.id, step.timeout_secs);
                return ExecutionResult::Failed {
                    error: format!("Timeout after {} seconds", step.timeout_secs),
                    exit_code: None,
                    output: String::new(),
                };
            }
        };

        match output.exit_code {
            Some(0) => {
                info!("Step {} completed successfully", step.id);
                ExecutionResult::Success {
                    output: output.output,
                }
            }
            Some(code) => {
                error!("Step {} exited with code {}", step.id, code);
                ExecutionResult::Failed {
                    error: format!("Process completed with exit code {}", code),
                    exit_code: Some(code),
                    output: output.output,
                }
            }
            None => {
                error!("Step {} was terminated by a signal", step.id);
                ExecutionResult::Failed {
                    error: "Process was terminated by a signal".to_string(),
                    exit_code: None,
                    output: output.output,
                }
            }
        }
    }
}
