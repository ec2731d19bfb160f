//! Test utility functions for workflow scenarios

use async_trait::async_trait;
use cirun::core::config::WorkflowConfig;
use cirun::core::{Event, ExecutionStatus, StepState, Workflow};
use cirun::execution::{
    CommandOutput, CommandRequest, CommandRunner, ExecutionEngine, ExecutionEvent, OutputCallback,
    OutputLine, OutputStream, RunOptions, RunnerError,
};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Mock runner scripted by substrings of the script
///
/// The first rule whose pattern occurs in the script decides the exit code
/// and output; unmatched scripts exit 0 and echo their first line.
#[derive(Clone, Default)]
pub struct MockRunner {
    rules: Vec<(String, i32, String)>,
    requests: Arc<Mutex<Vec<CommandRequest>>>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts containing `pattern` exit with `exit_code` and print `output`
    pub fn on(mut self, pattern: &str, exit_code: i32, output: &str) -> Self {
        self.rules
            .push((pattern.to_string(), exit_code, output.to_string()));
        self
    }

    /// Requests received so far, in order
    pub fn requests(&self) -> Vec<CommandRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for MockRunner {
    async fn run(
        &self,
        request: &CommandRequest,
        callback: Option<&dyn OutputCallback>,
    ) -> Result<CommandOutput, RunnerError> {
        self.requests.lock().unwrap().push(request.clone());

        let (exit_code, output) = self
            .rules
            .iter()
            .find(|(pattern, _, _)| request.script.contains(pattern.as_str()))
            .map(|(_, code, output)| (*code, output.clone()))
            .unwrap_or_else(|| (0, request.script.lines().next().unwrap_or("").to_string()));

        if let Some(cb) = callback {
            for line in output.lines() {
                cb.on_line(&OutputLine {
                    stream: OutputStream::Stdout,
                    text: line.to_string(),
                });
            }
        }

        Ok(CommandOutput {
            exit_code: Some(exit_code),
            output,
        })
    }
}

/// Test result from running a workflow
pub struct WorkflowTestResult {
    pub workflow: Workflow,
    pub status: ExecutionStatus,
    pub events: Vec<ExecutionEvent>,
    pub requests: Vec<CommandRequest>,
    pub workspace: TempDir,
}

impl WorkflowTestResult {
    /// State of a step, by job id and step id
    pub fn step_state(&self, job_id: &str, step_id: &str) -> &StepState {
        let job = self
            .workflow
            .job(job_id)
            .unwrap_or_else(|| panic!("Job '{}' not found in result", job_id));
        &job.steps
            .iter()
            .find(|s| s.id == step_id)
            .unwrap_or_else(|| panic!("Step '{}' not found in job '{}'", step_id, job_id))
            .state
    }

    /// Status of a job
    pub fn job_status(&self, job_id: &str) -> ExecutionStatus {
        self.workflow
            .job(job_id)
            .unwrap_or_else(|| panic!("Job '{}' not found in result", job_id))
            .status
    }

    /// Scripts that were handed to the runner, in order
    pub fn scripts(&self) -> Vec<String> {
        self.requests.iter().map(|r| r.script.clone()).collect()
    }

    /// Environment of the n-th runner request
    pub fn env_of(&self, request: usize, key: &str) -> Option<String> {
        self.requests
            .get(request)
            .and_then(|r| r.env.get(key).cloned())
    }

    /// Ids of jobs in the order they started
    pub fn started_jobs(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ExecutionEvent::JobStarted { job_id, .. } => Some(job_id.clone()),
                _ => None,
            })
            .collect()
    }
}

/// Parse a workflow from YAML string
pub fn workflow_from_yaml(yaml: &str) -> Workflow {
    WorkflowConfig::from_yaml(yaml)
        .and_then(|config| config.to_workflow())
        .unwrap_or_else(|e| panic!("Failed to parse workflow YAML: {:#}", e))
}

/// Run a workflow with a mock runner in a fresh workspace
pub async fn run_workflow_with_mock(
    yaml: &str,
    event: Event,
    runner: MockRunner,
) -> WorkflowTestResult {
    run_workflow_with_options(yaml, event, runner, RunOptions::default()).await
}

/// Run a workflow with a mock runner and explicit options
///
/// The workspace of `options` is replaced by a temporary directory.
pub async fn run_workflow_with_options(
    yaml: &str,
    event: Event,
    runner: MockRunner,
    mut options: RunOptions,
) -> WorkflowTestResult {
    let workspace = tempfile::tempdir().unwrap();
    options.workspace = workspace.path().to_path_buf();

    let mut workflow = workflow_from_yaml(yaml);
    let events = Arc::new(Mutex::new(Vec::new()));
    let engine = ExecutionEngine::new(runner.clone());

    let sink = events.clone();
    engine
        .add_event_handler(move |event| sink.lock().unwrap().push(event))
        .await;

    let status = engine
        .execute(&mut workflow, &event, &options)
        .await
        .unwrap_or_else(|e| panic!("Engine error: {}", e));

    let events = events.lock().unwrap().clone();
    WorkflowTestResult {
        workflow,
        status,
        events,
        requests: runner.requests(),
        workspace,
    }
}

/// Assert a step completed and its output contains the text
pub fn assert_step_completed(result: &WorkflowTestResult, job_id: &str, step_id: &str, expected_output: &str) {
    match result.step_state(job_id, step_id) {
        StepState::Completed { output, .. } => assert!(
            output.contains(expected_output),
            "Step '{}' output:\n{}\n\ndoes not contain:\n{}",
            step_id,
            output,
            expected_output
        ),
        other => panic!("Step '{}' should be completed, but was in state: {:?}", step_id, other),
    }
}

/// Assert a step failed with specific message
pub fn assert_step_failed(result: &WorkflowTestResult, job_id: &str, step_id: &str, expected_error: &str) {
    match result.step_state(job_id, step_id) {
        StepState::Failed { error, .. } => assert!(
            error.contains(expected_error),
            "Step '{}' error:\n{}\n\ndoes not contain:\n{}",
            step_id,
            error,
            expected_error
        ),
        other => panic!("Step '{}' should have failed, but was in state: {:?}", step_id, other),
    }
}

/// Assert a step was skipped for the given reason
pub fn assert_step_skipped(result: &WorkflowTestResult, job_id: &str, step_id: &str, expected_reason: &str) {
    match result.step_state(job_id, step_id) {
        StepState::Skipped { reason } => assert!(
            reason.contains(expected_reason),
            "Step '{}' skip reason '{}' does not contain '{}'",
            step_id,
            reason,
            expected_reason
        ),
        other => panic!("Step '{}' should be skipped, but was in state: {:?}", step_id, other),
    }
}

/// Assert workflow status
pub fn assert_workflow_status(result: &WorkflowTestResult, expected: ExecutionStatus) {
    assert_eq!(
        result.status, expected,
        "Workflow should be {:?}, but was {:?} ({} completed, {} failed, {} skipped)",
        expected,
        result.status,
        result.workflow.state.completed_steps,
        result.workflow.state.failed_steps,
        result.workflow.state.skipped_steps
    );
    assert_eq!(result.workflow.state.status, expected);
}

/// Assert the runner received exactly these scripts, in order
pub fn assert_scripts(result: &WorkflowTestResult, expected: &[&str]) {
    let actual = result.scripts();
    let actual: Vec<&str> = actual.iter().map(|s| s.trim_end()).collect();
    assert_eq!(
        actual, expected,
        "Expected scripts: {:?}\nActual: {:?}",
        expected, actual
    );
}

/// The workflow this repository runs in CI, in miniature
pub const RUST_WORKFLOW: &str = r#"
name: Rust

on:
  push:
    branches: [ "main" ]
  pull_request:
    branches: [ "main" ]

env:
  CARGO_TERM_COLOR: always

jobs:
  build:
    runs-on: ubuntu-latest
    defaults:
      run:
        working-directory: binmatch
    steps:
    - uses: actions/checkout@v4
    - name: Build
      run: cargo build --verbose
    - name: Build no_std
      run: cargo build --verbose --no-default-features
    - name: Run tests
      run: cargo test --verbose
    - name: Run tests no_std
      run: cargo test --verbose --no-default-features --lib --tests
"#;
