//! Test: Success Chain - every step runs, in declared order

use crate::helpers::*;
use cirun::core::{Event, ExecutionStatus};
use cirun::execution::ExecutionEvent;

/// The repository workflow runs all five steps in order on a push to main
#[tokio::test]
async fn test_rust_workflow_runs_every_step_in_order() {
    let result = run_workflow_with_mock(RUST_WORKFLOW, Event::push("main"), MockRunner::new()).await;

    assert_workflow_status(&result, ExecutionStatus::Completed);
    assert_eq!(result.job_status("build"), ExecutionStatus::Completed);

    // checkout is built in, the four run steps reach the runner
    assert_scripts(
        &result,
        &[
            "cargo build --verbose",
            "cargo build --verbose --no-default-features",
            "cargo test --verbose",
            "cargo test --verbose --no-default-features --lib --tests",
        ],
    );

    assert_step_completed(&result, "build", "step-1", "Using local workspace");
    assert_step_completed(&result, "build", "step-5", "cargo test --verbose");
    assert_eq!(result.workflow.state.completed_steps, 5);
    assert_eq!(result.workflow.state.progress(), 1.0);
}

/// Every run step uses the job's default working directory
#[tokio::test]
async fn test_default_working_directory_applies() {
    let result = run_workflow_with_mock(RUST_WORKFLOW, Event::push("main"), MockRunner::new()).await;

    let expected = result.workspace.path().join("binmatch");
    for request in &result.requests {
        assert_eq!(request.working_dir, expected);
    }
}

/// Events arrive in lifecycle order with 1-based step positions
#[tokio::test]
async fn test_event_sequence() {
    let yaml = r#"
name: Events
on: push
jobs:
  only:
    steps:
      - name: First
        run: echo one
      - name: Second
        run: echo two
"#;
    let runner = MockRunner::new().on("echo two", 0, "two\nlines");
    let result = run_workflow_with_mock(yaml, Event::push("main"), runner).await;

    let kinds: Vec<&str> = result
        .events
        .iter()
        .map(|e| match e {
            ExecutionEvent::WorkflowStarted { .. } => "workflow-started",
            ExecutionEvent::JobStarted { .. } => "job-started",
            ExecutionEvent::StepStarted { .. } => "step-started",
            ExecutionEvent::StepOutput { .. } => "output",
            ExecutionEvent::StepCompleted { .. } => "step-completed",
            ExecutionEvent::JobCompleted { .. } => "job-completed",
            ExecutionEvent::WorkflowCompleted { .. } => "workflow-completed",
            _ => "other",
        })
        .collect();

    assert_eq!(
        kinds,
        vec![
            "workflow-started",
            "job-started",
            "step-started",
            "output",
            "step-completed",
            "step-started",
            "output",
            "output",
            "step-completed",
            "job-completed",
            "workflow-completed",
        ]
    );

    let positions: Vec<(usize, usize)> = result
        .events
        .iter()
        .filter_map(|e| match e {
            ExecutionEvent::StepStarted { index, total, .. } => Some((*index, *total)),
            _ => None,
        })
        .collect();
    assert_eq!(positions, vec![(1, 2), (2, 2)]);
}

/// Toolchain and cache actions succeed without touching the runner
#[tokio::test]
async fn test_builtin_actions_do_not_reach_runner() {
    let yaml = r#"
on: push
jobs:
  check:
    steps:
      - uses: actions/checkout@v4
      - uses: dtolnay/rust-toolchain@stable
        with:
          components: clippy
      - uses: Swatinem/rust-cache@v2
      - run: cargo clippy
"#;
    let result = run_workflow_with_mock(yaml, Event::push("main"), MockRunner::new()).await;

    assert_workflow_status(&result, ExecutionStatus::Completed);
    assert_step_completed(&result, "check", "step-2", "requested: stable");
    assert_scripts(&result, &["cargo clippy"]);
}

/// `if:` is not evaluated, so a guarded step runs on every event
#[tokio::test]
async fn test_conditional_step_still_runs() {
    let yaml = r#"
on: [push, pull_request]
jobs:
  release:
    steps:
      - id: notes
        if: github.event_name == 'pull_request'
        run: echo release notes
"#;
    let result = run_workflow_with_mock(yaml, Event::push("main"), MockRunner::new()).await;

    assert_workflow_status(&result, ExecutionStatus::Completed);
    assert_step_completed(&result, "release", "notes", "release notes");
    let step = &result.workflow.job("release").unwrap().steps[0];
    assert_eq!(
        step.condition.as_deref(),
        Some("github.event_name == 'pull_request'")
    );
}
