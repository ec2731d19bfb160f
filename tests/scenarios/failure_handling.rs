//! Test: Failure Handling - halting after a failed step

use crate::helpers::*;
use cirun::core::{Event, ExecutionStatus, StepState};
use cirun::execution::ExecutionEvent;

/// A failing build stops the job; nothing after it runs
#[tokio::test]
async fn test_failure_halts_remaining_steps() {
    let runner = MockRunner::new().on(
        "cargo build --verbose --no-default-features",
        101,
        "error[E0433]: failed to resolve: use of undeclared crate `std`",
    );
    let result = run_workflow_with_mock(RUST_WORKFLOW, Event::push("main"), runner).await;

    assert_workflow_status(&result, ExecutionStatus::Failed);
    assert_eq!(result.job_status("build"), ExecutionStatus::Failed);

    assert_step_completed(&result, "build", "step-2", "cargo build --verbose");
    assert_step_failed(&result, "build", "step-3", "Process completed with exit code 101");
    assert_step_skipped(&result, "build", "step-4", "previous step failed");
    assert_step_skipped(&result, "build", "step-5", "previous step failed");

    // the runner never saw the test commands
    assert_scripts(
        &result,
        &[
            "cargo build --verbose",
            "cargo build --verbose --no-default-features",
        ],
    );

    assert_eq!(result.workflow.state.completed_steps, 2);
    assert_eq!(result.workflow.state.failed_steps, 1);
    assert_eq!(result.workflow.state.skipped_steps, 2);
}

/// The failed step keeps its exit code and output
#[tokio::test]
async fn test_failed_step_records_exit_code_and_output() {
    let yaml = r#"
on: push
jobs:
  test:
    steps:
      - id: unit
        run: cargo test
"#;
    let runner = MockRunner::new().on("cargo test", 101, "test result: FAILED. 3 passed; 1 failed");
    let result = run_workflow_with_mock(yaml, Event::push("main"), runner).await;

    match result.step_state("test", "unit") {
        StepState::Failed {
            exit_code, output, ..
        } => {
            assert_eq!(*exit_code, Some(101));
            assert!(output.contains("1 failed"));
        }
        other => panic!("Expected failed step, got {:?}", other),
    }

    let failed_events = result
        .events
        .iter()
        .filter(|e| matches!(e, ExecutionEvent::StepFailed { .. }))
        .count();
    assert_eq!(failed_events, 1);
}

/// continue-on-error records the failure but keeps going
#[tokio::test]
async fn test_continue_on_error() {
    let yaml = r#"
on: push
jobs:
  lint:
    steps:
      - id: fmt
        run: cargo fmt --check
        continue-on-error: true
      - id: clippy
        run: cargo clippy
"#;
    let runner = MockRunner::new().on("cargo fmt", 1, "Diff in src/lib.rs");
    let result = run_workflow_with_mock(yaml, Event::push("main"), runner).await;

    assert_workflow_status(&result, ExecutionStatus::Completed);
    assert_step_failed(&result, "lint", "fmt", "exit code 1");
    assert_step_completed(&result, "lint", "clippy", "cargo clippy");
}

/// Unsupported actions fail the step like a non-zero exit
#[tokio::test]
async fn test_unsupported_action_fails_job() {
    let yaml = r#"
on: push
jobs:
  release:
    steps:
      - id: upload
        uses: actions/upload-artifact@v4
        with:
          name: binaries
      - id: after
        run: echo never
"#;
    let result = run_workflow_with_mock(yaml, Event::push("main"), MockRunner::new()).await;

    assert_workflow_status(&result, ExecutionStatus::Failed);
    assert_step_failed(&result, "release", "upload", "unsupported action");
    assert_step_skipped(&result, "release", "after", "previous step failed");
    assert!(result.requests.is_empty());
}
