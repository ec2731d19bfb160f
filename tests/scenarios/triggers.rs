//! Test: Triggers - which events activate a workflow

use crate::helpers::*;
use cirun::core::{Event, EventKind, ExecutionStatus};
use cirun::execution::ExecutionEvent;

/// push and pull_request activate the workflow only for main
#[tokio::test]
async fn test_rust_workflow_only_runs_for_main() {
    let cases = [
        (Event::push("main"), ExecutionStatus::Completed),
        (Event::pull_request("main"), ExecutionStatus::Completed),
        (Event::push("develop"), ExecutionStatus::Skipped),
        (Event::pull_request("feature/parser"), ExecutionStatus::Skipped),
        (Event::push("main-backup"), ExecutionStatus::Skipped),
        (
            Event::new(EventKind::WorkflowDispatch, "main"),
            ExecutionStatus::Skipped,
        ),
    ];

    for (event, expected) in cases {
        let description = format!("{} on {}", event.kind, event.branch);
        let result = run_workflow_with_mock(RUST_WORKFLOW, event, MockRunner::new()).await;
        assert_eq!(result.status, expected, "{}", description);
    }
}

/// A workflow that is not triggered runs nothing and reports why
#[tokio::test]
async fn test_not_triggered_runs_nothing() {
    let result = run_workflow_with_mock(RUST_WORKFLOW, Event::push("develop"), MockRunner::new()).await;

    assert_workflow_status(&result, ExecutionStatus::Skipped);
    assert!(result.requests.is_empty());
    assert_eq!(result.job_status("build"), ExecutionStatus::Skipped);
    assert_step_skipped(&result, "build", "step-2", "not triggered");

    assert!(matches!(
        result.events.as_slice(),
        [ExecutionEvent::WorkflowSkipped { .. }]
    ));
}

/// Ordered include patterns and negations
#[tokio::test]
async fn test_release_branch_patterns() {
    let yaml = r#"
on:
  push:
    branches:
      - "releases/*"
      - "!releases/*-alpha"
jobs:
  publish:
    steps:
      - run: cargo publish --dry-run
"#;

    let result = run_workflow_with_mock(yaml, Event::push("releases/1.0"), MockRunner::new()).await;
    assert_workflow_status(&result, ExecutionStatus::Completed);

    let result = run_workflow_with_mock(yaml, Event::push("releases/2.0-alpha"), MockRunner::new()).await;
    assert_workflow_status(&result, ExecutionStatus::Skipped);

    let result = run_workflow_with_mock(yaml, Event::push("main"), MockRunner::new()).await;
    assert_workflow_status(&result, ExecutionStatus::Skipped);
}

/// branches-ignore excludes matching branches only
#[tokio::test]
async fn test_branches_ignore() {
    let yaml = r#"
on:
  pull_request:
    branches-ignore: [ "docs/*" ]
jobs:
  test:
    steps:
      - run: cargo test
"#;

    let result = run_workflow_with_mock(yaml, Event::pull_request("main"), MockRunner::new()).await;
    assert_workflow_status(&result, ExecutionStatus::Completed);

    let result = run_workflow_with_mock(yaml, Event::pull_request("docs/readme"), MockRunner::new()).await;
    assert_workflow_status(&result, ExecutionStatus::Skipped);
}
