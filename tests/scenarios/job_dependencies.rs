//! Test: Job Dependencies - `needs` ordering and skipping

use crate::helpers::*;
use cirun::core::{Event, ExecutionStatus};
use cirun::execution::{ExecutionEvent, RunOptions};

const PIPELINE: &str = r#"
name: Pipeline
on: push
jobs:
  docs:
    needs: build
    steps:
      - run: cargo doc
  build:
    steps:
      - run: cargo build
  test:
    needs: build
    steps:
      - run: cargo test
  audit:
    steps:
      - run: cargo audit
"#;

/// Jobs run after their needs, otherwise in declaration order
#[tokio::test]
async fn test_needs_order() {
    let result = run_workflow_with_mock(PIPELINE, Event::push("main"), MockRunner::new()).await;

    assert_workflow_status(&result, ExecutionStatus::Completed);
    assert_eq!(result.started_jobs(), vec!["build", "docs", "test", "audit"]);
    assert_scripts(&result, &["cargo build", "cargo doc", "cargo test", "cargo audit"]);
}

/// A failed job skips its dependents; independent jobs still run
#[tokio::test]
async fn test_failed_need_skips_dependents() {
    let runner = MockRunner::new().on("cargo build", 101, "error: could not compile");
    let result = run_workflow_with_mock(PIPELINE, Event::push("main"), runner).await;

    assert_workflow_status(&result, ExecutionStatus::Failed);
    assert_eq!(result.job_status("build"), ExecutionStatus::Failed);
    assert_eq!(result.job_status("docs"), ExecutionStatus::Skipped);
    assert_eq!(result.job_status("test"), ExecutionStatus::Skipped);
    assert_eq!(result.job_status("audit"), ExecutionStatus::Completed);
    assert_step_skipped(&result, "test", "step-1", "needed job 'build' did not succeed");

    assert_scripts(&result, &["cargo build", "cargo audit"]);

    let skipped: Vec<&str> = result
        .events
        .iter()
        .filter_map(|e| match e {
            ExecutionEvent::JobSkipped { job_id, .. } => Some(job_id.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(skipped, vec!["docs", "test"]);
}

/// --job runs only the selected job, without its needs
#[tokio::test]
async fn test_single_job_selection() {
    let options = RunOptions {
        job: Some("test".to_string()),
        ..RunOptions::default()
    };
    let result =
        run_workflow_with_options(PIPELINE, Event::push("main"), MockRunner::new(), options).await;

    assert_workflow_status(&result, ExecutionStatus::Completed);
    assert_eq!(result.started_jobs(), vec!["test"]);
    assert_eq!(result.job_status("build"), ExecutionStatus::Pending);
    assert_eq!(result.workflow.state.total_steps, 1);
}
