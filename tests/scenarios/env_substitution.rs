//! Test: Environment - layering and `${{ }}` substitution

use crate::helpers::*;
use cirun::core::{Event, ExecutionStatus};
use cirun::execution::RunOptions;

const LAYERED: &str = r#"
name: Layers
on: [push, pull_request]
env:
  CARGO_TERM_COLOR: always
  LEVEL: workflow
jobs:
  build:
    env:
      LEVEL: job
      PROFILE: dev
    steps:
      - id: show
        run: echo $LEVEL
        env:
          LEVEL: step
      - id: plain
        run: echo $PROFILE
"#;

/// Workflow, job and step env layer with later layers winning
#[tokio::test]
async fn test_env_layers() {
    let result = run_workflow_with_mock(LAYERED, Event::push("main"), MockRunner::new()).await;

    assert_workflow_status(&result, ExecutionStatus::Completed);
    assert_eq!(result.env_of(0, "LEVEL").as_deref(), Some("step"));
    assert_eq!(result.env_of(1, "LEVEL").as_deref(), Some("job"));
    assert_eq!(result.env_of(1, "CARGO_TERM_COLOR").as_deref(), Some("always"));
    assert_eq!(result.env_of(1, "PROFILE").as_deref(), Some("dev"));
}

/// Runner variables describe the simulated event
#[tokio::test]
async fn test_runner_variables() {
    let result = run_workflow_with_mock(LAYERED, Event::pull_request("main"), MockRunner::new()).await;

    assert_eq!(result.env_of(0, "CI").as_deref(), Some("true"));
    assert_eq!(result.env_of(0, "GITHUB_WORKFLOW").as_deref(), Some("Layers"));
    assert_eq!(result.env_of(0, "GITHUB_JOB").as_deref(), Some("build"));
    assert_eq!(result.env_of(0, "GITHUB_EVENT_NAME").as_deref(), Some("pull_request"));
    assert_eq!(result.env_of(0, "GITHUB_REF").as_deref(), Some("refs/heads/main"));
    assert_eq!(result.env_of(0, "GITHUB_BASE_REF").as_deref(), Some("main"));
    assert_eq!(
        result.env_of(0, "GITHUB_WORKSPACE"),
        Some(result.workspace.path().display().to_string())
    );
}

/// Command-line overrides beat every layer, including step env
#[tokio::test]
async fn test_cli_overrides_win() {
    let options = RunOptions {
        env: [("LEVEL".to_string(), "cli".to_string())].into_iter().collect(),
        ..RunOptions::default()
    };
    let result =
        run_workflow_with_options(LAYERED, Event::push("main"), MockRunner::new(), options).await;

    assert_eq!(result.env_of(0, "LEVEL").as_deref(), Some("cli"));
    assert_eq!(result.env_of(1, "LEVEL").as_deref(), Some("cli"));
}

/// Expressions in scripts, env values and working directories are substituted
#[tokio::test]
async fn test_expressions_are_rendered() {
    let yaml = r#"
on: push
env:
  CRATE: binmatch
jobs:
  build:
    steps:
      - run: "cargo test -p ${{ env.CRATE }} --target-dir ${{ github.ref_name }}"
        working-directory: ${{ env.CRATE }}
        env:
          TARGET_DIR: ${{ runner.temp }}/target
      - run: echo "${{ secrets.TOKEN }}"
"#;
    let result = run_workflow_with_mock(yaml, Event::push("main"), MockRunner::new()).await;

    assert_scripts(
        &result,
        &["cargo test -p binmatch --target-dir main", "echo \"\""],
    );
    assert_eq!(
        result.requests[0].working_dir,
        result.workspace.path().join("binmatch")
    );
    let target = result.env_of(0, "TARGET_DIR").unwrap();
    assert!(target.ends_with("/target"));
    assert!(!target.contains("${{"));
}
