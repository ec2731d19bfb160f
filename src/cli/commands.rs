//! CLI command definitions

use crate::core::EventKind;
use clap::Args;
use std::path::PathBuf;

/// Event to simulate
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum EventArg {
    Push,
    #[value(name = "pull_request", alias = "pull-request")]
    PullRequest,
    #[value(name = "workflow_dispatch", alias = "workflow-dispatch")]
    WorkflowDispatch,
}

impl From<EventArg> for EventKind {
    fn from(arg: EventArg) -> Self {
        match arg {
            EventArg::Push => EventKind::Push,
            EventArg::PullRequest => EventKind::PullRequest,
            EventArg::WorkflowDispatch => EventKind::WorkflowDispatch,
        }
    }
}

/// Run a workflow
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to workflow YAML file
    #[arg(short, long)]
    pub file: PathBuf,

    /// Event to simulate
    #[arg(long, value_enum, default_value_t = EventArg::Push)]
    pub event: EventArg,

    /// Branch pushed to, or targeted by the pull request
    #[arg(long, default_value = "main")]
    pub branch: String,

    /// Run only this job (its needs are not run)
    #[arg(long)]
    pub job: Option<String>,

    /// Environment overrides (KEY=VALUE)
    #[arg(long, value_parser = parse_key_value)]
    pub env: Vec<(String, String)>,

    /// Workspace directory (defaults to the current directory)
    #[arg(long)]
    pub workspace: Option<PathBuf>,

    /// Print what would run without running it
    #[arg(long)]
    pub dry_run: bool,
}

/// Validate a workflow file
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to workflow YAML file
    #[arg(short, long)]
    pub file: PathBuf,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// List jobs and steps of a workflow
#[derive(Debug, Args, Clone)]
pub struct ListCommand {
    /// Path to workflow YAML file
    #[arg(short, long)]
    pub file: PathBuf,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Check whether an event would trigger a workflow
#[derive(Debug, Args, Clone)]
pub struct TriggersCommand {
    /// Path to workflow YAML file
    #[arg(short, long)]
    pub file: PathBuf,

    /// Event to check
    #[arg(long, value_enum)]
    pub event: EventArg,

    /// Branch to check
    #[arg(long)]
    pub branch: String,
}

/// Parse key=value pairs
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("Invalid KEY=VALUE pair: {}", s)),
    }
}
