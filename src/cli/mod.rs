//! Command-line interface

pub mod commands;
pub mod output;
pub mod terminal_output;

use crate::core::ExecutionStatus;
use clap::{Parser, Subcommand};
use commands::{ListCommand, RunCommand, TriggersCommand, ValidateCommand};
use std::ffi::OsString;

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
/// 128 + SIGINT
pub const EXIT_INTERRUPTED: i32 = 130;

/// Run CI workflow definitions on the local machine
#[derive(Debug, Parser, Clone)]
#[command(name = "cirun")]
#[command(version)]
#[command(about = "Run CI workflow definitions on the local machine", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Stream step output as it is produced
    #[arg(short, long, global = true)]
    pub stream: bool,

    /// Disable coloured output
    #[arg(long, global = true)]
    pub no_color: bool,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run a workflow
    Run(RunCommand),

    /// Validate a workflow file
    Validate(ValidateCommand),

    /// List jobs and steps of a workflow
    List(ListCommand),

    /// Check whether an event would trigger a workflow
    Triggers(TriggersCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}

/// Exit code of `cirun run` for the final workflow status
///
/// A workflow that was not triggered is not an error.
pub fn run_exit_code(status: ExecutionStatus) -> i32 {
    match status {
        ExecutionStatus::Completed | ExecutionStatus::Skipped => EXIT_SUCCESS,
        ExecutionStatus::Cancelled => EXIT_INTERRUPTED,
        ExecutionStatus::Failed | ExecutionStatus::Pending | ExecutionStatus::Running => {
            EXIT_FAILURE
        }
    }
}

/// Exit code of `cirun triggers`
pub fn triggers_exit_code(triggered: bool) -> i32 {
    if triggered {
        EXIT_SUCCESS
    } else {
        EXIT_FAILURE
    }
}
