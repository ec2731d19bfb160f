//! CLI output formatting

use crate::{
    core::{ExecutionStatus, StepState},
    execution::ExecutionEvent,
};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "! ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");
pub static JOB: Emoji<'_, '_> = Emoji("🔧 ", "# ");
pub static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "- ");

/// Create a spinner for a running step
pub fn create_spinner(message: String) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Format a step state for display
pub fn format_step_state(state: &StepState) -> String {
    match state {
        StepState::Pending => style("PENDING").dim().to_string(),
        StepState::Running { .. } => style("RUNNING").yellow().to_string(),
        StepState::Completed { .. } => style("COMPLETED").green().to_string(),
        StepState::Failed { exit_code: Some(code), .. } => {
            style(format!("FAILED (exit {})", code)).red().to_string()
        }
        StepState::Failed { .. } => style("FAILED").red().to_string(),
        StepState::Skipped { .. } => style("SKIPPED").dim().to_string(),
    }
}

/// Format an execution status for display
pub fn format_status(status: ExecutionStatus) -> String {
    match status {
        ExecutionStatus::Pending => style("PENDING").dim().to_string(),
        ExecutionStatus::Running => style("RUNNING").yellow().to_string(),
        ExecutionStatus::Completed => style("COMPLETED").green().to_string(),
        ExecutionStatus::Failed => style("FAILED").red().to_string(),
        ExecutionStatus::Skipped => style("SKIPPED").dim().to_string(),
        ExecutionStatus::Cancelled => style("CANCELLED").yellow().to_string(),
    }
}

/// Format an execution event for display
///
/// Output lines return `None`; they are printed by the terminal reporter.
pub fn format_execution_event(event: &ExecutionEvent) -> Option<String> {
    let line = match event {
        ExecutionEvent::WorkflowStarted {
            execution_id,
            workflow_name,
            event,
            total_steps,
        } => format!(
            "{} Running {} for {} on {} ({} steps, {})",
            ROCKET,
            style(workflow_name).bold(),
            style(&event.kind).cyan(),
            style(&event.branch).cyan(),
            total_steps,
            style(&execution_id.to_string()[..8]).dim()
        ),
        ExecutionEvent::WorkflowSkipped {
            workflow_name,
            event,
            ..
        } => format!(
            "{} {} is not triggered by {} on {}",
            INFO,
            style(workflow_name).bold(),
            style(&event.kind).cyan(),
            style(&event.branch).cyan()
        ),
        ExecutionEvent::JobStarted {
            job_id,
            job_name,
            total_steps,
        } => {
            if job_name == job_id {
                format!("{} Job {} ({} steps)", JOB, style(job_id).bold(), total_steps)
            } else {
                format!(
                    "{} Job {} [{}] ({} steps)",
                    JOB,
                    style(job_name).bold(),
                    style(job_id).dim(),
                    total_steps
                )
            }
        }
        ExecutionEvent::JobSkipped { job_id, reason } => {
            format!("{} Job {} skipped: {}", SKIP, style(job_id).yellow(), style(reason).dim())
        }
        ExecutionEvent::JobCompleted { job_id, status } => {
            let icon = if *status == ExecutionStatus::Completed {
                CHECK
            } else {
                CROSS
            };
            format!("{} Job {} {}", icon, style(job_id).bold(), format_status(*status))
        }
        ExecutionEvent::StepStarted {
            step_name,
            index,
            total,
            ..
        } => format!("{} {} {}", SPINNER, step_counter(*index, *total), style(step_name).cyan()),
        ExecutionEvent::StepOutput { .. } => return None,
        ExecutionEvent::StepCompleted { step_id, .. } => {
            format!("{} {}", CHECK, style(step_id).green())
        }
        ExecutionEvent::StepFailed {
            step_id,
            error,
            continue_on_error,
            ..
        } => {
            let suffix = if *continue_on_error {
                style(" (continue-on-error)").dim().to_string()
            } else {
                String::new()
            };
            format!("{} {}: {}{}", CROSS, style(step_id).red(), error, suffix)
        }
        ExecutionEvent::StepSkipped {
            step_name, reason, ..
        } => format!("{} {} ({})", SKIP, style(step_name).dim(), style(reason).dim()),
        ExecutionEvent::WorkflowCompleted {
            execution_id,
            status,
        } => {
            let status_str = match status {
                ExecutionStatus::Completed => {
                    format!("completed {}", style("successfully").green())
                }
                ExecutionStatus::Failed => style("failed").red().to_string(),
                other => format_status(*other),
            };
            format!(
                "{} Workflow ({}) {}",
                INFO,
                style(&execution_id.to_string()[..8]).dim(),
                status_str
            )
        }
    };

    Some(line)
}

/// `[N/M]` prefix used for step headers
pub fn step_counter(index: usize, total: usize) -> String {
    format!("[{}/{}]", index, total)
}

/// Keep the last `max_lines` lines of step output
pub fn format_output_tail(output: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = output.lines().collect();

    if lines.len() <= max_lines {
        output.to_string()
    } else {
        let tail = lines[lines.len() - max_lines..].join("\n");
        format!(
            "{} ({} earlier lines)\n{}",
            style("[truncated]").dim(),
            lines.len() - max_lines,
            tail
        )
    }
}
