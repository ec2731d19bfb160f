//! Terminal reporter for workflow runs
//!
//! Two modes:
//!
//! - streaming: a `[N/M] Step name` header and a separator per step, then
//!   every output line as it arrives
//! - quiet: a spinner while a step runs; only the tail of the output of a
//!   failing step is printed

use crate::cli::output::{create_spinner, format_execution_event, format_output_tail, step_counter, style};
use crate::execution::{ExecutionEvent, OutputStream};
use indicatif::ProgressBar;
use std::io::{self, Write};
use std::sync::Mutex;

/// Lines of output shown for a failing step in quiet mode
pub const FAILURE_TAIL_LINES: usize = 20;

/// Prints execution events to the terminal
pub struct TerminalReporter {
    stream: bool,
    spinner: Mutex<Option<ProgressBar>>,
}

impl TerminalReporter {
    pub fn new(stream: bool) -> Self {
        Self {
            stream,
            spinner: Mutex::new(None),
        }
    }

    /// Handle one event; used as the engine's event handler
    pub fn handle(&self, event: &ExecutionEvent) {
        match event {
            ExecutionEvent::StepStarted {
                step_name,
                index,
                total,
                ..
            } => {
                if self.stream {
                    self.print_step_header(*index, *total, step_name);
                } else {
                    self.start_spinner(format!("{} {}", step_counter(*index, *total), step_name));
                }
            }
            ExecutionEvent::StepOutput { line, .. } => {
                if self.stream {
                    match line.stream {
                        OutputStream::Stdout => println!("{}", line.text),
                        OutputStream::Stderr => println!("{}", style(&line.text).dim()),
                    }
                    self.flush_stdout();
                }
            }
            ExecutionEvent::StepFailed { output, .. } => {
                self.stop_spinner();
                self.print_event(event);
                if !self.stream && !output.is_empty() {
                    println!("{}", format_output_tail(output, FAILURE_TAIL_LINES));
                }
            }
            _ => {
                self.stop_spinner();
                self.print_event(event);
            }
        }
    }

    fn print_event(&self, event: &ExecutionEvent) {
        if let Some(line) = format_execution_event(event) {
            println!("{}", line);
            self.flush_stdout();
        }
    }

    /// Print a step header followed by a separator
    fn print_step_header(&self, index: usize, total: usize, step_name: &str) {
        println!(
            "\n{} {}",
            style(step_counter(index, total)).cyan(),
            style(step_name).bold()
        );
        self.print_separator();
    }

    /// Print a horizontal rule spanning the terminal width
    fn print_separator(&self) {
        println!("{}", style(separator(terminal_width())).dim());
    }

    fn start_spinner(&self, message: String) {
        let mut guard = self.spinner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = guard.take() {
            previous.finish_and_clear();
        }
        *guard = Some(create_spinner(message));
    }

    fn stop_spinner(&self) {
        let mut guard = self.spinner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(spinner) = guard.take() {
            spinner.finish_and_clear();
        }
    }

    fn flush_stdout(&self) {
        let _ = io::stdout().flush();
    }
}

fn terminal_width() -> usize {
    term_size::dimensions_stdout()
        .map(|(w, _)| w)
        .unwrap_or(80)
}

fn separator(width: usize) -> String {
    "─".repeat(width.clamp(20, 120))
}
