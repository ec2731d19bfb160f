use anyhow::{Context, Result};
use cirun::cli::commands::{ListCommand, RunCommand, TriggersCommand, ValidateCommand};
use cirun::cli::output::*;
use cirun::cli::terminal_output::TerminalReporter;
use cirun::cli::{run_exit_code, triggers_exit_code, Cli, Command, EXIT_FAILURE, EXIT_SUCCESS};
use cirun::core::config::WorkflowConfig;
use cirun::core::{Event, ExecutionStatus, Workflow};
use cirun::execution::{CommandRunner, DryRunRunner, ExecutionEngine, RunOptions, ShellRunner};
use std::sync::Arc;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    if cli.no_color {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(!cli.no_color)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    // Execute command
    let code = match &cli.command {
        Command::Run(cmd) => run_workflow(cmd, cli.stream).await?,
        Command::Validate(cmd) => validate_workflow(cmd)?,
        Command::List(cmd) => list_jobs(cmd)?,
        Command::Triggers(cmd) => check_triggers(cmd)?,
    };

    if code != EXIT_SUCCESS {
        std::process::exit(code);
    }
    Ok(())
}

fn load_workflow(file: &std::path::Path) -> Result<Workflow> {
    let config = WorkflowConfig::from_file(file)
        .with_context(|| format!("Failed to load workflow config {}", file.display()))?;
    config.to_workflow()
}

async fn run_workflow(cmd: &RunCommand, stream: bool) -> Result<i32> {
    let mut workflow = load_workflow(&cmd.file)?;

    println!("{} Loaded workflow: {}", INFO, style(&workflow.name).bold());

    let workspace = match &cmd.workspace {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("Failed to read current directory")?,
    };
    let workspace = workspace
        .canonicalize()
        .with_context(|| format!("Workspace {} does not exist", workspace.display()))?;

    // Apply environment overrides
    for (key, value) in &cmd.env {
        println!(
            "{} Environment override: {} = {}",
            INFO,
            style(key).cyan(),
            style(value).dim()
        );
    }

    let options = RunOptions {
        job: cmd.job.clone(),
        env: cmd.env.iter().cloned().collect(),
        workspace,
    };
    let event = Event::new(cmd.event.into(), cmd.branch.clone());
    let reporter = Arc::new(TerminalReporter::new(stream));

    println!();
    let status = if cmd.dry_run {
        execute(DryRunRunner, &mut workflow, &event, &options, reporter).await?
    } else {
        execute(ShellRunner::new(), &mut workflow, &event, &options, reporter).await?
    };

    print_summary(&workflow, &options);

    // Print final status
    match status {
        ExecutionStatus::Completed => {
            println!(
                "\n{} {} completed {}",
                CHECK,
                style(&workflow.name).bold(),
                style("successfully").green()
            );
        }
        ExecutionStatus::Skipped => {
            println!("\n{} Nothing to run", INFO);
        }
        ExecutionStatus::Cancelled => {
            println!("\n{} {} {}", WARN, style(&workflow.name).bold(), style("interrupted").yellow());
        }
        _ => {
            println!(
                "\n{} {} {}",
                CROSS,
                style(&workflow.name).bold(),
                style("failed").red()
            );
            error!(
                "{} of {} steps failed",
                workflow.state.failed_steps, workflow.state.total_steps
            );
        }
    }

    Ok(run_exit_code(status))
}

async fn execute<R: CommandRunner + 'static>(
    runner: R,
    workflow: &mut Workflow,
    event: &Event,
    options: &RunOptions,
    reporter: Arc<TerminalReporter>,
) -> Result<ExecutionStatus> {
    let engine = ExecutionEngine::new(runner);

    // Set up event handler for console output
    engine
        .add_event_handler(move |event| reporter.handle(&event))
        .await;

    tokio::select! {
        result = engine.execute(workflow, event, options) => return Ok(result?),
        _ = tokio::signal::ctrl_c() => {}
    }

    workflow.cancel("interrupted");
    Ok(ExecutionStatus::Cancelled)
}

fn print_summary(workflow: &Workflow, options: &RunOptions) {
    if workflow.state.status == ExecutionStatus::Skipped {
        return;
    }

    println!("\n{}", style("Summary").bold());
    for job_id in workflow.execution_order() {
        if options.job.as_ref().is_some_and(|only| only != job_id) {
            continue;
        }
        let Some(job) = workflow.job(job_id) else {
            continue;
        };
        println!("  {} {}", style(&job.name).bold(), format_status(job.status));
        for step in &job.steps {
            println!("    {} {}", format_step_state(&step.state), step.name);
        }
    }
}

fn validate_workflow(cmd: &ValidateCommand) -> Result<i32> {
    println!("{} Validating workflow...", INFO);

    let result = WorkflowConfig::from_file(&cmd.file);

    match result {
        Ok(config) => {
            let workflow = config.to_workflow()?;
            let events: Vec<String> = workflow.triggers.events().map(|e| e.to_string()).collect();

            println!("{} Workflow configuration is valid!", CHECK);
            println!("  Name: {}", style(&workflow.name).bold());
            println!("  Events: {}", style(events.join(", ")).cyan());
            println!("  Jobs: {}", style(workflow.jobs.len()).cyan());
            println!("  Steps: {}", style(workflow.total_steps()).cyan());

            if cmd.json {
                let json = serde_json::to_string_pretty(&config)?;
                println!("\n{}", json);
            }
            Ok(EXIT_SUCCESS)
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(format!("{:#}", e)).red());
            Ok(EXIT_FAILURE)
        }
    }
}

fn list_jobs(cmd: &ListCommand) -> Result<i32> {
    let workflow = load_workflow(&cmd.file)?;

    if cmd.json {
        let jobs: Vec<_> = workflow
            .execution_order()
            .iter()
            .filter_map(|id| workflow.job(id))
            .map(|job| {
                serde_json::json!({
                    "id": job.id,
                    "name": job.name,
                    "needs": job.needs,
                    "steps": job.steps.iter().map(|step| serde_json::json!({
                        "id": step.id,
                        "name": step.name,
                        "runs": step.summary(),
                        "if": step.condition,
                        "continue_on_error": step.continue_on_error,
                    })).collect::<Vec<_>>(),
                })
            })
            .collect();
        let data = serde_json::json!({ "workflow": workflow.name, "jobs": jobs });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(EXIT_SUCCESS);
    }

    println!("{} Jobs in {}:", INFO, style(&workflow.name).bold());
    for job_id in workflow.execution_order() {
        let Some(job) = workflow.job(job_id) else {
            continue;
        };
        if job.needs.is_empty() {
            println!("  {}", style(&job.name).bold());
        } else {
            println!(
                "  {} {}",
                style(&job.name).bold(),
                style(format!("(needs {})", job.needs.join(", "))).dim()
            );
        }
        for (index, step) in job.steps.iter().enumerate() {
            println!(
                "    {} {} {}",
                style(step_counter(index + 1, job.steps.len())).dim(),
                step.name,
                style(step.summary()).dim()
            );
        }
    }

    Ok(EXIT_SUCCESS)
}

fn check_triggers(cmd: &TriggersCommand) -> Result<i32> {
    let workflow = load_workflow(&cmd.file)?;
    let event = Event::new(cmd.event.into(), cmd.branch.clone());

    let triggered = workflow.is_triggered_by(&event);
    if triggered {
        println!(
            "{} {} runs for {} on {}",
            CHECK,
            style(&workflow.name).bold(),
            style(&event.kind).cyan(),
            style(&event.branch).cyan()
        );
    } else {
        println!(
            "{} {} does not run for {} on {}",
            CROSS,
            style(&workflow.name).bold(),
            style(&event.kind).cyan(),
            style(&event.branch).cyan()
        );
    }

    Ok(triggers_exit_code(triggered))
}
