//! Main execution engine - orchestrates the entire workflow run

use crate::{
    core::{Event, ExecutionStatus, StepState, Workflow},
    execution::{
        runner::{CommandRunner, OutputCallback, OutputLine},
        ExecutionResult, JobScheduler, StepExecutor,
    },
};
use indexmap::IndexMap;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Reason recorded on steps after a failing step
pub const PREVIOUS_STEP_FAILED: &str = "previous step failed";

/// Events that can occur during workflow execution
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    WorkflowStarted {
        execution_id: Uuid,
        workflow_name: String,
        event: Event,
        total_steps: usize,
    },
    WorkflowSkipped {
        execution_id: Uuid,
        workflow_name: String,
        event: Event,
    },
    JobStarted {
        job_id: String,
        job_name: String,
        total_steps: usize,
    },
    JobSkipped {
        job_id: String,
        reason: String,
    },
    JobCompleted {
        job_id: String,
        status: ExecutionStatus,
    },
    StepStarted {
        job_id: String,
        step_id: String,
        step_name: String,
        /// 1-based position in the job
        index: usize,
        total: usize,
    },
    /// One line of live output
    StepOutput {
        job_id: String,
        step_id: String,
        line: OutputLine,
    },
    StepCompleted {
        job_id: String,
        step_id: String,
        output: String,
    },
    StepFailed {
        job_id: String,
        step_id: String,
        error: String,
        exit_code: Option<i32>,
        output: String,
        continue_on_error: bool,
    },
    StepSkipped {
        job_id: String,
        step_id: String,
        step_name: String,
        reason: String,
    },
    WorkflowCompleted {
        execution_id: Uuid,
        status: ExecutionStatus,
    },
}

/// Errors that abort a run before it can finish
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Job '{0}' does not exist in the workflow")]
    UnknownJob(String),

    #[error("Workflow stuck: jobs {0:?} can never run")]
    Stuck(Vec<String>),
}

/// Per-run settings
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Run only this job (its needs are not run)
    pub job: Option<String>,

    /// Environment overrides that win over every workflow layer
    pub env: IndexMap<String, String>,

    /// Directory the workflow runs in
    pub workspace: PathBuf,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            job: None,
            env: IndexMap::new(),
            workspace: PathBuf::from("."),
        }
    }
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

/// Forwards output lines of one step to the event handlers
struct StepOutputForwarder {
    job_id: String,
    step_id: String,
    handlers: Vec<EventHandler>,
}

impl OutputCallback for StepOutputForwarder {
    fn on_line(&self, line: &OutputLine) {
        let event = ExecutionEvent::StepOutput {
            job_id: self.job_id.clone(),
            step_id: self.step_id.clone(),
            line: line.clone(),
        };
        for handler in &self.handlers {
            handler(event.clone());
        }
    }
}

/// Main workflow execution engine
pub struct ExecutionEngine<R> {
    executor: Arc<StepExecutor<R>>,
    event_handlers: Arc<Mutex<Vec<EventHandler>>>,
}

impl<R: CommandRunner + 'static> ExecutionEngine<R> {
    pub fn new(runner: R) -> Self {
        Self {
            executor: Arc::new(StepExecutor::new(runner)),
            event_handlers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Add an event handler
    pub async fn add_event_handler<F>(&self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.event_handlers.lock().await.push(Arc::new(handler));
    }

    /// Emit an event to all handlers
    async fn emit_event(&self, event: ExecutionEvent) {
        let handlers = self.event_handlers.lock().await;
        for handler in handlers.iter() {
            handler(event.clone());
        }
    }

    /// Execute the workflow for an event
    ///
    /// Returns the final status: `Skipped` when the triggers do not match,
    /// `Failed` when any job failed, `Completed` otherwise.
    pub async fn execute(
        &self,
        workflow: &mut Workflow,
        event: &Event,
        options: &RunOptions,
    ) -> Result<ExecutionStatus, EngineError> {
        let execution_id = workflow.state.execution_id;
        let workflow_name = workflow.name.clone();

        let scheduler = match &options.job {
            Some(job_id) => {
                if workflow.job(job_id).is_none() {
                    return Err(EngineError::UnknownJob(job_id.clone()));
                }
                JobScheduler::with_selection([job_id.clone()])
            }
            None => JobScheduler::new(),
        };

        if !workflow.is_triggered_by(event) {
            info!(
                "Workflow {} is not triggered by {} on {}",
                workflow_name, event.kind, event.branch
            );
            for job in workflow.jobs.values_mut() {
                job.status = ExecutionStatus::Skipped;
                job.skip_remaining("workflow not triggered");
            }
            workflow.state.skip();
            self.emit_event(ExecutionEvent::WorkflowSkipped {
                execution_id,
                workflow_name,
                event: event.clone(),
            })
            .await;
            return Ok(ExecutionStatus::Skipped);
        }

        let total_steps = workflow
            .jobs
            .values()
            .filter(|job| scheduler.is_selected(&job.id))
            .map(|job| job.steps.len())
            .sum();

        info!("Starting workflow execution: {} ({})", workflow_name, execution_id);
        workflow.state.start(total_steps);
        self.emit_event(ExecutionEvent::WorkflowStarted {
            execution_id,
            workflow_name: workflow_name.clone(),
            event: event.clone(),
            total_steps,
        })
        .await;

        loop {
            for (job_id, need) in scheduler.blocked_jobs(workflow) {
                self.skip_job(workflow, &job_id, &need).await;
            }

            match scheduler.next_job(workflow) {
                Some(job_id) => self.execute_job(workflow, &job_id, event, options).await,
                None => break,
            }
        }

        let stuck: Vec<String> = workflow
            .jobs
            .values()
            .filter(|job| scheduler.is_selected(&job.id) && job.status == ExecutionStatus::Pending)
            .map(|job| job.id.clone())
            .collect();
        if !stuck.is_empty() {
            error!("No jobs ready to run - workflow stuck");
            workflow.state.fail();
            self.emit_event(ExecutionEvent::WorkflowCompleted {
                execution_id,
                status: ExecutionStatus::Failed,
            })
            .await;
            return Err(EngineError::Stuck(stuck));
        }

        let any_failed = workflow
            .jobs
            .values()
            .any(|job| job.status == ExecutionStatus::Failed);
        let status = if any_failed {
            workflow.state.fail();
            ExecutionStatus::Failed
        } else {
            workflow.state.complete();
            ExecutionStatus::Completed
        };

        info!("Workflow execution finished: {} - {:?}", workflow_name, status);
        self.emit_event(ExecutionEvent::WorkflowCompleted {
            execution_id,
            status,
        })
        .await;

        Ok(status)
    }

    /// Run every step of a job in order
    async fn execute_job(
        &self,
        workflow: &mut Workflow,
        job_id: &str,
        event: &Event,
        options: &RunOptions,
    ) {
        let context = workflow.create_context_for_job(job_id, event, &options.workspace, &options.env);

        let Some(job) = workflow.job_mut(job_id) else {
            return;
        };
        job.status = ExecutionStatus::Running;
        let job_name = job.name.clone();
        let total = job.steps.len();

        info!("Starting job: {} ({})", job_name, job_id);
        self.emit_event(ExecutionEvent::JobStarted {
            job_id: job_id.to_string(),
            job_name,
            total_steps: total,
        })
        .await;

        let mut job_failed = false;

        for index in 0..total {
            let Some(step) = workflow.job(job_id).map(|job| job.steps[index].clone()) else {
                return;
            };

            if job_failed {
                self.set_step_state(
                    workflow,
                    job_id,
                    index,
                    StepState::Skipped {
                        reason: PREVIOUS_STEP_FAILED.to_string(),
                    },
                );
                self.emit_event(ExecutionEvent::StepSkipped {
                    job_id: job_id.to_string(),
                    step_id: step.id.clone(),
                    step_name: step.name.clone(),
                    reason: PREVIOUS_STEP_FAILED.to_string(),
                })
                .await;
                continue;
            }

            let started_at = chrono::Utc::now();
            self.set_step_state(workflow, job_id, index, StepState::Running { started_at });
            self.emit_event(ExecutionEvent::StepStarted {
                job_id: job_id.to_string(),
                step_id: step.id.clone(),
                step_name: step.name.clone(),
                index: index + 1,
                total,
            })
            .await;

            let forwarder = StepOutputForwarder {
                job_id: job_id.to_string(),
                step_id: step.id.clone(),
                handlers: self.event_handlers.lock().await.clone(),
            };
            let step_context = context.for_step(&step.env);
            let result = self
                .executor
                .execute(&step, &step_context, Some(&forwarder))
                .await;

            match result {
                ExecutionResult::Success { output } => {
                    self.set_step_state(
                        workflow,
                        job_id,
                        index,
                        StepState::Completed {
                            output: output.clone(),
                            started_at,
                            completed_at: chrono::Utc::now(),
                        },
                    );
                    self.emit_event(ExecutionEvent::StepCompleted {
                        job_id: job_id.to_string(),
                        step_id: step.id.clone(),
                        output,
                    })
                    .await;
                }
                ExecutionResult::Failed {
                    error,
                    exit_code,
                    output,
                } => {
                    self.set_step_state(
                        workflow,
                        job_id,
                        index,
                        StepState::Failed {
                            error: error.clone(),
                            exit_code,
                            output: output.clone(),
                            started_at,
                            failed_at: chrono::Utc::now(),
                        },
                    );
                    if step.continue_on_error {
                        warn!("Step {} failed, continuing: {}", step.id, error);
                    } else {
                        job_failed = true;
                    }
                    self.emit_event(ExecutionEvent::StepFailed {
                        job_id: job_id.to_string(),
                        step_id: step.id.clone(),
                        error,
                        exit_code,
                        output,
                        continue_on_error: step.continue_on_error,
                    })
                    .await;
                }
            }

            self.update_state_counts(workflow);
        }

        let status = if job_failed {
            ExecutionStatus::Failed
        } else {
            ExecutionStatus::Completed
        };
        if let Some(job) = workflow.job_mut(job_id) {
            job.status = status;
        }
        self.update_state_counts(workflow);

        info!("Job {} finished - {:?}", job_id, status);
        self.emit_event(ExecutionEvent::JobCompleted {
            job_id: job_id.to_string(),
            status,
        })
        .await;
    }

    /// Skip a job whose need did not succeed
    async fn skip_job(&self, workflow: &mut Workflow, job_id: &str, need: &str) {
        let reason = format!("needed job '{}' did not succeed", need);
        if let Some(job) = workflow.job_mut(job_id) {
            job.status = ExecutionStatus::Skipped;
            job.skip_remaining(&reason);
        }
        self.update_state_counts(workflow);

        warn!("Skipping job {}: {}", job_id, reason);
        self.emit_event(ExecutionEvent::JobSkipped {
            job_id: job_id.to_string(),
            reason,
        })
        .await;
    }

    fn set_step_state(&self, workflow: &mut Workflow, job_id: &str, index: usize, state: StepState) {
        if let Some(step) = workflow
            .job_mut(job_id)
            .and_then(|job| job.steps.get_mut(index))
        {
            step.state = state;
        }
    }

    /// Update workflow state counts
    fn update_state_counts(&self, workflow: &mut Workflow) {
        let (completed, failed, skipped) =
            workflow
                .jobs
                .values()
                .fold((0, 0, 0), |(c, f, s), job| {
                    let (jc, jf, js) = job.step_counts();
                    (c + jc, f + jf, s + js)
                });

        workflow.state.update_counts(completed, failed, skipped);
    }
}
