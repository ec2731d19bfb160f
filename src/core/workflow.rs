//! Workflow domain model

use crate::core::{
    config::{values_as_string_map, DefaultsConfig, JobConfig, WorkflowConfig},
    context::RunContext,
    state::{ExecutionStatus, RunState, StepState},
    step::{minutes_to_secs, Step, StepDefaults, DEFAULT_TIMEOUT_SECS},
    trigger::{Event, Triggers},
};
use anyhow::Result;
use indexmap::IndexMap;
use std::collections::HashSet;
use std::path::Path;

/// A job - an ordered list of steps run in one shell environment
#[derive(Debug, Clone)]
pub struct Job {
    /// Key of the job in the `jobs:` map
    pub id: String,

    /// Display name
    pub name: String,

    /// Jobs that must complete first
    pub needs: Vec<String>,

    /// Job-level environment (unrendered)
    pub env: IndexMap<String, String>,

    /// Steps, in execution order
    pub steps: Vec<Step>,

    /// Job status
    pub status: ExecutionStatus,
}

impl Job {
    fn from_config(id: &str, config: &JobConfig, workflow_defaults: Option<&DefaultsConfig>) -> Self {
        let workflow_run = workflow_defaults.and_then(|d| d.run.as_ref());
        let job_run = config.defaults.as_ref().and_then(|d| d.run.as_ref());

        let defaults = StepDefaults {
            shell: job_run
                .and_then(|r| r.shell.clone())
                .or_else(|| workflow_run.and_then(|r| r.shell.clone())),
            working_directory: job_run
                .and_then(|r| r.working_directory.clone())
                .or_else(|| workflow_run.and_then(|r| r.working_directory.clone())),
            timeout_secs: config
                .timeout_minutes
                .map(minutes_to_secs)
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
        };

        let steps = config
            .steps
            .iter()
            .enumerate()
            .map(|(index, step)| Step::from_config(step, index, &defaults))
            .collect();

        Job {
            id: id.to_string(),
            name: config.name.clone().unwrap_or_else(|| id.to_string()),
            needs: config.needs.to_vec(),
            env: values_as_string_map(&config.env),
            steps,
            status: ExecutionStatus::Pending,
        }
    }

    /// Number of steps in each terminal state: (completed, failed, skipped)
    pub fn step_counts(&self) -> (usize, usize, usize) {
        self.steps
            .iter()
            .fold((0, 0, 0), |(c, f, s), step| match step.state {
                StepState::Completed { .. } => (c + 1, f, s),
                StepState::Failed { .. } => (c, f + 1, s),
                StepState::Skipped { .. } => (c, f, s + 1),
                _ => (c, f, s),
            })
    }

    /// Mark every step that has not run as skipped
    pub fn skip_remaining(&mut self, reason: &str) {
        for step in &mut self.steps {
            if !step.state.is_terminal() {
                step.state = StepState::Skipped {
                    reason: reason.to_string(),
                };
            }
        }
    }
}

/// A workflow definition and its run state
#[derive(Debug, Clone)]
pub struct Workflow {
    /// Workflow name
    pub name: String,

    /// Compiled `on:` section
    pub triggers: Triggers,

    /// Workflow-level environment (unrendered)
    pub env: IndexMap<String, String>,

    /// Jobs in declaration order
    pub jobs: IndexMap<String, Job>,

    /// Execution state
    pub state: RunState,

    /// Job execution order (topological, declaration order breaks ties)
    execution_order: Vec<String>,
}

impl Workflow {
    /// Create a workflow from a validated configuration
    pub fn from_config(config: &WorkflowConfig) -> Result<Self> {
        let triggers = Triggers::from_config(&config.on)?;

        let jobs: IndexMap<String, Job> = config
            .jobs
            .iter()
            .map(|(id, job)| (id.clone(), Job::from_config(id, job, config.defaults.as_ref())))
            .collect();

        let execution_order = Self::topological_sort(&jobs);

        Ok(Workflow {
            name: config.display_name().to_string(),
            triggers,
            env: values_as_string_map(&config.env),
            jobs,
            state: RunState::new(),
            execution_order,
        })
    }

    /// Get a job by ID
    pub fn job(&self, id: &str) -> Option<&Job> {
        self.jobs.get(id)
    }

    /// Get a mutable job by ID
    pub fn job_mut(&mut self, id: &str) -> Option<&mut Job> {
        self.jobs.get_mut(id)
    }

    /// Check if the workflow should run for the event
    pub fn is_triggered_by(&self, event: &Event) -> bool {
        self.triggers.matches(event)
    }

    /// Check if every job is finished
    pub fn is_complete(&self) -> bool {
        self.jobs.values().all(|j| j.status.is_terminal())
    }

    /// Check if workflow has failed
    pub fn has_failed(&self) -> bool {
        self.state.status == ExecutionStatus::Failed
    }

    /// Stop the run: unfinished jobs become Cancelled and their unfinished
    /// steps Skipped with `reason`
    pub fn cancel(&mut self, reason: &str) {
        let (mut completed, mut failed, mut skipped) = (0, 0, 0);
        for job in self.jobs.values_mut() {
            if !job.status.is_terminal() {
                job.status = ExecutionStatus::Cancelled;
                job.skip_remaining(reason);
            }
            let (c, f, s) = job.step_counts();
            completed += c;
            failed += f;
            skipped += s;
        }
        self.state.update_counts(completed, failed, skipped);
        self.state.cancel();
    }

    /// Get execution order (topological sort)
    pub fn execution_order(&self) -> &[String] {
        &self.execution_order
    }

    /// Total number of steps across all jobs
    pub fn total_steps(&self) -> usize {
        self.jobs.values().map(|j| j.steps.len()).sum()
    }

    /// Calculate topological sort of jobs based on `needs`
    fn topological_sort(jobs: &IndexMap<String, Job>) -> Vec<String> {
        let mut result = Vec::new();
        let mut visited = HashSet::new();

        for job_id in jobs.keys() {
            Self::visit(job_id, jobs, &mut visited, &mut result);
        }

        result
    }

    fn visit(
        job_id: &str,
        jobs: &IndexMap<String, Job>,
        visited: &mut HashSet<String>,
        result: &mut Vec<String>,
    ) {
        if !visited.insert(job_id.to_string()) {
            return;
        }

        if let Some(job) = jobs.get(job_id) {
            for need in &job.needs {
                Self::visit(need, jobs, visited, result);
            }
        }

        result.push(job_id.to_string());
    }

    /// Create the execution context for a job
    ///
    /// Layers: runner variables, then workflow env, then job env, then overrides.
    pub fn create_context_for_job(
        &self,
        job_id: &str,
        event: &Event,
        workspace: &Path,
        overrides: &IndexMap<String, String>,
    ) -> RunContext {
        let mut context = RunContext::new(&self.name, job_id, event, workspace);
        context.extend_env(&self.env);
        if let Some(job) = self.jobs.get(job_id) {
            context.extend_env(&job.env);
        }
        context.apply_overrides(overrides);
        context
    }
}
