//! Job scheduler - determines which job to run next

use crate::core::{ExecutionStatus, Workflow};
use std::collections::HashSet;

/// Picks jobs one at a time in execution order
#[derive(Debug, Clone, Default)]
pub struct JobScheduler {
    /// Restrict the run to these jobs; `None` runs every job
    selected: Option<HashSet<String>>,
}

impl JobScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only run the given jobs
    pub fn with_selection(jobs: impl IntoIterator<Item = String>) -> Self {
        Self {
            selected: Some(jobs.into_iter().collect()),
        }
    }

    /// Check if a job takes part in this run
    pub fn is_selected(&self, job_id: &str) -> bool {
        self.selected
            .as_ref()
            .map_or(true, |jobs| jobs.contains(job_id))
    }

    /// Get the next job to run: the first pending job whose needs all completed
    pub fn next_job(&self, workflow: &Workflow) -> Option<String> {
        workflow
            .execution_order()
            .iter()
            .filter(|id| self.is_selected(id))
            .find(|id| {
                workflow.job(id).is_some_and(|job| {
                    job.status == ExecutionStatus::Pending
                        && job.needs.iter().all(|need| {
                            !self.is_selected(need)
                                || workflow
                                    .job(need)
                                    .is_some_and(|n| n.status == ExecutionStatus::Completed)
                        })
                })
            })
            .cloned()
    }

    /// Pending jobs that can never run because a needed job failed or was skipped
    ///
    /// Returns `(job, blocking need)` pairs in execution order.
    pub fn blocked_jobs(&self, workflow: &Workflow) -> Vec<(String, String)> {
        workflow
            .execution_order()
            .iter()
            .filter(|id| self.is_selected(id))
            .filter_map(|id| {
                let job = workflow.job(id)?;
                if job.status != ExecutionStatus::Pending {
                    return None;
                }
                job.needs
                    .iter()
                    .filter(|need| self.is_selected(need))
                    .find(|need| {
                        workflow.job(need).is_some_and(|n| {
                            matches!(
                                n.status,
                                ExecutionStatus::Failed
                                    | ExecutionStatus::Skipped
                                    | ExecutionStatus::Cancelled
                            )
                        })
                    })
                    .map(|need| (id.clone(), need.clone()))
            })
            .collect()
    }

    /// Check if there are more jobs to run
    pub fn has_more(&self, workflow: &Workflow) -> bool {
        self.next_job(workflow).is_some()
    }
}
