//! Step domain model

use crate::core::{
    config::{value_to_string, values_as_string_map, StepConfig},
    state::StepState,
};
use indexmap::IndexMap;
use tracing::warn;

/// Six hours, the hosted-runner default
pub const DEFAULT_TIMEOUT_SECS: u64 = 360 * 60;

/// What a step does
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepAction {
    /// Inline script executed by a shell
    Run { script: String },
    /// Reference to an action (`owner/repo@ref`)
    Uses {
        action: String,
        inputs: IndexMap<String, String>,
    },
}

/// A single step in a job
#[derive(Debug, Clone)]
pub struct Step {
    /// Explicit `id`, or a positional identifier
    pub id: String,

    /// Display name
    pub name: String,

    /// What the step runs
    pub action: StepAction,

    /// Step-level environment (unrendered)
    pub env: IndexMap<String, String>,

    /// Shell for `run` steps after applying defaults
    pub shell: Option<String>,

    /// Working directory after applying defaults (unrendered)
    pub working_directory: Option<String>,

    /// `if:` expression; not evaluated, the step always runs
    pub condition: Option<String>,

    /// A failure does not fail the job
    pub continue_on_error: bool,

    /// Timeout in seconds
    pub timeout_secs: u64,

    /// Runtime state
    pub state: StepState,
}

/// Values inherited from job and workflow level
#[derive(Debug, Clone)]
pub struct StepDefaults {
    pub shell: Option<String>,
    pub working_directory: Option<String>,
    pub timeout_secs: u64,
}

impl Default for StepDefaults {
    fn default() -> Self {
        Self {
            shell: None,
            working_directory: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl Step {
    /// Create a step from a validated step config
    pub fn from_config(config: &StepConfig, index: usize, defaults: &StepDefaults) -> Self {
        let action = match (&config.uses, &config.run) {
            (Some(action), _) => StepAction::Uses {
                action: action.trim().to_string(),
                inputs: config
                    .with
                    .iter()
                    .map(|(k, v)| (k.clone(), value_to_string(v)))
                    .collect(),
            },
            (None, run) => StepAction::Run {
                script: run.clone().unwrap_or_default(),
            },
        };

        let name = config
            .name
            .clone()
            .unwrap_or_else(|| default_display_name(&action));

        let timeout_secs = config
            .timeout_minutes
            .map(minutes_to_secs)
            .unwrap_or(defaults.timeout_secs);

        let id = config
            .id
            .clone()
            .unwrap_or_else(|| format!("step-{}", index + 1));

        if let Some(condition) = &config.condition {
            warn!(
                "Step '{}' has condition '{}', which is not evaluated locally; the step always runs",
                id, condition
            );
        }

        Step {
            id,
            name,
            action,
            env: values_as_string_map(&config.env),
            shell: config.shell.clone().or_else(|| defaults.shell.clone()),
            working_directory: config
                .working_directory
                .clone()
                .or_else(|| defaults.working_directory.clone()),
            condition: config.condition.clone(),
            continue_on_error: config.continue_on_error,
            timeout_secs,
            state: StepState::Pending,
        }
    }

    /// The script of a `run` step
    pub fn script(&self) -> Option<&str> {
        match &self.action {
            StepAction::Run { script } => Some(script),
            StepAction::Uses { .. } => None,
        }
    }

    /// The action reference of a `uses` step
    pub fn uses(&self) -> Option<&str> {
        match &self.action {
            StepAction::Uses { action, .. } => Some(action),
            StepAction::Run { .. } => None,
        }
    }

    /// One-line summary of what the step runs
    pub fn summary(&self) -> String {
        match &self.action {
            StepAction::Run { script } => first_line(script).to_string(),
            StepAction::Uses { action, .. } => action.clone(),
        }
    }
}

fn default_display_name(action: &StepAction) -> String {
    match action {
        StepAction::Run { script } => format!("Run {}", first_line(script)),
        StepAction::Uses { action, .. } => format!("Run {}", action),
    }
}

fn first_line(script: &str) -> &str {
    script
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("")
}

pub(crate) fn minutes_to_secs(minutes: f64) -> u64 {
    (minutes * 60.0).round().max(1.0) as u64
}
