//! Workflow configuration from YAML

use crate::core::{trigger::Triggers, Workflow};
use anyhow::Result;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::HashSet;
use std::path::Path;

/// Top-level workflow configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Workflow name (defaults to the file name when loaded from disk)
    #[serde(default)]
    pub name: Option<String>,

    /// Events that activate the workflow
    pub on: TriggerConfig,

    /// Environment variables available to all jobs
    #[serde(default)]
    pub env: IndexMap<String, Value>,

    /// Defaults applied to every `run` step
    #[serde(default)]
    pub defaults: Option<DefaultsConfig>,

    /// Jobs, in declaration order
    pub jobs: IndexMap<String, JobConfig>,
}

/// The `on:` section - a single event, a list of events, or a map of filters
///
/// Values in the map stay raw: `schedule:` takes a list of crons and
/// `workflow_dispatch:` takes inputs, neither of which is a branch filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TriggerConfig {
    Single(String),
    List(Vec<String>),
    Events(IndexMap<String, Value>),
}

/// Filter attached to one event in the `on:` map, when the value is a mapping
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct EventFilter {
    pub branches: Vec<String>,
    pub branches_ignore: Vec<String>,
    pub tags: Vec<String>,
    pub paths: Vec<String>,
    pub paths_ignore: Vec<String>,
    pub types: Vec<String>,
}

/// `defaults:` block at workflow or job level
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DefaultsConfig {
    #[serde(default)]
    pub run: Option<RunDefaults>,
}

/// `defaults.run`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RunDefaults {
    pub shell: Option<String>,
    pub working_directory: Option<String>,
}

/// `needs:` - a single job id or a list
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Needs {
    One(String),
    Many(Vec<String>),
}

impl Default for Needs {
    fn default() -> Self {
        Needs::Many(Vec::new())
    }
}

impl Needs {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Needs::One(id) => vec![id.clone()],
            Needs::Many(ids) => ids.clone(),
        }
    }
}

/// Job configuration as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct JobConfig {
    /// Human-readable job name
    #[serde(default)]
    pub name: Option<String>,

    /// Runner label; informational only when running locally
    #[serde(default)]
    pub runs_on: Option<Value>,

    /// Jobs that must complete successfully first
    #[serde(default)]
    pub needs: Needs,

    /// Job-level environment
    #[serde(default)]
    pub env: IndexMap<String, Value>,

    /// Job-level defaults (override workflow defaults)
    #[serde(default)]
    pub defaults: Option<DefaultsConfig>,

    /// Default timeout for every step of the job
    #[serde(default)]
    pub timeout_minutes: Option<f64>,

    /// Steps, executed in order
    #[serde(default)]
    pub steps: Vec<StepConfig>,
}

/// Step configuration as defined in YAML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StepConfig {
    /// Optional step identifier
    #[serde(default)]
    pub id: Option<String>,

    /// Human-readable step name
    #[serde(default)]
    pub name: Option<String>,

    /// `if:` expression; kept for display, never evaluated
    #[serde(default, rename = "if")]
    pub condition: Option<String>,

    /// Action reference (`owner/repo@ref`)
    #[serde(default)]
    pub uses: Option<String>,

    /// Inline script
    #[serde(default)]
    pub run: Option<String>,

    /// Action inputs
    #[serde(default)]
    pub with: IndexMap<String, Value>,

    /// Step-level environment
    #[serde(default)]
    pub env: IndexMap<String, Value>,

    /// Shell used for `run`
    #[serde(default)]
    pub shell: Option<String>,

    /// Working directory for `run`, relative to the workspace
    #[serde(default)]
    pub working_directory: Option<String>,

    /// Keep going when this step fails
    #[serde(default)]
    pub continue_on_error: bool,

    /// Step timeout
    #[serde(default)]
    pub timeout_minutes: Option<f64>,
}

impl WorkflowConfig {
    /// Load workflow configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml(&content)?;
        if config.name.is_none() {
            config.name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned());
        }
        Ok(config)
    }

    /// Parse workflow configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: WorkflowConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the workflow configuration
    pub fn validate(&self) -> Result<()> {
        if self.jobs.is_empty() {
            anyhow::bail!("Workflow must define at least one job");
        }

        Triggers::from_config(&self.on)?;

        for (job_id, job) in &self.jobs {
            if job.steps.is_empty() {
                anyhow::bail!("Job '{}' must define at least one step", job_id);
            }

            if let Some(minutes) = job.timeout_minutes {
                if minutes <= 0.0 {
                    anyhow::bail!("Job '{}' has a non-positive timeout", job_id);
                }
            }

            let mut seen_ids = HashSet::new();
            for (index, step) in job.steps.iter().enumerate() {
                let label = step
                    .id
                    .clone()
                    .or_else(|| step.name.clone())
                    .unwrap_or_else(|| format!("#{}", index + 1));

                match (&step.uses, &step.run) {
                    (Some(_), Some(_)) => anyhow::bail!(
                        "Step '{}' in job '{}' cannot have both 'uses' and 'run'",
                        label,
                        job_id
                    ),
                    (None, None) => anyhow::bail!(
                        "Step '{}' in job '{}' must have either 'uses' or 'run'",
                        label,
                        job_id
                    ),
                    _ => {}
                }

                if let Some(id) = &step.id {
                    if !seen_ids.insert(id) {
                        anyhow::bail!("Duplicate step ID '{}' in job '{}'", id, job_id);
                    }
                }

                if let Some(minutes) = step.timeout_minutes {
                    if minutes <= 0.0 {
                        anyhow::bail!(
                            "Step '{}' in job '{}' has a non-positive timeout",
                            label,
                            job_id
                        );
                    }
                }
            }

            for need in job.needs.to_vec() {
                if need == *job_id {
                    anyhow::bail!("Job '{}' cannot need itself", job_id);
                }
                if !self.jobs.contains_key(&need) {
                    anyhow::bail!("Job '{}' needs non-existent job '{}'", job_id, need);
                }
            }
        }

        self.check_cycles()?;

        Ok(())
    }

    /// Check for cycles in the job `needs` graph
    fn check_cycles(&self) -> Result<()> {
        let mut visited = HashSet::new();
        let mut recursion_stack = HashSet::new();

        for job_id in self.jobs.keys() {
            if !visited.contains(job_id) {
                self.dfs_check(job_id, &mut visited, &mut recursion_stack)?;
            }
        }

        Ok(())
    }

    fn dfs_check(
        &self,
        job_id: &str,
        visited: &mut HashSet<String>,
        recursion_stack: &mut HashSet<String>,
    ) -> Result<()> {
        visited.insert(job_id.to_string());
        recursion_stack.insert(job_id.to_string());

        if let Some(job) = self.jobs.get(job_id) {
            for need in job.needs.to_vec() {
                if recursion_stack.contains(&need) {
                    anyhow::bail!("Cycle detected in job dependencies involving job '{}'", need);
                }
                if !visited.contains(&need) {
                    self.dfs_check(&need, visited, recursion_stack)?;
                }
            }
        }

        recursion_stack.remove(job_id);
        Ok(())
    }

    /// Workflow name, falling back to a generic label
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("workflow")
    }

    /// Convert config to a Workflow domain model
    pub fn to_workflow(&self) -> Result<Workflow> {
        Workflow::from_config(self)
    }
}

/// Render a YAML scalar used in `env:` or `with:` as a string
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Null => String::new(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

/// Render an `env:` or `with:` map to strings, preserving order
pub fn values_as_string_map(values: &IndexMap<String, Value>) -> IndexMap<String, String> {
    values
        .iter()
        .map(|(k, v)| (k.clone(), value_to_string(v)))
        .collect()
}
