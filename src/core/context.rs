//! Run context - environment layering and `${{ }}` substitution

use crate::core::trigger::{Event, EventKind};
use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::warn;

fn expression_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\$\{\{\s*(.*?)\s*\}\}").unwrap_or_else(|e| panic!("invalid expression regex: {e}"))
    })
}

/// Execution context for one job (and, via [`RunContext::for_step`], one step)
///
/// Holds the layered environment and the values exposed to expressions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunContext {
    /// Environment passed to steps, excluding the inherited process environment
    pub env: IndexMap<String, String>,

    /// `github.*` expression values
    pub github: IndexMap<String, String>,

    /// `runner.*` expression values
    pub runner: IndexMap<String, String>,

    /// Directory the workflow runs in
    pub workspace: PathBuf,

    /// Command-line overrides, applied last at every layer
    #[serde(default)]
    pub overrides: IndexMap<String, String>,
}

impl RunContext {
    /// Create a context with the runner-provided values for a job
    pub fn new(workflow: &str, job_id: &str, event: &Event, workspace: &Path) -> Self {
        let workspace_str = workspace.display().to_string();
        let temp_dir = std::env::temp_dir().display().to_string();

        let mut github = IndexMap::new();
        github.insert("workflow".to_string(), workflow.to_string());
        github.insert("job".to_string(), job_id.to_string());
        github.insert("event_name".to_string(), event.kind.to_string());
        github.insert("ref".to_string(), event.git_ref());
        github.insert("ref_name".to_string(), event.branch.clone());
        github.insert("workspace".to_string(), workspace_str.clone());
        if event.kind == EventKind::PullRequest {
            github.insert("base_ref".to_string(), event.branch.clone());
        }

        let mut runner = IndexMap::new();
        runner.insert("os".to_string(), runner_os().to_string());
        runner.insert("temp".to_string(), temp_dir.clone());

        let mut env = IndexMap::new();
        env.insert("CI".to_string(), "true".to_string());
        env.insert("GITHUB_WORKFLOW".to_string(), workflow.to_string());
        env.insert("GITHUB_JOB".to_string(), job_id.to_string());
        env.insert("GITHUB_EVENT_NAME".to_string(), event.kind.to_string());
        env.insert("GITHUB_REF".to_string(), event.git_ref());
        env.insert("GITHUB_REF_NAME".to_string(), event.branch.clone());
        if event.kind == EventKind::PullRequest {
            env.insert("GITHUB_BASE_REF".to_string(), event.branch.clone());
        }
        env.insert("GITHUB_WORKSPACE".to_string(), workspace_str);
        env.insert("RUNNER_OS".to_string(), runner_os().to_string());
        env.insert("RUNNER_TEMP".to_string(), temp_dir);

        Self {
            env,
            github,
            runner,
            workspace: workspace.to_path_buf(),
            overrides: IndexMap::new(),
        }
    }

    /// Layer environment variables on top; values are rendered first
    pub fn extend_env(&mut self, vars: &IndexMap<String, String>) {
        for (key, value) in vars {
            let rendered = self.render(value);
            self.env.insert(key.clone(), rendered);
        }
    }

    /// Set a variable verbatim
    pub fn set_env(&mut self, key: String, value: String) {
        self.env.insert(key, value);
    }

    /// Get a variable
    pub fn get_env(&self, key: &str) -> Option<&String> {
        self.env.get(key)
    }

    /// Install overrides that win over every env layer
    pub fn apply_overrides(&mut self, overrides: &IndexMap<String, String>) {
        self.overrides = overrides.clone();
        for (key, value) in overrides {
            self.env.insert(key.clone(), value.clone());
        }
    }

    /// Derive the context of a step from its job context
    pub fn for_step(&self, step_env: &IndexMap<String, String>) -> Self {
        let mut ctx = self.clone();
        ctx.extend_env(step_env);
        for (key, value) in &self.overrides {
            ctx.env.insert(key.clone(), value.clone());
        }
        ctx
    }

    /// Resolve a single expression such as `env.CARGO_TERM_COLOR`
    pub fn lookup(&self, expression: &str) -> Option<String> {
        let expression = expression.trim();

        if let Some(literal) = expression
            .strip_prefix('\'')
            .and_then(|rest| rest.strip_suffix('\''))
        {
            return Some(literal.replace("''", "'"));
        }

        let (scope, key) = expression.split_once('.')?;
        match scope {
            "env" => self.env.get(key).cloned(),
            "github" => self.github.get(key).cloned(),
            "runner" => self.runner.get(key).cloned(),
            _ => None,
        }
    }

    /// Substitute every `${{ expression }}` in the template
    ///
    /// Unknown expressions render as the empty string.
    pub fn render(&self, template: &str) -> String {
        if !template.contains("${{") {
            return template.to_string();
        }

        expression_regex()
            .replace_all(template, |caps: &regex::Captures| {
                let expression = &caps[1];
                match self.lookup(expression) {
                    Some(value) => value,
                    None => {
                        warn!("Expression '{}' is not available locally, using ''", expression);
                        String::new()
                    }
                }
            })
            .into_owned()
    }

    /// Resolve a (rendered) working directory against the workspace
    pub fn resolve_dir(&self, dir: Option<&str>) -> PathBuf {
        match dir {
            Some(dir) => {
                let rendered = self.render(dir);
                let path = Path::new(&rendered);
                if path.is_absolute() {
                    path.to_path_buf()
                } else {
                    self.workspace.join(path)
                }
            }
            None => self.workspace.clone(),
        }
    }

    /// Environment to hand to a child process (added on top of the inherited one)
    pub fn process_env(&self) -> HashMap<String, String> {
        self.env
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// `runner.os` value for the current platform
pub fn runner_os() -> &'static str {
    match std::env::consts::OS {
        "linux" => "Linux",
        "macos" => "macOS",
        "windows" => "Windows",
        other => other,
    }
}
