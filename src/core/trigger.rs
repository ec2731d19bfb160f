//! Workflow triggers - decides whether an event activates a workflow

use crate::core::config::{EventFilter, TriggerConfig};
use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Kind of repository event
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Push,
    PullRequest,
    WorkflowDispatch,
    /// Any other event name, kept verbatim
    Other(String),
}

impl EventKind {
    /// The name used for this event in workflow files
    pub fn as_str(&self) -> &str {
        match self {
            EventKind::Push => "push",
            EventKind::PullRequest => "pull_request",
            EventKind::WorkflowDispatch => "workflow_dispatch",
            EventKind::Other(name) => name,
        }
    }
}

impl FromStr for EventKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim() {
            "push" => EventKind::Push,
            "pull_request" => EventKind::PullRequest,
            "workflow_dispatch" => EventKind::WorkflowDispatch,
            other => EventKind::Other(other.to_string()),
        })
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event to evaluate a workflow against
///
/// For `push` the branch is the pushed branch, for `pull_request` it is
/// the branch the pull request targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    pub branch: String,
}

impl Event {
    pub fn new(kind: EventKind, branch: impl Into<String>) -> Self {
        Self {
            kind,
            branch: branch.into(),
        }
    }

    pub fn push(branch: impl Into<String>) -> Self {
        Self::new(EventKind::Push, branch)
    }

    pub fn pull_request(base_branch: impl Into<String>) -> Self {
        Self::new(EventKind::PullRequest, base_branch)
    }

    /// The fully qualified ref, as exposed in `GITHUB_REF`
    ///
    /// Always a branch ref. A hosted `pull_request` run uses
    /// `refs/pull/<number>/merge`, which has no local equivalent, so the
    /// target branch ref is used instead.
    pub fn git_ref(&self) -> String {
        format!("refs/heads/{}", self.branch)
    }
}

/// A branch pattern with hosted-runner wildcard rules
///
/// `*` matches within one `/`-separated segment, `**` matches anything,
/// `?` and `+` repeat the preceding character and `[...]` is a character
/// class. Everything else matches literally.
#[derive(Debug, Clone)]
struct BranchPattern {
    regex: Regex,
}

impl BranchPattern {
    fn new(pattern: &str) -> Result<Self> {
        let mut translated = String::from("^");
        let mut chars = pattern.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '*' if chars.peek() == Some(&'*') => {
                    chars.next();
                    translated.push_str(".*");
                }
                '*' => translated.push_str("[^/]*"),
                '?' | '+' => translated.push(c),
                '[' => {
                    let mut class = String::new();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        if c == ']' {
                            closed = true;
                            break;
                        }
                        class.push(c);
                    }
                    if !closed || class.is_empty() {
                        anyhow::bail!("unterminated character class");
                    }
                    translated.push('[');
                    for c in class.chars() {
                        match c {
                            '-' => translated.push('-'),
                            other => translated.push_str(&regex::escape(&other.to_string())),
                        }
                    }
                    translated.push(']');
                }
                other => translated.push_str(&regex::escape(&other.to_string())),
            }
        }
        translated.push('$');

        let regex = Regex::new(&translated)?;
        Ok(Self { regex })
    }

    fn matches(&self, branch: &str) -> bool {
        self.regex.is_match(branch)
    }
}

#[derive(Debug, Clone)]
struct BranchRule {
    pattern: BranchPattern,
    negated: bool,
}

/// Branch filter attached to one event
#[derive(Debug, Clone)]
enum BranchFilter {
    /// No filter, every branch matches
    Any,
    /// Ordered include list; a later `!pattern` excludes again
    Include(Vec<BranchRule>),
    /// Any match excludes the branch
    Ignore(Vec<BranchPattern>),
    /// Only tags were configured, branch events never match
    Never,
}

impl BranchFilter {
    fn from_config(event: &str, filter: &EventFilter) -> Result<Self> {
        if !filter.paths.is_empty() || !filter.paths_ignore.is_empty() {
            warn!("Path filters on '{}' are not evaluated locally", event);
        }
        if !filter.types.is_empty() {
            warn!("Activity types on '{}' are not evaluated locally", event);
        }

        if !filter.branches.is_empty() && !filter.branches_ignore.is_empty() {
            anyhow::bail!(
                "Event '{}' cannot use both 'branches' and 'branches-ignore'",
                event
            );
        }

        if !filter.branches.is_empty() {
            let rules = filter
                .branches
                .iter()
                .map(|raw| {
                    let (negated, source) = match raw.strip_prefix('!') {
                        Some(rest) => (true, rest),
                        None => (false, raw.as_str()),
                    };
                    let pattern = BranchPattern::new(source).with_context(|| {
                        format!("Invalid branch pattern '{}' on event '{}'", raw, event)
                    })?;
                    Ok(BranchRule { pattern, negated })
                })
                .collect::<Result<Vec<_>>>()?;

            if rules.iter().all(|r| r.negated) {
                anyhow::bail!(
                    "Branch filter on event '{}' needs at least one positive pattern",
                    event
                );
            }
            return Ok(BranchFilter::Include(rules));
        }

        if !filter.branches_ignore.is_empty() {
            let patterns = filter
                .branches_ignore
                .iter()
                .map(|raw| {
                    BranchPattern::new(raw).with_context(|| {
                        format!("Invalid branch pattern '{}' on event '{}'", raw, event)
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            return Ok(BranchFilter::Ignore(patterns));
        }

        if !filter.tags.is_empty() {
            return Ok(BranchFilter::Never);
        }

        Ok(BranchFilter::Any)
    }

    fn matches(&self, branch: &str) -> bool {
        match self {
            BranchFilter::Any => true,
            BranchFilter::Never => false,
            BranchFilter::Include(rules) => {
                let mut matched = false;
                for rule in rules {
                    if rule.pattern.matches(branch) {
                        matched = !rule.negated;
                    }
                }
                matched
            }
            BranchFilter::Ignore(patterns) => !patterns.iter().any(|p| p.matches(branch)),
        }
    }
}

/// Compiled trigger configuration of a workflow
#[derive(Debug, Clone)]
pub struct Triggers {
    events: Vec<(EventKind, BranchFilter)>,
}

impl Triggers {
    /// Compile the `on:` section, validating branch patterns
    pub fn from_config(config: &TriggerConfig) -> Result<Self> {
        let events = match config {
            TriggerConfig::Single(name) => vec![(parse_kind(name), BranchFilter::Any)],
            TriggerConfig::List(names) => names
                .iter()
                .map(|name| (parse_kind(name), BranchFilter::Any))
                .collect(),
            TriggerConfig::Events(map) => map
                .iter()
                .map(|(name, value)| {
                    let filter = match value {
                        Value::Null => BranchFilter::Any,
                        Value::Mapping(_) => {
                            let filter: EventFilter = serde_yaml::from_value(value.clone())
                                .with_context(|| format!("Invalid filter on event '{}'", name))?;
                            BranchFilter::from_config(name, &filter)?
                        }
                        _ => {
                            warn!("Configuration of '{}' is not evaluated locally", name);
                            BranchFilter::Any
                        }
                    };
                    Ok((parse_kind(name), filter))
                })
                .collect::<Result<Vec<_>>>()?,
        };

        Ok(Self { events })
    }

    /// Check whether the event activates the workflow
    pub fn matches(&self, event: &Event) -> bool {
        self.events
            .iter()
            .any(|(kind, filter)| *kind == event.kind && filter.matches(&event.branch))
    }

    /// Events listed in the workflow, in declaration order
    pub fn events(&self) -> impl Iterator<Item = &EventKind> {
        self.events.iter().map(|(kind, _)| kind)
    }
}

fn parse_kind(name: &str) -> EventKind {
    match name.parse() {
        Ok(kind) => kind,
        Err(never) => match never {},
    }
}
