//! Built-in stand-ins for `uses:` actions
//!
//! Remote actions are never downloaded. The few actions a Rust workflow
//! depends on have a local meaning; everything else is unsupported.

use indexmap::IndexMap;
use std::path::Path;
use tracing::debug;

/// An action with a local implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinAction {
    /// `actions/checkout` - the workspace already is the checkout
    Checkout,
    /// `dtolnay/rust-toolchain`, `actions-rs/toolchain` - use the installed toolchain
    RustToolchain,
    /// `Swatinem/rust-cache`, `actions/cache` - nothing to restore
    Cache,
}

impl BuiltinAction {
    /// Look up an action reference such as `actions/checkout@v4`
    pub fn resolve(uses: &str) -> Option<Self> {
        let (name, _) = split_reference(uses);
        match name.to_ascii_lowercase().as_str() {
            "actions/checkout" => Some(BuiltinAction::Checkout),
            "dtolnay/rust-toolchain" | "actions-rs/toolchain" => Some(BuiltinAction::RustToolchain),
            "swatinem/rust-cache" | "actions/cache" => Some(BuiltinAction::Cache),
            _ => None,
        }
    }

    /// Run the action, returning the message to show as step output
    pub fn run(
        &self,
        uses: &str,
        inputs: &IndexMap<String, String>,
        workspace: &Path,
    ) -> Result<String, String> {
        debug!("Running built-in action {} with {:?}", uses, inputs);
        match self {
            BuiltinAction::Checkout => {
                if workspace.is_dir() {
                    Ok(format!("Using local workspace {}", workspace.display()))
                } else {
                    Err(format!(
                        "Workspace {} does not exist",
                        workspace.display()
                    ))
                }
            }
            BuiltinAction::RustToolchain => {
                let (_, reference) = split_reference(uses);
                let requested = inputs
                    .get("toolchain")
                    .map(String::as_str)
                    .or(reference)
                    .unwrap_or("stable");
                Ok(format!(
                    "Using the locally installed Rust toolchain (requested: {})",
                    requested
                ))
            }
            BuiltinAction::Cache => Ok(format!("{} skipped, no cache locally", uses)),
        }
    }
}

/// Run a `uses:` step; unknown actions fail the step
pub fn run_action(
    uses: &str,
    inputs: &IndexMap<String, String>,
    workspace: &Path,
) -> Result<String, String> {
    match BuiltinAction::resolve(uses) {
        Some(action) => action.run(uses, inputs, workspace),
        None => Err(format!("unsupported action '{}'", uses)),
    }
}

fn split_reference(uses: &str) -> (&str, Option<&str>) {
    match uses.trim().split_once('@') {
        Some((name, reference)) => (name, Some(reference)),
        None => (uses.trim(), None),
    }
}
