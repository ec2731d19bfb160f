//! Core domain models for workflows
//!
//! This module defines the fundamental data structures that represent
//! workflows, jobs, steps, triggers and their configuration.

pub mod config;
pub mod context;
pub mod state;
pub mod step;
pub mod trigger;
pub mod workflow;

pub use context::*;
pub use state::*;
pub use step::*;
pub use trigger::{Event, EventKind, Triggers};
pub use workflow::*;
