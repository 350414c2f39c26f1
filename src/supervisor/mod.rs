//! Supervisor
//!
//! - `RoutingPolicy`: picks the next worker or finishes
//! - `LlmRouter` / `RuleRouter`: the model-backed and deterministic policies
//! - `guard`: structural preconditions applied to every dispatch
//! - `Orchestrator`: the run loop

mod decision;
pub mod guard;
mod llm;
mod orchestrator;
mod rules;

pub use decision::*;
pub use llm::{fact_lines, LlmRouter};
pub use orchestrator::{
    dispatched, Orchestrator, RunContext, RunOutcome, DEFAULT_MAX_ITERATIONS, DEFAULT_TOOL_TIMEOUT,
};
pub use rules::RuleRouter;

use crate::state::Snapshot;
use async_trait::async_trait;

#[async_trait]
pub trait RoutingPolicy: Send + Sync {
    /// Never fails: unusable input becomes a fallback decision carrying a
    /// fault
    async fn decide(&self, snapshot: &Snapshot) -> RoutingDecision;
}
