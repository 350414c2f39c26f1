//! Routing decision types

use crate::agent::WorkerId;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Sentinel a routing model uses to end a run
pub const FINISH: &str = "FINISH";

/// What the orchestrator does next
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Next {
    Dispatch { worker: WorkerId, directive: String },
    Finish,
}

impl Next {
    pub fn worker(&self) -> Option<WorkerId> {
        match self {
            Next::Dispatch { worker, .. } => Some(*worker),
            Next::Finish => None,
        }
    }
}

impl fmt::Display for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Next::Dispatch { worker, .. } => f.write_str(worker.as_str()),
            Next::Finish => f.write_str(FINISH),
        }
    }
}

/// Why a routing decision did not come straight from the policy's model
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "fault", content = "detail", rename_all = "snake_case")]
pub enum RoutingFault {
    #[error("malformed routing output: {0}")]
    Malformed(String),
    #[error("routing named unknown worker: {0}")]
    UnknownWorker(String),
    #[error("routing model unavailable: {0}")]
    Transport(String),
    #[error("routing timed out")]
    Timeout,
    #[error("preconditions cannot be satisfied: {0}")]
    Unresolved(String),
}

impl RoutingFault {
    /// Faults that end the run instead of falling back
    pub fn forces_finish(&self) -> bool {
        matches!(self, RoutingFault::UnknownWorker(_) | RoutingFault::Unresolved(_))
    }
}

/// Output of a routing policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingDecision {
    pub next: Next,
    pub fault: Option<RoutingFault>,
}

impl RoutingDecision {
    pub fn dispatch(worker: WorkerId, directive: impl Into<String>) -> Self {
        Self {
            next: Next::Dispatch {
                worker,
                directive: directive.into(),
            },
            fault: None,
        }
    }

    pub fn finish() -> Self {
        Self {
            next: Next::Finish,
            fault: None,
        }
    }

    pub fn with_fault(mut self, fault: RoutingFault) -> Self {
        self.fault = Some(fault);
        self
    }
}

/// Routing-decision turn payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub next: Next,
    #[serde(default)]
    pub fault: Option<RoutingFault>,
    /// Set when the orchestrator overrode the policy's choice
    #[serde(default)]
    pub redirected_from: Option<WorkerId>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl From<&RoutingDecision> for DecisionRecord {
    fn from(decision: &RoutingDecision) -> Self {
        Self {
            next: decision.next.clone(),
            fault: decision.fault.clone(),
            redirected_from: None,
            reason: None,
        }
    }
}

/// Terminal status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Aborted,
    Error,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Completed => "completed",
            RunStatus::Aborted => "aborted",
            RunStatus::Error => "error",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
