//! Run event types
//!
//! Emitted by the orchestrator and tool boxes while a run executes, and
//! consumed by hosts (the CLI prints them in verbose mode). Events are
//! observational only: the conversation log is the record of truth.

use crate::agent::{ErrorCode, WorkerId};
use crate::supervisor::RunStatus;
use serde::Serialize;
use uuid::Uuid;

/// Events emitted during a run
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    // === Run Lifecycle ===
    RunStart {
        run_id: Uuid,
    },
    RunComplete {
        run_id: Uuid,
        status: RunStatus,
        iterations: u32,
    },

    // === Routing ===
    /// Routing policy returned a decision
    RoutingDecided {
        iteration: u32,
        next: String,
        directive: Option<String>,
        fault: Option<String>,
    },
    /// The orchestrator replaced the policy's choice because a precondition
    /// was unmet
    Redirected {
        requested: WorkerId,
        next: String,
        reason: String,
    },

    // === Workers ===
    WorkerStart {
        worker: WorkerId,
        directive: String,
    },
    WorkerEnd {
        worker: WorkerId,
        success: bool,
        error_code: Option<ErrorCode>,
        duration_ms: u64,
    },

    // === Tool Execution ===
    ToolCallStart {
        worker: WorkerId,
        call_id: String,
        tool: String,
        arguments: serde_json::Value,
    },
    ToolCallEnd {
        worker: WorkerId,
        call_id: String,
        tool: String,
        is_error: bool,
        duration_ms: u64,
    },

    // === Errors & Cancellation ===
    Error {
        error: String,
    },
    Cancelled,
}
