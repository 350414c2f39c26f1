//! Worker contract
//!
//! A worker is a single-purpose unit invoked by the orchestrator with a
//! directive and a read-only snapshot. It returns a `WorkerResult`; tool
//! failures are captured in the result, never raised.

use crate::artifact::Artifact;
use crate::error::RegistryError;
use crate::state::Snapshot;
use crate::tool::{ToolBox, ToolCallRecord, ToolFailure};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The closed set of worker ids a routing decision may name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerId {
    InfoCollection,
    Search,
    Planner,
    Calendar,
    Share,
}

impl WorkerId {
    pub const ALL: [WorkerId; 5] = [
        WorkerId::InfoCollection,
        WorkerId::Search,
        WorkerId::Planner,
        WorkerId::Calendar,
        WorkerId::Share,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerId::InfoCollection => "info_collection",
            WorkerId::Search => "search",
            WorkerId::Planner => "planner",
            WorkerId::Calendar => "calendar",
            WorkerId::Share => "share",
        }
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkerId {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        // Agent-style aliases models tend to produce
        let normalized = normalized.trim_end_matches("_agent");
        WorkerId::ALL
            .into_iter()
            .find(|id| id.as_str() == normalized)
            .or(match normalized {
                "info" | "information_collection" => Some(WorkerId::InfoCollection),
                "location_search" => Some(WorkerId::Search),
                _ => None,
            })
            .ok_or_else(|| RegistryError::UnknownWorker(s.to_string()))
    }
}

/// Machine-readable reason for a failed worker result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    MissingQuery,
    EmptyResults,
    UpstreamError,
    UpstreamAuth,
    MalformedSearchContext,
    MissingStartDate,
    MissingEndDate,
    MissingEventId,
    NoFinalPlan,
    Timeout,
    Cancelled,
    ToolDenied,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::MissingQuery => "missing_query",
            ErrorCode::EmptyResults => "empty_results",
            ErrorCode::UpstreamError => "upstream_error",
            ErrorCode::UpstreamAuth => "upstream_auth",
            ErrorCode::MalformedSearchContext => "malformed_search_context",
            ErrorCode::MissingStartDate => "missing_start_date",
            ErrorCode::MissingEndDate => "missing_end_date",
            ErrorCode::MissingEventId => "missing_event_id",
            ErrorCode::NoFinalPlan => "no_final_plan",
            ErrorCode::Timeout => "timeout",
            ErrorCode::Cancelled => "cancelled",
            ErrorCode::ToolDenied => "tool_denied",
        }
    }

    /// Transient failures worth one more dispatch
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorCode::Timeout | ErrorCode::UpstreamError)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ToolFailure> for ErrorCode {
    fn from(failure: ToolFailure) -> Self {
        match failure {
            ToolFailure::Timeout => ErrorCode::Timeout,
            ToolFailure::Cancelled => ErrorCode::Cancelled,
            ToolFailure::Denied => ErrorCode::ToolDenied,
            ToolFailure::Unauthorized => ErrorCode::UpstreamAuth,
            ToolFailure::InvalidArguments | ToolFailure::Upstream | ToolFailure::Unavailable => {
                ErrorCode::UpstreamError
            }
        }
    }
}

/// Outcome of one worker invocation. `error_code` is set exactly when the
/// result is a failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerResult {
    worker: WorkerId,
    success: bool,
    #[serde(default)]
    artifact: Option<Artifact>,
    message: String,
    #[serde(default)]
    error_code: Option<ErrorCode>,
    #[serde(default)]
    tool_calls: Vec<ToolCallRecord>,
}

impl WorkerResult {
    pub fn success(worker: WorkerId, artifact: Artifact, message: impl Into<String>) -> Self {
        Self {
            worker,
            success: true,
            artifact: Some(artifact),
            message: message.into(),
            error_code: None,
            tool_calls: Vec::new(),
        }
    }

    pub fn failure(worker: WorkerId, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            worker,
            success: false,
            artifact: None,
            message: message.into(),
            error_code: Some(code),
            tool_calls: Vec::new(),
        }
    }

    /// Attach the tool calls made while producing this result
    pub fn with_tool_calls(mut self, calls: Vec<ToolCallRecord>) -> Self {
        self.tool_calls = calls;
        self
    }

    pub fn worker(&self) -> WorkerId {
        self.worker
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn artifact(&self) -> Option<&Artifact> {
        self.artifact.as_ref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        self.error_code
    }

    pub fn tool_calls(&self) -> &[ToolCallRecord] {
        &self.tool_calls
    }
}

#[async_trait]
pub trait Worker: Send + Sync {
    fn id(&self) -> WorkerId;

    /// Run once against a snapshot. Must not panic on missing context;
    /// report it as a failure instead.
    async fn run(&self, directive: &str, snapshot: &Snapshot, tools: &ToolBox) -> WorkerResult;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::ShareLink;

    #[test]
    fn test_worker_id_parsing() {
        assert_eq!("planner".parse::<WorkerId>().unwrap(), WorkerId::Planner);
        assert_eq!("info_collection".parse::<WorkerId>().unwrap(), WorkerId::InfoCollection);
        assert_eq!("Calendar-Agent".parse::<WorkerId>().unwrap(), WorkerId::Calendar);
        assert_eq!("location_search_agent".parse::<WorkerId>().unwrap(), WorkerId::Search);
        assert!("verifier".parse::<WorkerId>().is_err());
        assert!("".parse::<WorkerId>().is_err());
    }

    #[test]
    fn test_error_code_present_only_on_failure() {
        let ok = WorkerResult::success(
            WorkerId::Share,
            Artifact::ShareLink(ShareLink {
                page_id: "p".into(),
                url: "u".into(),
                title: "t".into(),
            }),
            "shared",
        );
        assert!(ok.is_success());
        assert_eq!(ok.error_code(), None);

        let failed = WorkerResult::failure(WorkerId::Share, ErrorCode::NoFinalPlan, "nothing to share");
        assert!(!failed.is_success());
        assert_eq!(failed.error_code(), Some(ErrorCode::NoFinalPlan));
        assert!(failed.artifact().is_none());
    }

    #[test]
    fn test_tool_failure_maps_to_error_code() {
        assert_eq!(ErrorCode::from(ToolFailure::Timeout), ErrorCode::Timeout);
        assert_eq!(ErrorCode::from(ToolFailure::Unauthorized), ErrorCode::UpstreamAuth);
        assert!(ErrorCode::Timeout.is_retryable());
        assert!(!ErrorCode::MissingEndDate.is_retryable());
    }
}
