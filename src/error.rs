//! Error types
//!
//! One enum per layer. Worker-level failures are not errors here: they are
//! data carried in `WorkerResult` and never abort a run.

use crate::agent::WorkerId;
use thiserror::Error;

/// Rejected append to the conversation log
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("turn has no role")]
    MissingRole,
    #[error("turn has no payload")]
    MissingPayload,
    #[error("turn origin is empty")]
    EmptyOrigin,
    #[error("history out of sequence: expected turn {expected}, found {found}")]
    OutOfSequence { expected: u64, found: u64 },
}

/// Capability registry failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("unknown worker: {0}")]
    UnknownWorker(String),
    #[error("worker {worker} is bound to unknown tool {tool}")]
    UnknownTool { worker: WorkerId, tool: String },
    #[error("no implementation for worker {0}")]
    MissingWorker(WorkerId),
}

/// Failures reported by external collaborators
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("upstream error: {0}")]
    Upstream(String),
    #[error("service not configured: {0}")]
    Unavailable(String),
}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(reqwest::StatusCode::UNAUTHORIZED) => ServiceError::Unauthorized(e.to_string()),
            _ => ServiceError::Upstream(e.to_string()),
        }
    }
}

/// LLM provider failures
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{0} not found in environment or auth.json")]
    MissingApiKey(String),
    #[error("failed to build request: {0}")]
    Request(String),
    #[error("API call failed: {0}")]
    Api(String),
    #[error("model returned no content")]
    EmptyResponse,
}

/// Configuration loading failures
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid setting {key}: {message}")]
    Invalid { key: String, message: String },
}

/// Errors that prevent a planner from being built or a request from running
#[derive(Debug, Error)]
pub enum PlannerError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("template error: {0}")]
    Template(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = StateError::OutOfSequence {
            expected: 2,
            found: 5,
        };
        assert_eq!(
            err.to_string(),
            "history out of sequence: expected turn 2, found 5"
        );

        let err = RegistryError::UnknownTool {
            worker: WorkerId::Search,
            tool: "teleport".into(),
        };
        assert_eq!(err.to_string(), "worker search is bound to unknown tool teleport");
    }

    #[test]
    fn test_planner_error_wraps_registry() {
        let err: PlannerError = RegistryError::MissingWorker(WorkerId::Share).into();
        assert!(matches!(err, PlannerError::Registry(_)));
        assert_eq!(err.to_string(), "no implementation for worker share");
    }
}
