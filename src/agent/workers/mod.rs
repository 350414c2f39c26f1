//! Built-in worker implementations

mod calendar;
pub mod dates;
mod info_collection;
mod planner;
mod search;
mod share;

pub use calendar::CalendarWorker;
pub use info_collection::InfoCollectionWorker;
pub use planner::{PlannerWorker, FOLLOW_UP};
pub use search::SearchWorker;
pub use share::{page_body, page_title, ShareWorker};

use super::{ErrorCode, Worker, WorkerId, WorkerResult};
use crate::provider::ChatModel;
use crate::templates::Templates;
use crate::tool::ToolResult;
use indexmap::IndexMap;
use std::sync::Arc;

/// Worker implementations keyed by id
pub type WorkerSet = IndexMap<WorkerId, Arc<dyn Worker>>;

/// Failure result for a tool call that came back as an error
pub(crate) fn failed_call(worker: WorkerId, tool: &str, result: &ToolResult) -> WorkerResult {
    let code = result
        .failure
        .map(ErrorCode::from)
        .unwrap_or(ErrorCode::UpstreamError);
    WorkerResult::failure(worker, code, format!("{} failed: {}", tool, result.output))
}

/// Deterministic implementations of every built-in worker
pub fn builtin_workers() -> WorkerSet {
    let mut workers: WorkerSet = IndexMap::new();
    workers.insert(WorkerId::InfoCollection, Arc::new(InfoCollectionWorker::new()));
    workers.insert(WorkerId::Search, Arc::new(SearchWorker::new()));
    workers.insert(WorkerId::Planner, Arc::new(PlannerWorker::new()));
    workers.insert(WorkerId::Calendar, Arc::new(CalendarWorker::new()));
    workers.insert(WorkerId::Share, Arc::new(ShareWorker::new()));
    workers
}

/// Built-in workers, with the planner writing prose through `model`
pub fn builtin_workers_with_model(model: Arc<dyn ChatModel>, templates: Arc<Templates>) -> WorkerSet {
    let mut workers = builtin_workers();
    workers.insert(
        WorkerId::Planner,
        Arc::new(PlannerWorker::new().with_model(model, templates)),
    );
    workers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::ToolFailure;

    #[test]
    fn test_builtin_workers_match_ids() {
        let workers = builtin_workers();
        assert_eq!(workers.len(), WorkerId::ALL.len());
        for (id, worker) in &workers {
            assert_eq!(worker.id(), *id);
        }
    }

    #[test]
    fn test_failed_call_keeps_failure_kind() {
        let result = failed_call(
            WorkerId::Search,
            "web_search",
            &ToolResult::failure(ToolFailure::Timeout, "slow"),
        );
        assert_eq!(result.error_code(), Some(ErrorCode::Timeout));
        assert_eq!(result.message(), "web_search failed: slow");
    }
}
