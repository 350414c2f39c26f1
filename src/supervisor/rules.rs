//! Deterministic rule router
//!
//! Keyword and recency rules over the conversation. Used offline and as the
//! fallback whenever the model router's output cannot be used.

use super::{DecisionRecord, Next, RoutingDecision, RoutingPolicy};
use crate::agent::{WorkerId, WorkerResult};
use crate::artifact::CalendarAction;
use crate::facts;
use crate::intent;
use crate::state::{Payload, Snapshot, Turn};
use async_trait::async_trait;

/// How many times a worker may fail with a retryable code within one
/// request before the run finishes
const MAX_ATTEMPTS: usize = 2;

#[derive(Debug, Clone, Copy, Default)]
pub struct RuleRouter;

impl RuleRouter {
    pub fn new() -> Self {
        Self
    }

    /// The decision for `turns`. Pure: the same turns give the same decision.
    pub fn route(&self, turns: &[Turn]) -> RoutingDecision {
        if facts::question_pending(turns) {
            return RoutingDecision::finish();
        }

        if let Some(failed) = last_failure(turns) {
            return retry_or_finish(turns, failed);
        }

        let user_text = facts::last_user_text(turns);
        if intent::is_calendar_management(user_text) && !facts::ran_since_user(turns, WorkerId::Calendar) {
            return RoutingDecision::dispatch(WorkerId::Calendar, "");
        }

        if facts::plan_finished(turns) {
            return after_plan(turns, user_text);
        }

        if !facts::info_complete(turns) {
            return RoutingDecision::dispatch(WorkerId::InfoCollection, "");
        }
        if !facts::hits_current(turns) {
            if intent::skip_search(user_text) {
                return RoutingDecision::dispatch(WorkerId::Planner, "");
            }
            let query = facts::travel_info(turns)
                .map(|f| f.value.search_query())
                .unwrap_or_default();
            return RoutingDecision::dispatch(WorkerId::Search, query);
        }
        if !facts::draft_current(turns) {
            return RoutingDecision::dispatch(WorkerId::Planner, "");
        }
        if !facts::details_current(turns) {
            return RoutingDecision::dispatch(WorkerId::Search, "");
        }
        RoutingDecision::dispatch(WorkerId::Planner, "")
    }
}

#[async_trait]
impl RoutingPolicy for RuleRouter {
    async fn decide(&self, snapshot: &Snapshot) -> RoutingDecision {
        self.route(snapshot)
    }
}

/// The newest worker result since the user spoke, if it failed
fn last_failure(turns: &[Turn]) -> Option<&WorkerResult> {
    facts::results_since_user(turns)
        .last()
        .filter(|result| !result.is_success())
}

fn retry_or_finish(turns: &[Turn], failed: &WorkerResult) -> RoutingDecision {
    let retryable = failed.error_code().is_some_and(|code| code.is_retryable());
    let attempts = facts::results_since_user(turns)
        .filter(|r| r.worker() == failed.worker() && !r.is_success())
        .count();
    if !retryable || attempts >= MAX_ATTEMPTS {
        return RoutingDecision::finish();
    }
    RoutingDecision::dispatch(failed.worker(), last_directive(turns, failed.worker()))
}

/// Directive of the newest dispatch to `worker`
fn last_directive(turns: &[Turn], worker: WorkerId) -> String {
    turns
        .iter()
        .rev()
        .find_map(|turn| match turn.payload() {
            Payload::Decision(DecisionRecord {
                next: Next::Dispatch { worker: w, directive },
                ..
            }) if *w == worker => Some(directive.clone()),
            _ => None,
        })
        .unwrap_or_default()
}

/// Routing once the plan is done: follow-up requests, or a changed trip
fn after_plan(turns: &[Turn], user_text: &str) -> RoutingDecision {
    let plan_seq = facts::final_plan(turns).map(|f| f.seq);
    let user_seq = facts::last_user(turns).map(|f| f.seq);

    if intent::calendar_action(user_text) == Some(CalendarAction::Create)
        && !facts::ran_since_user(turns, WorkerId::Calendar)
    {
        return RoutingDecision::dispatch(WorkerId::Calendar, "");
    }
    if intent::wants_share(user_text) && !facts::ran_since_user(turns, WorkerId::Share) {
        return RoutingDecision::dispatch(WorkerId::Share, "");
    }

    // A new message with no follow-up intent may change the trip
    let unanswered = matches!((user_seq, plan_seq), (Some(u), Some(p)) if u > p);
    if unanswered && facts::results_since_user(turns).next().is_none() {
        return RoutingDecision::dispatch(WorkerId::InfoCollection, "");
    }
    RoutingDecision::finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::ErrorCode;
    use crate::test_support::{details, draft_result, final_turns, hits, info, question, LogBuilder};

    fn next(log: &LogBuilder) -> Next {
        RuleRouter::new().route(log.turns()).next
    }

    fn dispatch(worker: WorkerId) -> Option<WorkerId> {
        Some(worker)
    }

    #[test]
    fn test_pipeline_order() {
        let mut log = LogBuilder::new();
        log.user("plan a trip");
        assert_eq!(next(&log).worker(), dispatch(WorkerId::InfoCollection));

        log.result(info());
        assert_eq!(
            next(&log),
            Next::Dispatch {
                worker: WorkerId::Search,
                directive: "Seoul food tour travel attractions".into()
            }
        );

        log.result(hits());
        assert_eq!(next(&log).worker(), dispatch(WorkerId::Planner));
        log.result(draft_result());
        assert_eq!(next(&log).worker(), dispatch(WorkerId::Search));
        log.result(details());
        assert_eq!(next(&log).worker(), dispatch(WorkerId::Planner));
    }

    #[test]
    fn test_finishes_on_pending_question() {
        let mut log = LogBuilder::new();
        log.user("plan a 2-day Seoul trip");
        log.result(question());
        assert_eq!(next(&log), Next::Finish);

        log.user("May 3, food tour");
        assert_eq!(next(&log).worker(), dispatch(WorkerId::InfoCollection));
    }

    #[test]
    fn test_follow_ups_after_final_plan() {
        let log = final_turns();
        assert_eq!(next(&log), Next::Finish);

        let mut log = final_turns();
        log.user("add it to my calendar and share it to notion");
        assert_eq!(next(&log).worker(), dispatch(WorkerId::Calendar));
    }

    #[test]
    fn test_calendar_management_skips_planning() {
        let mut log = LogBuilder::new();
        log.user("delete calendar event evt-2");
        assert_eq!(next(&log).worker(), dispatch(WorkerId::Calendar));
    }

    #[test]
    fn test_retry_once_then_finish() {
        let mut log = LogBuilder::new();
        log.user("plan a trip");
        log.result(info());
        log.result(WorkerResult::failure(WorkerId::Search, ErrorCode::Timeout, "slow"));
        assert_eq!(next(&log).worker(), dispatch(WorkerId::Search));

        log.result(WorkerResult::failure(WorkerId::Search, ErrorCode::Timeout, "slow"));
        assert_eq!(next(&log), Next::Finish);
    }

    #[test]
    fn test_non_retryable_failure_finishes() {
        let mut log = final_turns();
        log.user("add it to my calendar");
        log.result(WorkerResult::failure(
            WorkerId::Calendar,
            ErrorCode::MissingEndDate,
            "How long is the trip?",
        ));
        assert_eq!(next(&log), Next::Finish);
    }

    #[test]
    fn test_skip_search_goes_to_planner() {
        let mut log = LogBuilder::new();
        log.result(info());
        log.user("skip search and just plan it");
        assert_eq!(next(&log).worker(), dispatch(WorkerId::Planner));
    }
}
