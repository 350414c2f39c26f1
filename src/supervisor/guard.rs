//! Structural precondition check
//!
//! Applied to every dispatch whatever policy produced it. An unmet
//! precondition redirects to the worker that satisfies it. Redirects
//! chain until a worker's preconditions hold; revisiting a worker means
//! the request cannot make progress and the run finishes.

use super::{Next, RoutingDecision, RoutingFault};
use crate::agent::WorkerId;
use crate::artifact::CalendarAction;
use crate::facts;
use crate::intent;
use crate::state::Turn;

/// One override of the policy's choice
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub from: WorkerId,
    pub to: Next,
    pub reason: String,
}

/// The prerequisite worker for `worker`, with the reason, if a
/// precondition is unmet
fn unmet(worker: WorkerId, directive: &str, turns: &[Turn]) -> Option<(WorkerId, &'static str)> {
    let user_text = facts::last_user_text(turns);
    match worker {
        WorkerId::InfoCollection => None,
        WorkerId::Search => {
            let has_query = !directive.trim().is_empty() || facts::draft_current(turns);
            (!has_query && !facts::info_complete(turns))
                .then_some((WorkerId::InfoCollection, "search needs a query or complete travel info"))
        }
        WorkerId::Planner => {
            let grounded = facts::hits_current(turns) || facts::details_current(turns);
            if grounded || facts::plan_finished(turns) {
                return None;
            }
            if !facts::info_complete(turns) {
                return Some((WorkerId::InfoCollection, "planner needs complete travel info"));
            }
            (!intent::skip_search(user_text))
                .then_some((WorkerId::Search, "planner needs search results"))
        }
        WorkerId::Calendar => {
            let action = intent::calendar_action(directive)
                .or_else(|| intent::calendar_action(user_text))
                .unwrap_or(CalendarAction::Create);
            (action == CalendarAction::Create && facts::final_plan(turns).is_none())
                .then_some((WorkerId::Planner, "calendar needs a finalized plan"))
        }
        WorkerId::Share => facts::final_plan(turns)
            .is_none()
            .then_some((WorkerId::Planner, "share needs a finalized plan")),
    }
}

/// Check a decision against the log. Returns the decision to execute and
/// the redirects taken to reach it, in order.
pub fn check(decision: RoutingDecision, turns: &[Turn]) -> (RoutingDecision, Vec<Redirect>) {
    resolve(decision, |worker, directive| unmet(worker, directive, turns))
}

/// Follow prerequisites from `decision`. The built-in prerequisite graph
/// is acyclic; a revisit only arises if a cycle is introduced.
fn resolve<F>(decision: RoutingDecision, unmet: F) -> (RoutingDecision, Vec<Redirect>)
where
    F: Fn(WorkerId, &str) -> Option<(WorkerId, &'static str)>,
{
    let mut redirects: Vec<Redirect> = Vec::new();
    let mut visited = Vec::new();
    let mut current = decision;

    loop {
        let (worker, directive) = match &current.next {
            Next::Dispatch { worker, directive } => (*worker, directive.as_str()),
            Next::Finish => return (current, redirects),
        };
        visited.push(worker);

        let Some((prerequisite, reason)) = unmet(worker, directive) else {
            return (current, redirects);
        };

        if visited.contains(&prerequisite) {
            let fault = RoutingFault::Unresolved(reason.to_string());
            redirects.push(Redirect {
                from: worker,
                to: Next::Finish,
                reason: reason.to_string(),
            });
            return (RoutingDecision::finish().with_fault(fault), redirects);
        }

        let next = RoutingDecision::dispatch(prerequisite, "");
        redirects.push(Redirect {
            from: worker,
            to: next.next.clone(),
            reason: reason.to_string(),
        });
        current = match current.fault {
            Some(fault) => next.with_fault(fault),
            None => next,
        };
    }
}
