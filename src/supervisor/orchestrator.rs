//! Orchestrator loop
//!
//! Routing -> Dispatching -> AwaitingResult -> Routing, until the policy
//! finishes or the run is aborted. One run is strictly sequential and owns
//! its conversation; orchestrators share only immutable registries and the
//! worker set.

use super::guard::{self, Redirect};
use super::{DecisionRecord, Next, RoutingDecision, RoutingPolicy, RunStatus};
use crate::agent::{CapabilityRegistry, WorkerId, WorkerSet};
use crate::error::{RegistryError, StateError};
use crate::events::RunEvent;
use crate::facts;
use crate::state::{Conversation, NewTurn, Turn};
use crate::tool::{ToolBox, ToolContext, ToolRegistry};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const DEFAULT_MAX_ITERATIONS: u32 = 10;
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

const NO_RESPONSE: &str = "I don't have anything to report yet.";

/// Per-run inputs
#[derive(Clone)]
pub struct RunContext {
    pub run_id: Uuid,
    pub cancellation: CancellationToken,
    pub deadline: Option<tokio::time::Instant>,
    pub events: Option<mpsc::UnboundedSender<RunEvent>>,
}

impl RunContext {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            cancellation: CancellationToken::new(),
            deadline: None,
            events: None,
        }
    }

    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn with_deadline(mut self, deadline: Option<tokio::time::Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_events(mut self, events: mpsc::UnboundedSender<RunEvent>) -> Self {
        self.events = Some(events);
        self
    }

    fn emit(&self, event: RunEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    /// Why the run must stop now, if it must
    fn interruption(&self) -> Option<&'static str> {
        if self.cancellation.is_cancelled() {
            return Some("Run cancelled.");
        }
        match self.deadline {
            Some(deadline) if tokio::time::Instant::now() >= deadline => Some("Deadline exceeded."),
            _ => None,
        }
    }

    /// Await `fut` unless cancellation or the deadline comes first
    async fn race<F: Future>(&self, fut: F) -> Option<F::Output> {
        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };
        tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => None,
            _ = deadline => None,
            output = fut => Some(output),
        }
    }
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub final_response: String,
    /// Worker dispatches made
    pub iterations: u32,
}

pub struct Orchestrator {
    registry: Arc<CapabilityRegistry>,
    tools: Arc<ToolRegistry>,
    workers: Arc<WorkerSet>,
    policy: Arc<dyn RoutingPolicy>,
    max_iterations: u32,
    tool_timeout: Duration,
}

impl Orchestrator {
    /// Checks that every capability's tools exist and every registered
    /// worker has an implementation
    pub fn new(
        registry: Arc<CapabilityRegistry>,
        tools: Arc<ToolRegistry>,
        workers: Arc<WorkerSet>,
        policy: Arc<dyn RoutingPolicy>,
    ) -> Result<Self, RegistryError> {
        registry.validate(&tools)?;
        if let Some((id, _)) = registry.workers().find(|(id, _)| !workers.contains_key(id)) {
            return Err(RegistryError::MissingWorker(id));
        }

        Ok(Self {
            registry,
            tools,
            workers,
            policy,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
        })
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_tool_timeout(mut self, tool_timeout: Duration) -> Self {
        self.tool_timeout = tool_timeout;
        self
    }

    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.registry
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Drive `conversation` until the run ends. Only a malformed turn
    /// fails the call; everything else ends in a `RunOutcome`.
    #[tracing::instrument(name = "run", skip_all, fields(run_id = %ctx.run_id))]
    pub async fn run(
        &self,
        conversation: &mut Conversation,
        ctx: &RunContext,
    ) -> Result<RunOutcome, StateError> {
        ctx.emit(RunEvent::RunStart { run_id: ctx.run_id });
        let mut iterations: u32 = 0;

        let (status, final_response) = loop {
            // === Routing ===
            if let Some(reason) = ctx.interruption() {
                if ctx.cancellation.is_cancelled() {
                    ctx.emit(RunEvent::Cancelled);
                }
                break abort(conversation, reason)?;
            }

            let snapshot = conversation.snapshot();
            let Some(proposed) = ctx.race(self.policy.decide(&snapshot)).await else {
                continue;
            };
            let (decision, redirects) = guard::check(proposed.clone(), &snapshot);
            self.record(conversation, ctx, iterations + 1, &proposed, &redirects)?;

            let (worker, directive) = match decision.next {
                Next::Finish => break finish(conversation, &decision),
                Next::Dispatch { worker, directive } => (worker, directive),
            };

            // === Dispatching ===
            if iterations >= self.max_iterations {
                warn!(max = self.max_iterations, "Iteration cap reached");
                let text = format!(
                    "Stopped after {} worker dispatches without finishing the request.",
                    iterations
                );
                break abort(conversation, &text)?;
            }
            let capability = match self.registry.resolve(worker) {
                Ok(capability) => capability,
                Err(e) => break abort(conversation, &format!("Cannot dispatch: {}", e))?,
            };
            let Some(implementation) = self.workers.get(&worker).cloned() else {
                let e = RegistryError::MissingWorker(worker);
                break abort(conversation, &format!("Cannot dispatch: {}", e))?;
            };
            iterations += 1;

            let mut toolbox = ToolBox::new(
                worker,
                self.tools.clone(),
                capability.tools.clone(),
                ToolContext::new(ctx.cancellation.child_token(), self.tool_timeout),
            )
            .with_instructions(capability.instructions.clone());
            if let Some(tx) = &ctx.events {
                toolbox = toolbox.with_events(tx.clone());
            }

            // === AwaitingResult ===
            info!(worker = %worker, iteration = iterations, "Dispatching");
            ctx.emit(RunEvent::WorkerStart {
                worker,
                directive: directive.clone(),
            });
            let started = Instant::now();
            let snapshot = conversation.snapshot();
            let result = ctx.race(implementation.run(&directive, &snapshot, &toolbox)).await;

            let calls = toolbox.take_calls();
            for call in &calls {
                conversation.append(NewTurn::tool_result(worker.as_str(), call.clone()))?;
            }
            let Some(result) = result else {
                // Interrupted mid-dispatch; the next routing step aborts
                continue;
            };

            let duration_ms = started.elapsed().as_millis() as u64;
            debug!(
                worker = %worker,
                success = result.is_success(),
                error_code = ?result.error_code(),
                duration_ms,
                "Worker finished"
            );
            ctx.emit(RunEvent::WorkerEnd {
                worker,
                success: result.is_success(),
                error_code: result.error_code(),
                duration_ms,
            });
            conversation.append(NewTurn::agent(result.with_tool_calls(calls)))?;
        };

        info!(status = %status, iterations, "Run complete");
        ctx.emit(RunEvent::RunComplete {
            run_id: ctx.run_id,
            status,
            iterations,
        });
        Ok(RunOutcome {
            status,
            final_response,
            iterations,
        })
    }

    /// Append the policy's decision and every redirect taken from it
    fn record(
        &self,
        conversation: &mut Conversation,
        ctx: &RunContext,
        iteration: u32,
        proposed: &RoutingDecision,
        redirects: &[Redirect],
    ) -> Result<(), StateError> {
        let directive = match &proposed.next {
            Next::Dispatch { directive, .. } => Some(directive.clone()),
            Next::Finish => None,
        };
        if let Some(fault) = &proposed.fault {
            warn!(%fault, "Routing fault");
        }
        ctx.emit(RunEvent::RoutingDecided {
            iteration,
            next: proposed.next.to_string(),
            directive,
            fault: proposed.fault.as_ref().map(|f| f.to_string()),
        });
        conversation.append(NewTurn::decision(DecisionRecord::from(proposed)))?;

        for redirect in redirects {
            info!(from = %redirect.from, to = %redirect.to, reason = %redirect.reason, "Redirected");
            ctx.emit(RunEvent::Redirected {
                requested: redirect.from,
                next: redirect.to.to_string(),
                reason: redirect.reason.clone(),
            });
            conversation.append(NewTurn::decision(DecisionRecord {
                next: redirect.to.clone(),
                fault: None,
                redirected_from: Some(redirect.from),
                reason: Some(redirect.reason.clone()),
            }))?;
        }
        Ok(())
    }
}

fn abort(conversation: &mut Conversation, text: &str) -> Result<(RunStatus, String), StateError> {
    warn!(reason = text, "Run aborted");
    conversation.append(NewTurn::diagnostic(text))?;
    Ok((RunStatus::Aborted, text.to_string()))
}

fn finish(conversation: &mut Conversation, decision: &RoutingDecision) -> (RunStatus, String) {
    if let Some(fault) = decision.fault.as_ref().filter(|f| f.forces_finish()) {
        let text = format!("I couldn't complete the request: {}.", fault);
        return match conversation.append(NewTurn::diagnostic(text.clone())) {
            Ok(_) => (RunStatus::Error, text),
            Err(e) => (RunStatus::Error, e.to_string()),
        };
    }
    let text = facts::last_agent_text(&conversation.snapshot())
        .unwrap_or(NO_RESPONSE)
        .to_string();
    (RunStatus::Completed, text)
}

/// Worker ids in dispatch order, read back from agent turns
pub fn dispatched(turns: &[Turn]) -> Vec<WorkerId> {
    turns
        .iter()
        .filter_map(|turn| turn.result().map(|r| r.worker()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{builtin_capabilities, ErrorCode, WorkerResult};
    use crate::state::{Payload, Role};
    use crate::supervisor::{LlmRouter, RoutingFault, RuleRouter};
    use crate::templates::Templates;
    use crate::test_support::{
        hits, info, question, stub_workers, ScriptedModel, ScriptedRouter, StubWorker,
    };
    use crate::tools::create_registry;
    use crate::services::Services;

    fn orchestrator(policy: Arc<dyn RoutingPolicy>, workers: WorkerSet) -> Orchestrator {
        Orchestrator::new(
            Arc::new(CapabilityRegistry::builtin()),
            Arc::new(create_registry(&Services::unconfigured())),
            Arc::new(workers),
            policy,
        )
        .unwrap()
    }

    fn ctx() -> RunContext {
        RunContext::new(Uuid::new_v4())
    }

    fn conversation(text: &str) -> Conversation {
        let mut conv = Conversation::new();
        conv.append(NewTurn::user(text)).unwrap();
        conv
    }

    #[tokio::test]
    async fn test_iteration_cap_aborts_at_exactly_n() {
        let search = StubWorker::repeating(WorkerId::Search, hits());
        let workers = stub_workers(vec![search.clone()]);
        let router = ScriptedRouter::always(RoutingDecision::dispatch(WorkerId::Search, "Seoul"));
        let orch = orchestrator(Arc::new(router), workers).with_max_iterations(4);

        let mut conv = conversation("plan a trip");
        let outcome = orch.run(&mut conv, &ctx()).await.unwrap();
        assert_eq!(outcome.status, RunStatus::Aborted);
        assert_eq!(outcome.iterations, 4);
        assert_eq!(search.calls(), 4);
        assert!(outcome.final_response.contains("4 worker dispatches"));
    }

    #[tokio::test]
    async fn test_finish_returns_last_agent_text() {
        let info_worker = StubWorker::scripted(WorkerId::InfoCollection, vec![question()]);
        let workers = stub_workers(vec![info_worker]);
        let orch = orchestrator(Arc::new(RuleRouter::new()), workers);

        let mut conv = conversation("plan a 2-day Seoul trip");
        let outcome = orch.run(&mut conv, &ctx()).await.unwrap();
        assert_eq!(outcome.status, RunStatus::Completed);
        assert_eq!(outcome.iterations, 1);
        assert_eq!(outcome.final_response, question().message());
    }

    #[tokio::test]
    async fn test_unknown_worker_ends_with_error() {
        let router = ScriptedRouter::always(
            RoutingDecision::finish().with_fault(RoutingFault::UnknownWorker("verifier".into())),
        );
        let orch = orchestrator(Arc::new(router), stub_workers(vec![]));

        let mut conv = conversation("plan a trip");
        let outcome = orch.run(&mut conv, &ctx()).await.unwrap();
        assert_eq!(outcome.status, RunStatus::Error);
        assert_eq!(outcome.iterations, 0);
        let last = conv.snapshot().last().cloned().unwrap();
        assert_eq!(last.role(), Role::Agent);
        assert!(last.payload().text().unwrap().contains("verifier"));
    }

    #[tokio::test]
    async fn test_unregistered_worker_aborts() {
        let mut registry = CapabilityRegistry::new();
        let caps = builtin_capabilities();
        registry.register_capability(WorkerId::Search, caps[&WorkerId::Search].clone());
        let orch = Orchestrator::new(
            Arc::new(registry),
            Arc::new(create_registry(&Services::unconfigured())),
            Arc::new(stub_workers(vec![])),
            Arc::new(ScriptedRouter::always(RoutingDecision::dispatch(WorkerId::Calendar, ""))),
        )
        .unwrap();

        let mut conv = conversation("delete calendar event evt-1");
        let outcome = orch.run(&mut conv, &ctx()).await.unwrap();
        assert_eq!(outcome.status, RunStatus::Aborted);
        assert!(outcome.final_response.contains("unknown worker: calendar"));
    }

    #[test]
    fn test_construction_requires_implementations() {
        let result = Orchestrator::new(
            Arc::new(CapabilityRegistry::builtin()),
            Arc::new(create_registry(&Services::unconfigured())),
            Arc::new(WorkerSet::new()),
            Arc::new(RuleRouter::new()),
        );
        assert!(matches!(result, Err(RegistryError::MissingWorker(WorkerId::InfoCollection))));
    }

    #[tokio::test]
    async fn test_redirect_is_recorded() {
        let search = StubWorker::repeating(WorkerId::Search, hits());
        let workers = stub_workers(vec![search.clone()]);
        let router = ScriptedRouter::new(vec![
            RoutingDecision::dispatch(WorkerId::Planner, ""),
            RoutingDecision::finish(),
        ]);
        let orch = orchestrator(Arc::new(router), workers);

        let mut conv = conversation("plan a trip");
        conv.append(NewTurn::agent(info())).unwrap();
        let outcome = orch.run(&mut conv, &ctx()).await.unwrap();
        assert_eq!(outcome.status, RunStatus::Completed);
        assert_eq!(search.calls(), 1);

        let redirect = conv
            .snapshot()
            .iter()
            .find_map(|turn| match turn.payload() {
                Payload::Decision(record) if record.redirected_from.is_some() => Some(record.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(redirect.redirected_from, Some(WorkerId::Planner));
        assert_eq!(redirect.next.worker(), Some(WorkerId::Search));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let token = CancellationToken::new();
        token.cancel();
        let search = StubWorker::repeating(WorkerId::Search, hits());
        let orch = orchestrator(
            Arc::new(ScriptedRouter::always(RoutingDecision::dispatch(WorkerId::Search, "q"))),
            stub_workers(vec![search.clone()]),
        );

        let mut conv = conversation("plan a trip");
        let outcome = orch
            .run(&mut conv, &ctx().with_cancellation(token))
            .await
            .unwrap();
        assert_eq!(outcome.status, RunStatus::Aborted);
        assert_eq!(search.calls(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_mid_dispatch() {
        let token = CancellationToken::new();
        let slow = StubWorker::repeating(WorkerId::Search, hits()).with_delay(Duration::from_secs(30));
        let orch = orchestrator(
            Arc::new(ScriptedRouter::always(RoutingDecision::dispatch(WorkerId::Search, "q"))),
            stub_workers(vec![slow]),
        );

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut conv = conversation("plan a trip");
        let started = Instant::now();
        let outcome = orch
            .run(&mut conv, &ctx().with_cancellation(token).with_events(tx))
            .await
            .unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(outcome.status, RunStatus::Aborted);
        assert_eq!(outcome.final_response, "Run cancelled.");

        let mut saw_cancel = false;
        while let Ok(event) = rx.try_recv() {
            saw_cancel |= matches!(event, RunEvent::Cancelled);
        }
        assert!(saw_cancel);
    }

    #[tokio::test]
    async fn test_deadline_aborts() {
        let slow = StubWorker::repeating(WorkerId::Search, hits()).with_delay(Duration::from_secs(30));
        let orch = orchestrator(
            Arc::new(ScriptedRouter::always(RoutingDecision::dispatch(WorkerId::Search, "q"))),
            stub_workers(vec![slow]),
        );
        let deadline = tokio::time::Instant::now() + Duration::from_millis(50);

        let mut conv = conversation("plan a trip");
        let outcome = orch
            .run(&mut conv, &ctx().with_deadline(Some(deadline)))
            .await
            .unwrap();
        assert_eq!(outcome.status, RunStatus::Aborted);
        assert_eq!(outcome.final_response, "Deadline exceeded.");
    }

    #[tokio::test]
    async fn test_malformed_router_output_never_fails_the_run() {
        let info_worker = StubWorker::scripted(WorkerId::InfoCollection, vec![question()]);
        let router = LlmRouter::new(
            ScriptedModel::replying("I think search should go next!"),
            Templates::new().unwrap(),
            Arc::new(CapabilityRegistry::builtin()),
        );
        let orch = orchestrator(Arc::new(router), stub_workers(vec![info_worker]));

        let mut conv = conversation("plan a trip");
        let outcome = orch.run(&mut conv, &ctx()).await.unwrap();
        assert_eq!(outcome.status, RunStatus::Completed);

        let faults = conv
            .snapshot()
            .iter()
            .filter(|turn| matches!(
                turn.payload(),
                Payload::Decision(DecisionRecord { fault: Some(RoutingFault::Malformed(_)), .. })
            ))
            .count();
        assert_eq!(faults, 2);
    }

    #[tokio::test]
    async fn test_replay_is_deterministic() {
        async fn replay() -> Vec<Turn> {
            let workers = stub_workers(vec![
                StubWorker::scripted(WorkerId::InfoCollection, vec![info()]),
                StubWorker::repeating(WorkerId::Search, hits()),
                StubWorker::repeating(
                    WorkerId::Planner,
                    WorkerResult::failure(WorkerId::Planner, ErrorCode::UpstreamError, "down"),
                ),
            ]);
            let orch = orchestrator(Arc::new(RuleRouter::new()), workers);
            let mut conv = conversation("plan a Seoul trip");
            orch.run(&mut conv, &ctx()).await.unwrap();
            conv.into_turns()
        }

        let first = replay().await;
        let second = replay().await;
        assert_eq!(first, second);
        assert_eq!(
            dispatched(&first),
            vec![WorkerId::InfoCollection, WorkerId::Search, WorkerId::Planner, WorkerId::Planner]
        );
    }
}
