//! Host-facing entry point
//!
//! `TravelPlanner` owns one orchestrator and turns each user message into a
//! fresh run over the caller's history. The caller keeps the history
//! between submits; nothing persists here.

use crate::agent::{builtin_workers, builtin_workers_with_model, CapabilityRegistry, WorkerSet};
use crate::config::Config;
use crate::error::PlannerError;
use crate::events::RunEvent;
use crate::provider::ChatModel;
use crate::services::Services;
use crate::state::{Conversation, NewTurn, Turn};
use crate::supervisor::{
    LlmRouter, Orchestrator, RoutingPolicy, RuleRouter, RunContext, RunStatus,
    DEFAULT_MAX_ITERATIONS, DEFAULT_TOOL_TIMEOUT,
};
use crate::templates::Templates;
use crate::tools::create_registry;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use uuid::Uuid;

/// One `submit` call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowRun {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub status: RunStatus,
    pub final_response: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmitResponse {
    /// True iff the run completed
    pub success: bool,
    pub final_response_text: String,
    /// Prior history plus every turn this run appended
    pub updated_history: Vec<Turn>,
    pub run: WorkflowRun,
}

pub struct TravelPlanner {
    orchestrator: Orchestrator,
    events: Option<mpsc::UnboundedSender<RunEvent>>,
}

impl TravelPlanner {
    pub fn builder() -> TravelPlannerBuilder {
        TravelPlannerBuilder::default()
    }

    /// Everything from `config`: registry overrides, services, model
    pub fn from_config(config: &Config) -> Result<Self, PlannerError> {
        TravelPlannerBuilder::from_config(config)?.build()
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub async fn submit(&self, user_text: &str, history: Vec<Turn>) -> SubmitResponse {
        self.submit_with(user_text, history, CancellationToken::new(), None)
            .await
    }

    /// Submit with a cancellation token and an optional deadline. Always
    /// returns a response; internal failures end the run with status
    /// `error`.
    pub async fn submit_with(
        &self,
        user_text: &str,
        history: Vec<Turn>,
        cancellation: CancellationToken,
        deadline: Option<Instant>,
    ) -> SubmitResponse {
        let run_id = Uuid::new_v4();
        let created_at = Utc::now();
        info!(run_id = %run_id, history = history.len(), "Submit");

        let fallback_history = history.clone();
        let mut conversation = match Conversation::from_history(history) {
            Ok(conversation) => conversation,
            Err(e) => {
                error!(error = %e, "Rejected history");
                let text = format!("Invalid conversation history: {}", e);
                return response(run_id, created_at, RunStatus::Error, text, fallback_history);
            }
        };
        if let Err(e) = conversation.append(NewTurn::user(user_text)) {
            let text = format!("Could not record the message: {}", e);
            return response(run_id, created_at, RunStatus::Error, text, fallback_history);
        }

        let mut ctx = RunContext::new(run_id)
            .with_cancellation(cancellation)
            .with_deadline(deadline);
        if let Some(tx) = &self.events {
            ctx = ctx.with_events(tx.clone());
        }

        let (status, text) = match self.orchestrator.run(&mut conversation, &ctx).await {
            Ok(outcome) => (outcome.status, outcome.final_response),
            Err(e) => {
                error!(error = %e, "Run failed");
                (RunStatus::Error, format!("Internal error: {}", e))
            }
        };
        response(run_id, created_at, status, text, conversation.into_turns())
    }
}

fn response(
    id: Uuid,
    created_at: DateTime<Utc>,
    status: RunStatus,
    final_response: String,
    updated_history: Vec<Turn>,
) -> SubmitResponse {
    SubmitResponse {
        success: status == RunStatus::Completed,
        final_response_text: final_response.clone(),
        updated_history,
        run: WorkflowRun {
            id,
            created_at,
            status,
            final_response,
        },
    }
}

/// Builder for [`TravelPlanner`]. Unset parts default to the built-ins:
/// with a model, the LLM router and model-backed planner prose; without
/// one, the rule router and deterministic workers.
pub struct TravelPlannerBuilder {
    registry: Option<CapabilityRegistry>,
    services: Services,
    workers: Option<WorkerSet>,
    policy: Option<Arc<dyn RoutingPolicy>>,
    model: Option<Arc<dyn ChatModel>>,
    events: Option<mpsc::UnboundedSender<RunEvent>>,
    max_iterations: u32,
    tool_timeout: Duration,
    routing_timeout: Duration,
}

impl Default for TravelPlannerBuilder {
    fn default() -> Self {
        Self {
            registry: None,
            services: Services::unconfigured(),
            workers: None,
            policy: None,
            model: None,
            events: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
            routing_timeout: Duration::from_secs(60),
        }
    }
}

impl TravelPlannerBuilder {
    pub fn from_config(config: &Config) -> Result<Self, PlannerError> {
        config.validate()?;
        let mut builder = Self::default()
            .registry(CapabilityRegistry::with_config(&config.working_dir))
            .services(config.build_services())
            .max_iterations(config.orchestrator.max_iterations)
            .tool_timeout(config.tool_timeout())
            .routing_timeout(config.routing_timeout());
        if let Some(model) = config.chat_model()? {
            builder = builder.model(model);
        }
        Ok(builder)
    }

    pub fn registry(mut self, registry: CapabilityRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn services(mut self, services: Services) -> Self {
        self.services = services;
        self
    }

    pub fn workers(mut self, workers: WorkerSet) -> Self {
        self.workers = Some(workers);
        self
    }

    pub fn policy(mut self, policy: Arc<dyn RoutingPolicy>) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn model(mut self, model: Arc<dyn ChatModel>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn events(mut self, events: mpsc::UnboundedSender<RunEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn tool_timeout(mut self, tool_timeout: Duration) -> Self {
        self.tool_timeout = tool_timeout;
        self
    }

    pub fn routing_timeout(mut self, routing_timeout: Duration) -> Self {
        self.routing_timeout = routing_timeout;
        self
    }

    pub fn build(self) -> Result<TravelPlanner, PlannerError> {
        let templates = Templates::new()?;
        let registry = Arc::new(self.registry.unwrap_or_else(CapabilityRegistry::builtin));
        let tools = Arc::new(create_registry(&self.services));

        let workers = match (self.workers, &self.model) {
            (Some(workers), _) => workers,
            (None, Some(model)) => builtin_workers_with_model(model.clone(), templates.clone()),
            (None, None) => builtin_workers(),
        };
        let policy: Arc<dyn RoutingPolicy> = match (self.policy, self.model) {
            (Some(policy), _) => policy,
            (None, Some(model)) => Arc::new(
                LlmRouter::new(model, templates, registry.clone())
                    .with_timeout(self.routing_timeout),
            ),
            (None, None) => Arc::new(RuleRouter::new()),
        };

        let orchestrator = Orchestrator::new(registry, tools, Arc::new(workers), policy)?
            .with_max_iterations(self.max_iterations)
            .with_tool_timeout(self.tool_timeout);
        Ok(TravelPlanner {
            orchestrator,
            events: self.events,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::workers::{InfoCollectionWorker, FOLLOW_UP};
    use crate::agent::WorkerId;
    use crate::supervisor::dispatched;
    use crate::supervisor::RoutingDecision;
    use crate::test_support::{
        final_result, hits, info, question, stub_workers, FakeServices, LogBuilder, ScriptedModel,
        ScriptedRouter, StubWorker,
    };
    use chrono::NaiveDate;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_two_submits_with_stub_workers() {
        let workers = stub_workers(vec![
            StubWorker::scripted(WorkerId::InfoCollection, vec![question(), info()]),
            StubWorker::repeating(WorkerId::Search, hits()),
            StubWorker::repeating(WorkerId::Planner, final_result()),
        ]);
        let planner = TravelPlanner::builder().workers(workers).build().unwrap();

        let first = planner.submit("plan a 2-day Seoul trip", Vec::new()).await;
        assert!(first.success);
        assert_eq!(first.final_response_text, question().message());

        let second = planner
            .submit("May 3, food tour", first.updated_history)
            .await;
        assert!(second.success, "{}", second.final_response_text);
        assert_eq!(second.run.status, RunStatus::Completed);
        assert_eq!(second.final_response_text, final_result().message());
        assert_eq!(
            dispatched(&second.updated_history),
            vec![
                WorkerId::InfoCollection,
                WorkerId::InfoCollection,
                WorkerId::Search,
                WorkerId::Planner
            ]
        );
        assert_ne!(first.run.id, second.run.id);
    }

    #[tokio::test]
    async fn test_end_to_end_with_builtin_workers() {
        let services = FakeServices::new();
        let mut workers = builtin_workers();
        workers.insert(
            WorkerId::InfoCollection,
            Arc::new(InfoCollectionWorker::new().with_today(NaiveDate::from_ymd_opt(2025, 1, 10).unwrap())),
        );
        let planner = TravelPlanner::builder()
            .services(services.services())
            .workers(workers)
            .build()
            .unwrap();

        let first = planner.submit("plan a 2-day Seoul trip", Vec::new()).await;
        assert!(first.final_response_text.contains("When are you travelling"));

        let second = planner
            .submit("May 3, and we want a food tour", first.updated_history)
            .await;
        assert!(second.success, "{}", second.final_response_text);
        assert!(second.final_response_text.ends_with(FOLLOW_UP));
        assert_eq!(
            dispatched(&second.updated_history),
            vec![
                WorkerId::InfoCollection,
                WorkerId::InfoCollection,
                WorkerId::Search,
                WorkerId::Planner,
                WorkerId::Search,
                WorkerId::Planner
            ]
        );
        assert_eq!(services.search_queries()[0], "Seoul food tour travel attractions");
        assert!(!services.place_queries().is_empty());

        let third = planner
            .submit("share it to notion please", second.updated_history)
            .await;
        assert!(third.success, "{}", third.final_response_text);
        assert_eq!(services.pages().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_history_is_an_error_response() {
        let planner = TravelPlanner::builder().build().unwrap();
        let first = planner.submit("hello", Vec::new()).await;
        let mut history = first.updated_history;
        history.remove(0);

        let response = planner.submit("again", history.clone()).await;
        assert!(!response.success);
        assert_eq!(response.run.status, RunStatus::Error);
        assert_eq!(response.updated_history, history);
    }

    #[tokio::test]
    async fn test_cancelled_submit_aborts() {
        let planner = TravelPlanner::builder().build().unwrap();
        let token = CancellationToken::new();
        token.cancel();

        let response = planner
            .submit_with("plan a trip", Vec::new(), token, None)
            .await;
        assert!(!response.success);
        assert_eq!(response.run.status, RunStatus::Aborted);
        assert_eq!(response.final_response_text, "Run cancelled.");
        assert_eq!(response.updated_history.len(), 2);
    }

    #[tokio::test]
    async fn test_worker_instructions_override_reaches_the_model() {
        let temp = TempDir::new().unwrap();
        let overrides = temp.path().join(".trip").join("workers");
        std::fs::create_dir_all(&overrides).unwrap();
        std::fs::write(
            overrides.join("planner.yaml"),
            "instructions: Write the itinerary in Korean.\n",
        )
        .unwrap();

        let services = FakeServices::new();
        let model = ScriptedModel::replying("서울 미식 여행 일정");
        let router = ScriptedRouter::new(vec![RoutingDecision::dispatch(WorkerId::Planner, "")]);
        let planner = TravelPlanner::builder()
            .registry(CapabilityRegistry::with_config(temp.path()))
            .services(services.services())
            .policy(Arc::new(router))
            .model(model.clone())
            .build()
            .unwrap();

        let mut log = LogBuilder::new();
        log.user("plan a 2-day Seoul food tour on May 3");
        log.result(info());
        log.result(hits());
        let response = planner.submit("go ahead", log.turns().to_vec()).await;

        assert!(response.success, "{}", response.final_response_text);
        let requests = model.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].system, "Write the itinerary in Korean.");
        assert_eq!(response.final_response_text, "서울 미식 여행 일정");
    }
}
