//! Model-backed router
//!
//! The model sees the worker list, the derived facts and a transcript, and
//! must answer `{"next": ..., "directive": ...}`. Its output is untrusted:
//! anything unusable falls back to the rule router over the same snapshot.

use super::{RoutingDecision, RoutingFault, RoutingPolicy, RuleRouter, FINISH};
use crate::agent::{CapabilityRegistry, WorkerId};
use crate::facts;
use crate::intent;
use crate::provider::{ChatModel, ChatRequest};
use crate::state::{Payload, Role, Snapshot, Turn};
use crate::templates::{RouterPrompt, Templates, WorkerLine};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Transcript turns shown to the model
const TRANSCRIPT_TURNS: usize = 12;
const MAX_TURN_CHARS: usize = 600;

#[derive(Debug, Deserialize)]
struct RawDecision {
    next: String,
    #[serde(default)]
    directive: Option<String>,
}

pub struct LlmRouter {
    model: Arc<dyn ChatModel>,
    templates: Arc<Templates>,
    registry: Arc<CapabilityRegistry>,
    fallback: RuleRouter,
    timeout: Duration,
}

impl LlmRouter {
    pub fn new(
        model: Arc<dyn ChatModel>,
        templates: Arc<Templates>,
        registry: Arc<CapabilityRegistry>,
    ) -> Self {
        Self {
            model,
            templates,
            registry,
            fallback: RuleRouter::new(),
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn request(&self, turns: &[Turn]) -> Result<ChatRequest, RoutingFault> {
        let prompt = RouterPrompt {
            workers: self
                .registry
                .workers()
                .map(|(id, cap)| WorkerLine {
                    id: id.as_str().to_string(),
                    description: cap.description.clone(),
                    tools: cap.tools.clone(),
                })
                .collect(),
            facts: fact_lines(turns),
            skip_search: intent::skip_search(facts::last_user_text(turns)),
        };
        let system = prompt
            .render(&self.templates)
            .map_err(|e| RoutingFault::Malformed(e.to_string()))?;
        Ok(ChatRequest::json(system, transcript(turns)))
    }

    /// Parse model output into a decision. Workers outside the registry
    /// count as unknown.
    fn parse(&self, output: &str) -> Result<RoutingDecision, RoutingFault> {
        let raw: RawDecision = serde_json::from_str(strip_fences(output))
            .map_err(|e| RoutingFault::Malformed(e.to_string()))?;
        let next = raw.next.trim();
        if next.is_empty() {
            return Err(RoutingFault::Malformed("empty next".to_string()));
        }
        if next.eq_ignore_ascii_case(FINISH) {
            return Ok(RoutingDecision::finish());
        }

        let worker: WorkerId = next
            .parse()
            .map_err(|_| RoutingFault::UnknownWorker(next.to_string()))?;
        if !self.registry.contains(worker) {
            return Err(RoutingFault::UnknownWorker(next.to_string()));
        }
        Ok(RoutingDecision::dispatch(
            worker,
            raw.directive.unwrap_or_default().trim(),
        ))
    }

    async fn ask(&self, turns: &[Turn]) -> Result<RoutingDecision, RoutingFault> {
        let request = self.request(turns)?;
        let output = tokio::time::timeout(self.timeout, self.model.complete(&request))
            .await
            .map_err(|_| RoutingFault::Timeout)?
            .map_err(|e| RoutingFault::Transport(e.to_string()))?;
        debug!(output = %output, "Router output");
        self.parse(&output)
    }
}

#[async_trait]
impl RoutingPolicy for LlmRouter {
    #[tracing::instrument(name = "llm_route", skip_all, fields(turns = snapshot.len()))]
    async fn decide(&self, snapshot: &Snapshot) -> RoutingDecision {
        match self.ask(snapshot).await {
            Ok(decision) => decision,
            Err(fault) if fault.forces_finish() => {
                warn!(%fault, "Router named an unknown worker, finishing");
                RoutingDecision::finish().with_fault(fault)
            }
            Err(fault) => {
                warn!(%fault, "Router output unusable, using rules");
                self.fallback.route(snapshot).with_fault(fault)
            }
        }
    }
}

/// Drop a surrounding ```json fence, if any
fn strip_fences(output: &str) -> &str {
    let trimmed = output.trim();
    let Some(body) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = body.strip_prefix("json").unwrap_or(body);
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// State summary lines for the router prompt
pub fn fact_lines(turns: &[Turn]) -> Vec<String> {
    let mut lines = Vec::new();

    match facts::travel_info(turns) {
        Some(info) if facts::info_complete(turns) => {
            let info = info.value;
            lines.push(format!(
                "travel info: {}, {}, {}, {}",
                info.destination, info.when, info.duration, info.concept
            ));
        }
        _ => lines.push("travel info: incomplete".to_string()),
    }
    if facts::question_pending(turns) {
        lines.push("a clarifying question is waiting for the user".to_string());
    }
    if facts::hits_current(turns) {
        let count = facts::search_hits(turns).map_or(0, |f| f.value.hits.len());
        lines.push(format!("search results: {} hits", count));
    }
    if facts::draft_current(turns) {
        lines.push("itinerary draft: ready, place details not looked up".to_string());
    }
    if facts::details_current(turns) {
        lines.push("place details: ready".to_string());
    }
    if facts::final_plan(turns).is_some() {
        lines.push("final plan: ready".to_string());
    }
    for result in facts::results_since_user(turns) {
        match result.error_code() {
            Some(code) => lines.push(format!("{} failed this turn ({})", result.worker(), code)),
            None => lines.push(format!("{} ran this turn", result.worker())),
        }
    }
    lines
}

fn transcript(turns: &[Turn]) -> String {
    let start = turns.len().saturating_sub(TRANSCRIPT_TURNS);
    let mut out = String::new();
    for turn in &turns[start..] {
        let text = match (turn.role(), turn.payload()) {
            (Role::User, _) | (Role::Agent, _) => turn.payload().text().unwrap_or_default(),
            (_, Payload::Decision(record)) => {
                out.push_str(&format!("[routed to {}]\n", record.next));
                continue;
            }
            _ => continue,
        };
        let text: String = text.chars().take(MAX_TURN_CHARS).collect();
        out.push_str(&format!("{}: {}\n", turn.origin(), text));
    }
    out
}
