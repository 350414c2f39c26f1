//! Search worker
//!
//! Two modes, chosen from the snapshot:
//! - web: search for the directive, or for the travel info when the
//!   directive is empty
//! - detail: a draft is waiting for place detail, so look up each place it
//!   names
//!
//! Timeouts and cancellation stop the worker immediately. Other per-place
//! failures are skipped as long as at least one place resolves.

use super::failed_call;
use crate::agent::{ErrorCode, Worker, WorkerId, WorkerResult};
use crate::artifact::{Artifact, ItineraryDraft, LocationDetails, SearchHits};
use crate::facts;
use crate::services::{Place, WebHit};
use crate::state::Snapshot;
use crate::tool::{ToolBox, ToolFailure};
use crate::tools::{PLACE_LOOKUP, WEB_SEARCH};
use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, warn};

const DEFAULT_MAX_HITS: usize = 5;
const DEFAULT_MAX_PLACES: usize = 8;

pub struct SearchWorker {
    max_hits: usize,
    max_places: usize,
}

impl SearchWorker {
    pub fn new() -> Self {
        Self {
            max_hits: DEFAULT_MAX_HITS,
            max_places: DEFAULT_MAX_PLACES,
        }
    }

    pub fn with_max_hits(mut self, max_hits: usize) -> Self {
        self.max_hits = max_hits.max(1);
        self
    }

    /// Upper bound on place lookups per dispatch
    pub fn with_max_places(mut self, max_places: usize) -> Self {
        self.max_places = max_places;
        self
    }

    async fn web(&self, directive: &str, snapshot: &Snapshot, tools: &ToolBox) -> WorkerResult {
        let query = match directive.trim() {
            "" => facts::travel_info(snapshot).map(|f| f.value.search_query()),
            directive => Some(directive.to_string()),
        };
        let Some(query) = query else {
            return WorkerResult::failure(
                self.id(),
                ErrorCode::MissingQuery,
                "Nothing to search for yet: no directive and no travel info.",
            );
        };

        let result = tools
            .call(WEB_SEARCH, json!({"query": query, "limit": self.max_hits}))
            .await;
        if result.is_error {
            return failed_call(self.id(), WEB_SEARCH, &result);
        }
        let Some(hits) = result.parse::<Vec<WebHit>>() else {
            return WorkerResult::failure(
                self.id(),
                ErrorCode::UpstreamError,
                "Search returned output that could not be read.",
            );
        };
        if hits.is_empty() {
            return WorkerResult::failure(
                self.id(),
                ErrorCode::EmptyResults,
                format!("No results for '{}'.", query),
            );
        }

        let mut message = format!("Found {} results for '{}':", hits.len(), query);
        for hit in &hits {
            message.push_str(&format!("\n- {} ({})", hit.title, hit.url));
        }
        WorkerResult::success(self.id(), Artifact::SearchHits(SearchHits { query, hits }), message)
    }

    async fn details(&self, draft: &ItineraryDraft, tools: &ToolBox) -> WorkerResult {
        let mut places: Vec<Place> = Vec::new();
        let mut last_failure: Option<(ToolFailure, String)> = None;

        for name in draft.places.iter().take(self.max_places) {
            let result = tools.call(PLACE_LOOKUP, json!({"query": name, "limit": 1})).await;
            if let Some(failure) = result.failure {
                if matches!(failure, ToolFailure::Timeout | ToolFailure::Cancelled) {
                    return failed_call(self.id(), PLACE_LOOKUP, &result);
                }
                warn!(place = %name, error = %result.output, "Place lookup failed");
                last_failure = Some((failure, result.output));
                continue;
            }
            match result.parse::<Vec<Place>>().and_then(|found| found.into_iter().next()) {
                Some(place) => places.push(place),
                None => debug!(place = %name, "No place detail found"),
            }
        }

        if places.is_empty() && !draft.places.is_empty() {
            return match last_failure {
                Some((failure, output)) => WorkerResult::failure(
                    self.id(),
                    ErrorCode::from(failure),
                    format!("{} failed: {}", PLACE_LOOKUP, output),
                ),
                None => WorkerResult::failure(
                    self.id(),
                    ErrorCode::EmptyResults,
                    "None of the planned places could be found.",
                ),
            };
        }

        let mut message = format!("Found details for {} places:", places.len());
        for place in &places {
            message.push_str(&format!("\n- {}: {}", place.name, place.address));
        }
        WorkerResult::success(
            self.id(),
            Artifact::LocationDetails(LocationDetails { places }),
            message,
        )
    }
}

impl Default for SearchWorker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Worker for SearchWorker {
    fn id(&self) -> WorkerId {
        WorkerId::Search
    }

    async fn run(&self, directive: &str, snapshot: &Snapshot, tools: &ToolBox) -> WorkerResult {
        let waiting_draft = facts::draft(snapshot)
            .filter(|_| facts::draft_current(snapshot) && !facts::details_current(snapshot));

        match waiting_draft {
            Some(draft) => {
                debug!(places = draft.value.places.len(), "Looking up draft places");
                self.details(draft.value, tools).await
            }
            None => self.web(directive, snapshot, tools).await,
        }
    }
}
