//! Planner worker
//!
//! Phase 1 (no place detail for the current draft): search, then lay out a
//! day-by-day draft that names places. The search call is mandatory.
//!
//! Phase 2 (place detail delivered after the draft): merge the detail into
//! the draft. No search.
//!
//! Days and places are always computed deterministically. When a chat model
//! is configured it only rewrites the prose; a model failure falls back to
//! the deterministic text.

use super::failed_call;
use crate::agent::{ErrorCode, Worker, WorkerId, WorkerResult};
use crate::artifact::{Artifact, DayPlan, FinalItinerary, ItineraryDraft, TravelInfo};
use crate::facts;
use crate::intent;
use crate::provider::{ChatModel, ChatRequest};
use crate::services::{Place, WebHit};
use crate::state::Snapshot;
use crate::templates::{PlannerPrompt, Templates};
use crate::tool::{ToolBox, ToolFailure};
use crate::tools::WEB_SEARCH;
use async_trait::async_trait;
use chrono::Days;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};

pub const FOLLOW_UP: &str = "Would you like to add this plan to your calendar or share it to Notion?";

const ACTIVITIES_PER_DAY: usize = 2;
const MAX_DAYS: u32 = 14;

pub struct PlannerWorker {
    model: Option<Arc<dyn ChatModel>>,
    templates: Option<Arc<Templates>>,
}

impl PlannerWorker {
    /// Deterministic planner
    pub fn new() -> Self {
        Self {
            model: None,
            templates: None,
        }
    }

    /// Use a chat model for itinerary prose
    pub fn with_model(mut self, model: Arc<dyn ChatModel>, templates: Arc<Templates>) -> Self {
        self.model = Some(model);
        self.templates = Some(templates);
        self
    }

    async fn draft(&self, directive: &str, snapshot: &Snapshot, tools: &ToolBox) -> WorkerResult {
        let Some(info) = facts::travel_info(snapshot).map(|f| f.value) else {
            return WorkerResult::failure(
                self.id(),
                ErrorCode::MalformedSearchContext,
                "Cannot plan without travel info.",
            );
        };

        let prior: Vec<WebHit> = if facts::hits_current(snapshot) {
            facts::search_hits(snapshot)
                .map(|f| f.value.hits.clone())
                .unwrap_or_default()
        } else {
            Vec::new()
        };
        let overridden = intent::skip_search(facts::last_user_text(snapshot));
        if prior.is_empty() && !overridden {
            return WorkerResult::failure(
                self.id(),
                ErrorCode::MalformedSearchContext,
                "No search results to plan from.",
            );
        }

        let query = match directive.trim() {
            "" => format!("{} {} itinerary", info.destination, info.concept),
            directive => directive.to_string(),
        };
        let result = tools.call(WEB_SEARCH, json!({"query": query, "limit": 5})).await;
        let fresh = if result.is_error {
            let fatal = matches!(result.failure, Some(ToolFailure::Timeout | ToolFailure::Cancelled));
            if fatal || prior.is_empty() {
                return failed_call(self.id(), WEB_SEARCH, &result);
            }
            warn!(error = %result.output, "Planner search failed, using earlier results");
            Vec::new()
        } else {
            result.parse::<Vec<WebHit>>().unwrap_or_default()
        };

        let mut hits = prior;
        for hit in fresh {
            if !hits.iter().any(|h| h.url == hit.url) {
                hits.push(hit);
            }
        }

        let places = place_names(&hits);
        if places.is_empty() {
            return WorkerResult::failure(
                self.id(),
                ErrorCode::MalformedSearchContext,
                "Search results name no places to plan around.",
            );
        }

        let days = lay_out(info, &places);
        let text = self.prose(tools, info, &days, &hits, &[]).await;
        debug!(days = days.len(), places = places.len(), "Drafted itinerary");

        WorkerResult::success(
            self.id(),
            Artifact::ItineraryDraft(ItineraryDraft {
                info: info.clone(),
                days,
                places,
                text: text.clone(),
            }),
            text,
        )
    }

    async fn finalize(&self, snapshot: &Snapshot, tools: &ToolBox) -> WorkerResult {
        let (Some(draft), Some(details)) = (facts::draft(snapshot), facts::location_details(snapshot))
        else {
            return WorkerResult::failure(
                self.id(),
                ErrorCode::MalformedSearchContext,
                "No draft with place details to finalize.",
            );
        };
        let draft = draft.value;
        let places = details.value.places.clone();

        let days: Vec<DayPlan> = draft
            .days
            .iter()
            .map(|day| DayPlan {
                day: day.day,
                date: day.date,
                activities: day
                    .activities
                    .iter()
                    .map(|activity| match detail_for(activity, &places) {
                        Some(place) if !place.address.is_empty() => {
                            format!("{} ({})", activity, place.address)
                        }
                        _ => activity.clone(),
                    })
                    .collect(),
            })
            .collect();

        let text = self.prose(tools, &draft.info, &days, &[], &places).await;
        let message = format!("{}\n\n{}", text, FOLLOW_UP);

        WorkerResult::success(
            self.id(),
            Artifact::FinalItinerary(FinalItinerary {
                info: draft.info.clone(),
                days,
                places,
                text,
            }),
            message,
        )
    }

    async fn prose(
        &self,
        tools: &ToolBox,
        info: &TravelInfo,
        days: &[DayPlan],
        hits: &[WebHit],
        places: &[Place],
    ) -> String {
        let skeleton = render_days(info, days);
        let (Some(model), Some(templates)) = (&self.model, &self.templates) else {
            return skeleton;
        };

        let prompt = PlannerPrompt {
            info,
            days,
            hits,
            places,
        };
        let user = match prompt.render(templates) {
            Ok(user) => user,
            Err(e) => {
                warn!(error = %e, "Planner prompt failed to render");
                return skeleton;
            }
        };
        let system = match tools.instructions().trim() {
            "" => PLANNER_SYSTEM,
            instructions => instructions,
        };
        let request = ChatRequest::text(system, user);
        match model.complete(&request).await {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                warn!(error = %e, "Planner model call failed, using skeleton");
                skeleton
            }
        }
    }
}

const PLANNER_SYSTEM: &str = "You write concise, practical travel itineraries.";

impl Default for PlannerWorker {
    fn default() -> Self {
        Self::new()
    }
}

/// Place names from search hit titles: the part before a separator such as
/// " - " or " | ", deduplicated
fn place_names(hits: &[WebHit]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for hit in hits {
        let name = [" - ", " | ", " : ", ": ", " – "]
            .iter()
            .fold(hit.title.as_str(), |title, sep| {
                title.split(sep).next().unwrap_or(title)
            })
            .trim();
        if !name.is_empty() && !names.iter().any(|n| n.eq_ignore_ascii_case(name)) {
            names.push(name.to_string());
        }
    }
    names
}

/// Spread places over the trip's days, in order
fn lay_out(info: &TravelInfo, places: &[String]) -> Vec<DayPlan> {
    let day_count = info.days.unwrap_or(1).clamp(1, MAX_DAYS);
    (0..day_count)
        .map(|i| {
            let activities: Vec<String> = places
                .iter()
                .skip(i as usize * ACTIVITIES_PER_DAY)
                .take(ACTIVITIES_PER_DAY)
                .cloned()
                .collect();
            DayPlan {
                day: i + 1,
                date: info
                    .start_date
                    .and_then(|start| start.checked_add_days(Days::new(u64::from(i)))),
                activities: if activities.is_empty() {
                    vec!["Free time".to_string()]
                } else {
                    activities
                },
            }
        })
        .collect()
}

fn render_days(info: &TravelInfo, days: &[DayPlan]) -> String {
    let mut text = format!(
        "{} itinerary, {} ({}), starting {}",
        info.destination, info.duration, info.concept, info.when
    );
    for day in days {
        text.push_str(&format!("\n\nDay {}", day.day));
        if let Some(date) = day.date {
            text.push_str(&format!(" ({})", date));
        }
        text.push(':');
        for activity in &day.activities {
            text.push_str(&format!("\n- {}", activity));
        }
    }
    text
}

fn detail_for<'a>(activity: &str, places: &'a [Place]) -> Option<&'a Place> {
    let activity = activity.to_lowercase();
    places.iter().find(|place| {
        let name = place.name.to_lowercase();
        name.contains(&activity) || activity.contains(&name)
    })
}

#[async_trait]
impl Worker for PlannerWorker {
    fn id(&self) -> WorkerId {
        WorkerId::Planner
    }

    async fn run(&self, directive: &str, snapshot: &Snapshot, tools: &ToolBox) -> WorkerResult {
        if facts::details_current(snapshot) {
            debug!("Planner phase 2: merging place details");
            self.finalize(snapshot, tools).await
        } else {
            debug!("Planner phase 1: drafting");
            self.draft(directive, snapshot, tools).await
        }
    }
}
