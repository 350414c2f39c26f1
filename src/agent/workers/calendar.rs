//! Calendar worker
//!
//! Registers the final plan as a calendar event, and manages existing
//! events (update, delete, search, availability). Mandatory fields are
//! checked before any tool call: an incomplete request fails locally and
//! the calendar is never touched.

use super::dates::{find_date, find_duration, plan_days};
use super::failed_call;
use crate::agent::{ErrorCode, Worker, WorkerId, WorkerResult};
use crate::artifact::{Artifact, CalendarAction, CalendarOutcome, FinalItinerary};
use crate::facts;
use crate::intent::{self, cached_regex};
use crate::services::CalendarEvent;
use crate::state::Snapshot;
use crate::tool::ToolBox;
use crate::tools::{
    CreatedEvent, CALENDAR_AVAILABILITY, CALENDAR_CREATE, CALENDAR_DELETE, CALENDAR_SEARCH,
    CALENDAR_UPDATE,
};
use async_trait::async_trait;
use chrono::{Days, Local, NaiveDate};
use regex::Regex;
use serde_json::json;
use std::sync::OnceLock;
use tracing::debug;

static EVENT_ID: OnceLock<Option<Regex>> = OnceLock::new();

const PAST_WORDS: &[&str] = &["past", "previous", "all", "지난", "전체"];

/// First and last day of a trip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Span {
    start: NaiveDate,
    end: NaiveDate,
}

fn event_id(text: &str) -> Option<String> {
    let re = cached_regex(
        &EVENT_ID,
        r"(?i)(?:\bevent|\bid|이벤트)\s*(?:id)?\s*[:#]?\s*([A-Za-z0-9_-]*\d[A-Za-z0-9_-]*)",
    )?;
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn event_title(plan: &FinalItinerary) -> String {
    format!("{} trip ({})", plan.info.destination, plan.info.concept)
}

pub struct CalendarWorker {
    today: Option<NaiveDate>,
}

impl CalendarWorker {
    pub fn new() -> Self {
        Self { today: None }
    }

    /// Pin the reference date used to resolve dates without a year
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Local::now().date_naive())
    }

    /// Resolve a trip span from the request text, falling back to the plan.
    /// Errors name the first missing field.
    fn span(&self, text: &str, plan: Option<&FinalItinerary>) -> Result<Span, ErrorCode> {
        let start = find_date(text, self.today())
            .map(|found| found.date)
            .or_else(|| plan.and_then(|p| p.info.start_date))
            .ok_or(ErrorCode::MissingStartDate)?;

        let days = find_duration(text)
            .map(|found| found.days)
            .or_else(|| {
                let plan = plan?;
                plan.info
                    .days
                    .or_else(|| find_duration(&plan.info.duration).map(|found| found.days))
                    .or_else(|| plan_days(&plan.text))
            })
            .filter(|days| *days > 0)
            .ok_or(ErrorCode::MissingEndDate)?;

        let end = start
            .checked_add_days(Days::new(u64::from(days - 1)))
            .ok_or(ErrorCode::MissingEndDate)?;
        Ok(Span { start, end })
    }

    fn missing(&self, code: ErrorCode) -> WorkerResult {
        let message = match code {
            ErrorCode::MissingStartDate => "When does the trip start? Please give a date like 2025-05-03.",
            ErrorCode::MissingEndDate => "How long is the trip? Please give a duration like 3 days or 2박3일.",
            ErrorCode::MissingEventId => "Which event? Please give the event id (search the calendar to find it).",
            _ => "The calendar request is incomplete.",
        };
        WorkerResult::failure(self.id(), code, message)
    }

    async fn create(&self, text: &str, snapshot: &Snapshot, tools: &ToolBox) -> WorkerResult {
        let Some(plan) = facts::final_plan(snapshot).map(|f| f.value) else {
            return WorkerResult::failure(
                self.id(),
                ErrorCode::NoFinalPlan,
                "There is no finished plan to put in the calendar yet.",
            );
        };
        let span = match self.span(text, Some(plan)) {
            Ok(span) => span,
            Err(code) => return self.missing(code),
        };

        let title = event_title(plan);
        let result = tools
            .call(
                CALENDAR_CREATE,
                json!({
                    "title": title,
                    "description": plan.text,
                    "start_date": span.start.to_string(),
                    "end_date": span.end.to_string(),
                    "location": plan.info.destination,
                }),
            )
            .await;
        if result.is_error {
            return failed_call(self.id(), CALENDAR_CREATE, &result);
        }
        let Some(created) = result.parse::<CreatedEvent>() else {
            return WorkerResult::failure(
                self.id(),
                ErrorCode::UpstreamError,
                "The calendar did not return an event id.",
            );
        };

        let message = format!(
            "Added '{}' to your calendar from {} to {} (event {}).",
            title, span.start, span.end, created.event_id
        );
        WorkerResult::success(
            self.id(),
            Artifact::CalendarOutcome(CalendarOutcome {
                action: CalendarAction::Create,
                event_id: Some(created.event_id),
                events: Vec::new(),
            }),
            message,
        )
    }

    async fn update(&self, text: &str, snapshot: &Snapshot, tools: &ToolBox) -> WorkerResult {
        let Some(id) = event_id(text) else {
            return self.missing(ErrorCode::MissingEventId);
        };
        let plan = facts::final_plan(snapshot).map(|f| f.value);
        let span = match self.span(text, plan) {
            Ok(span) => span,
            Err(code) => return self.missing(code),
        };
        let title = plan.map(event_title).unwrap_or_else(|| "Trip".to_string());

        let result = tools
            .call(
                CALENDAR_UPDATE,
                json!({
                    "event_id": id,
                    "title": title,
                    "description": plan.map(|p| p.text.as_str()).unwrap_or(""),
                    "start_date": span.start.to_string(),
                    "end_date": span.end.to_string(),
                }),
            )
            .await;
        if result.is_error {
            return failed_call(self.id(), CALENDAR_UPDATE, &result);
        }

        WorkerResult::success(
            self.id(),
            Artifact::CalendarOutcome(CalendarOutcome {
                action: CalendarAction::Update,
                event_id: Some(id.clone()),
                events: Vec::new(),
            }),
            format!("Moved event {} to {} - {}.", id, span.start, span.end),
        )
    }

    async fn delete(&self, text: &str, tools: &ToolBox) -> WorkerResult {
        let Some(id) = event_id(text) else {
            return self.missing(ErrorCode::MissingEventId);
        };
        let result = tools.call(CALENDAR_DELETE, json!({"event_id": id})).await;
        if result.is_error {
            return failed_call(self.id(), CALENDAR_DELETE, &result);
        }

        WorkerResult::success(
            self.id(),
            Artifact::CalendarOutcome(CalendarOutcome {
                action: CalendarAction::Delete,
                event_id: Some(id.clone()),
                events: Vec::new(),
            }),
            format!("Deleted event {}.", id),
        )
    }

    async fn search(&self, text: &str, snapshot: &Snapshot, tools: &ToolBox) -> WorkerResult {
        let query = facts::travel_info(snapshot)
            .map(|f| f.value.destination.clone())
            .unwrap_or_default();
        let lower = text.to_lowercase();
        let include_past = PAST_WORDS.iter().any(|w| lower.contains(w));

        let result = tools
            .call(CALENDAR_SEARCH, json!({"query": query, "include_past": include_past}))
            .await;
        if result.is_error {
            return failed_call(self.id(), CALENDAR_SEARCH, &result);
        }
        let events = result.parse::<Vec<CalendarEvent>>().unwrap_or_default();

        let message = describe_events(&events, "No matching events found.");
        WorkerResult::success(
            self.id(),
            Artifact::CalendarOutcome(CalendarOutcome {
                action: CalendarAction::Search,
                event_id: None,
                events,
            }),
            message,
        )
    }

    async fn availability(&self, text: &str, snapshot: &Snapshot, tools: &ToolBox) -> WorkerResult {
        let date = find_date(text, self.today()).map(|found| found.date).or_else(|| {
            facts::final_plan(snapshot).and_then(|f| f.value.info.start_date)
        });
        let Some(date) = date else {
            return self.missing(ErrorCode::MissingStartDate);
        };

        let result = tools
            .call(CALENDAR_AVAILABILITY, json!({"date": date.to_string()}))
            .await;
        if result.is_error {
            return failed_call(self.id(), CALENDAR_AVAILABILITY, &result);
        }
        let events = result.parse::<Vec<CalendarEvent>>().unwrap_or_default();

        let message = describe_events(&events, &format!("You are free on {}.", date));
        WorkerResult::success(
            self.id(),
            Artifact::CalendarOutcome(CalendarOutcome {
                action: CalendarAction::CheckAvailability,
                event_id: None,
                events,
            }),
            message,
        )
    }
}

impl Default for CalendarWorker {
    fn default() -> Self {
        Self::new()
    }
}

fn describe_events(events: &[CalendarEvent], empty: &str) -> String {
    if events.is_empty() {
        return empty.to_string();
    }
    let mut message = format!("{} event(s):", events.len());
    for event in events {
        message.push_str(&format!(
            "\n- {} [{}] {} - {}",
            event.title,
            event.id.as_deref().unwrap_or("?"),
            event.start.date(),
            event.end.date()
        ));
    }
    message
}

#[async_trait]
impl Worker for CalendarWorker {
    fn id(&self) -> WorkerId {
        WorkerId::Calendar
    }

    async fn run(&self, directive: &str, snapshot: &Snapshot, tools: &ToolBox) -> WorkerResult {
        let user_text = facts::last_user_text(snapshot);
        let action = intent::calendar_action(directive)
            .or_else(|| intent::calendar_action(user_text))
            .unwrap_or(CalendarAction::Create);
        let text = format!("{}\n{}", directive, user_text);
        debug!(action = action.as_str(), "Calendar request");

        match action {
            CalendarAction::Create => self.create(&text, snapshot, tools).await,
            CalendarAction::Update => self.update(&text, snapshot, tools).await,
            CalendarAction::Delete => self.delete(&text, tools).await,
            CalendarAction::Search => self.search(&text, snapshot, tools).await,
            CalendarAction::CheckAvailability => self.availability(&text, snapshot, tools).await,
        }
    }
}
