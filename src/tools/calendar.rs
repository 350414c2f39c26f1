//! Calendar tools
//!
//! Trips are stored as day-spanning events from 09:00 on the first day to
//! 18:00 on the last day.

use crate::services::{CalendarBackend, CalendarEvent};
use crate::tool::{parameters_for, Tool, ToolContext, ToolDefinition, ToolFailure, ToolResult};
use async_trait::async_trait;
use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

const DAY_START: (u32, u32) = (9, 0);
const DAY_END: (u32, u32) = (18, 0);

fn parse_date(field: &str, value: &str) -> Result<NaiveDate, ToolResult> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        ToolResult::invalid_arguments(format!("{} must be YYYY-MM-DD, got '{}'", field, value))
    })
}

fn at(date: NaiveDate, (hour, minute): (u32, u32)) -> NaiveDateTime {
    date.and_time(NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN))
}

fn decode<T: for<'de> Deserialize<'de>>(args: Value, ctx: &ToolContext) -> Result<T, ToolResult> {
    if ctx.is_cancelled() {
        return Err(ToolResult::failure(ToolFailure::Cancelled, "Cancelled"));
    }
    serde_json::from_value(args).map_err(ToolResult::invalid_arguments)
}

/// Arguments shared by create and update
#[derive(Debug, Deserialize, JsonSchema)]
struct TripArgs {
    /// Event title
    title: String,
    /// First day, YYYY-MM-DD
    start_date: String,
    /// Last day, YYYY-MM-DD
    end_date: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    location: Option<String>,
}

impl TripArgs {
    fn into_event(self) -> Result<CalendarEvent, ToolResult> {
        let start = parse_date("start_date", &self.start_date)?;
        let end = parse_date("end_date", &self.end_date)?;
        if end < start {
            return Err(ToolResult::invalid_arguments("end_date is before start_date"));
        }
        Ok(CalendarEvent {
            id: None,
            title: self.title,
            description: self.description,
            start: at(start, DAY_START),
            end: at(end, DAY_END),
            location: self.location,
        })
    }
}

/// Output of `calendar_create`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedEvent {
    pub event_id: String,
}

pub struct CalendarCreateTool {
    calendar: Arc<dyn CalendarBackend>,
}

impl CalendarCreateTool {
    pub fn new(calendar: Arc<dyn CalendarBackend>) -> Self {
        Self { calendar }
    }
}

#[async_trait]
impl Tool for CalendarCreateTool {
    fn name(&self) -> &str {
        super::CALENDAR_CREATE
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: super::CALENDAR_CREATE.to_string(),
            description: "Register a trip in the calendar. Returns {event_id}.".to_string(),
            parameters: parameters_for::<TripArgs>(),
        }
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> ToolResult {
        let event = match decode::<TripArgs>(args, ctx).and_then(TripArgs::into_event) {
            Ok(e) => e,
            Err(result) => return result,
        };
        match self.calendar.create(&event).await {
            Ok(event_id) => ToolResult::json(&CreatedEvent { event_id }),
            Err(e) => e.into(),
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct UpdateArgs {
    /// Id of the event to change
    event_id: String,
    #[serde(flatten)]
    trip: TripArgs,
}

pub struct CalendarUpdateTool {
    calendar: Arc<dyn CalendarBackend>,
}

impl CalendarUpdateTool {
    pub fn new(calendar: Arc<dyn CalendarBackend>) -> Self {
        Self { calendar }
    }
}

#[async_trait]
impl Tool for CalendarUpdateTool {
    fn name(&self) -> &str {
        super::CALENDAR_UPDATE
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: super::CALENDAR_UPDATE.to_string(),
            description: "Replace the title, dates and description of an existing event."
                .to_string(),
            parameters: parameters_for::<UpdateArgs>(),
        }
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> ToolResult {
        let args = match decode::<UpdateArgs>(args, ctx) {
            Ok(a) => a,
            Err(result) => return result,
        };
        let event_id = args.event_id;
        let event = match args.trip.into_event() {
            Ok(e) => e,
            Err(result) => return result,
        };
        match self.calendar.update(&event_id, &event).await {
            Ok(()) => ToolResult::json(&CreatedEvent { event_id }),
            Err(e) => e.into(),
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct DeleteArgs {
    /// Id of the event to delete
    event_id: String,
}

pub struct CalendarDeleteTool {
    calendar: Arc<dyn CalendarBackend>,
}

impl CalendarDeleteTool {
    pub fn new(calendar: Arc<dyn CalendarBackend>) -> Self {
        Self { calendar }
    }
}

#[async_trait]
impl Tool for CalendarDeleteTool {
    fn name(&self) -> &str {
        super::CALENDAR_DELETE
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: super::CALENDAR_DELETE.to_string(),
            description: "Delete a calendar event by id.".to_string(),
            parameters: parameters_for::<DeleteArgs>(),
        }
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> ToolResult {
        let args = match decode::<DeleteArgs>(args, ctx) {
            Ok(a) => a,
            Err(result) => return result,
        };
        match self.calendar.delete(&args.event_id).await {
            Ok(()) => ToolResult::json(&CreatedEvent {
                event_id: args.event_id,
            }),
            Err(e) => e.into(),
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct SearchArgs {
    /// Text to find in event titles and descriptions
    query: String,
    /// Include events that already ended
    #[serde(default)]
    include_past: bool,
}

pub struct CalendarSearchTool {
    calendar: Arc<dyn CalendarBackend>,
}

impl CalendarSearchTool {
    pub fn new(calendar: Arc<dyn CalendarBackend>) -> Self {
        Self { calendar }
    }
}

#[async_trait]
impl Tool for CalendarSearchTool {
    fn name(&self) -> &str {
        super::CALENDAR_SEARCH
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: super::CALENDAR_SEARCH.to_string(),
            description: "Find trips in the calendar. Returns a JSON array of events.".to_string(),
            parameters: parameters_for::<SearchArgs>(),
        }
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> ToolResult {
        let args = match decode::<SearchArgs>(args, ctx) {
            Ok(a) => a,
            Err(result) => return result,
        };
        match self.calendar.search(&args.query, args.include_past).await {
            Ok(events) => ToolResult::json(&events),
            Err(e) => e.into(),
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct AvailabilityArgs {
    /// Day to check, YYYY-MM-DD
    date: String,
}

pub struct CalendarAvailabilityTool {
    calendar: Arc<dyn CalendarBackend>,
}

impl CalendarAvailabilityTool {
    pub fn new(calendar: Arc<dyn CalendarBackend>) -> Self {
        Self { calendar }
    }
}

#[async_trait]
impl Tool for CalendarAvailabilityTool {
    fn name(&self) -> &str {
        super::CALENDAR_AVAILABILITY
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: super::CALENDAR_AVAILABILITY.to_string(),
            description: "List events on a given day. An empty array means the day is free."
                .to_string(),
            parameters: parameters_for::<AvailabilityArgs>(),
        }
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> ToolResult {
        let args = match decode::<AvailabilityArgs>(args, ctx) {
            Ok(a) => a,
            Err(result) => return result,
        };
        let day = match parse_date("date", &args.date) {
            Ok(d) => d,
            Err(result) => return result,
        };
        let Some(next) = day.checked_add_days(Days::new(1)) else {
            return ToolResult::invalid_arguments("date out of range");
        };
        match self
            .calendar
            .list_in_range(at(day, (0, 0)), at(next, (0, 0)))
            .await
        {
            Ok(events) => ToolResult::json(&events),
            Err(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::LocalCalendar;
    use serde_json::json;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn ctx() -> ToolContext {
        ToolContext::new(CancellationToken::new(), Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_create_uses_day_bounds() {
        let calendar = Arc::new(LocalCalendar::new());
        let tool = CalendarCreateTool::new(calendar.clone());
        let result = tool
            .execute(
                json!({"title": "Jeju trip", "start_date": "2025-05-03", "end_date": "2025-05-05"}),
                &ctx(),
            )
            .await;
        let created: CreatedEvent = result.parse().unwrap();

        let events = calendar.events();
        assert_eq!(events[0].id.as_deref(), Some(created.event_id.as_str()));
        assert_eq!(events[0].start.to_string(), "2025-05-03 09:00:00");
        assert_eq!(events[0].end.to_string(), "2025-05-05 18:00:00");
    }

    #[tokio::test]
    async fn test_create_rejects_bad_dates() {
        let tool = CalendarCreateTool::new(Arc::new(LocalCalendar::new()));
        let result = tool
            .execute(
                json!({"title": "t", "start_date": "May 3", "end_date": "2025-05-05"}),
                &ctx(),
            )
            .await;
        assert_eq!(result.failure, Some(ToolFailure::InvalidArguments));

        let result = tool
            .execute(
                json!({"title": "t", "start_date": "2025-05-05", "end_date": "2025-05-03"}),
                &ctx(),
            )
            .await;
        assert_eq!(result.failure, Some(ToolFailure::InvalidArguments));
    }

    #[tokio::test]
    async fn test_availability_covers_one_day() {
        let calendar = Arc::new(LocalCalendar::new());
        CalendarCreateTool::new(calendar.clone())
            .execute(
                json!({"title": "Jeju", "start_date": "2025-05-03", "end_date": "2025-05-04"}),
                &ctx(),
            )
            .await;

        let tool = CalendarAvailabilityTool::new(calendar);
        let busy: Vec<CalendarEvent> = tool
            .execute(json!({"date": "2025-05-04"}), &ctx())
            .await
            .parse()
            .unwrap();
        assert_eq!(busy.len(), 1);

        let free: Vec<CalendarEvent> = tool
            .execute(json!({"date": "2025-05-05"}), &ctx())
            .await
            .parse()
            .unwrap();
        assert!(free.is_empty());
    }

    #[tokio::test]
    async fn test_update_and_delete_round() {
        let calendar = Arc::new(LocalCalendar::new());
        let created: CreatedEvent = CalendarCreateTool::new(calendar.clone())
            .execute(
                json!({"title": "Jeju", "start_date": "2025-05-03", "end_date": "2025-05-04"}),
                &ctx(),
            )
            .await
            .parse()
            .unwrap();

        let updated = CalendarUpdateTool::new(calendar.clone())
            .execute(
                json!({"event_id": created.event_id, "title": "Busan",
                       "start_date": "2025-06-01", "end_date": "2025-06-02"}),
                &ctx(),
            )
            .await;
        assert!(!updated.is_error);
        assert_eq!(calendar.events()[0].title, "Busan");

        let deleted = CalendarDeleteTool::new(calendar.clone())
            .execute(json!({"event_id": "evt-1"}), &ctx())
            .await;
        assert!(!deleted.is_error);
        assert!(calendar.events().is_empty());
    }
}
