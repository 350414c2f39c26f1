//! Structured payloads produced by workers

use crate::services::{CalendarEvent, Place, WebHit};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A trip fact the info-collection worker gathers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InfoField {
    When,
    Where,
    Duration,
    Concept,
}

impl InfoField {
    pub const ALL: [InfoField; 4] = [
        InfoField::When,
        InfoField::Where,
        InfoField::Duration,
        InfoField::Concept,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InfoField::When => "when",
            InfoField::Where => "where",
            InfoField::Duration => "duration",
            InfoField::Concept => "concept",
        }
    }

    pub fn prompt(&self) -> &'static str {
        match self {
            InfoField::When => "When are you travelling (e.g. 2025-05-03 or May 3)?",
            InfoField::Where => "Where would you like to go?",
            InfoField::Duration => "How long is the trip (e.g. 3 days, 2 nights 3 days)?",
            InfoField::Concept => "What kind of trip is it (e.g. healing, food tour, activities)?",
        }
    }
}

/// Complete travel requirements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TravelInfo {
    pub when: String,
    #[serde(rename = "where")]
    pub destination: String,
    pub duration: String,
    pub concept: String,
    /// Resolved first day, when `when` names a calendar date
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    /// Number of days, when `duration` could be parsed
    #[serde(default)]
    pub days: Option<u32>,
}

impl TravelInfo {
    /// Query used by the search worker when no directive is given
    pub fn search_query(&self) -> String {
        format!("{} {} travel attractions", self.destination, self.concept)
    }
}

/// Info collection could not complete; ask the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClarifyingQuestion {
    pub missing: Vec<InfoField>,
    pub question: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHits {
    pub query: String,
    pub hits: Vec<WebHit>,
}

/// Place detail for the places named in an itinerary draft
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationDetails {
    pub places: Vec<Place>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayPlan {
    pub day: u32,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    pub activities: Vec<String>,
}

/// Phase one planner output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItineraryDraft {
    pub info: TravelInfo,
    pub days: Vec<DayPlan>,
    /// Place names that need detail lookup
    pub places: Vec<String>,
    pub text: String,
}

/// Phase two planner output: the draft merged with place detail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalItinerary {
    pub info: TravelInfo,
    pub days: Vec<DayPlan>,
    pub places: Vec<Place>,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalendarAction {
    Create,
    Update,
    Delete,
    Search,
    CheckAvailability,
}

impl CalendarAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            CalendarAction::Create => "create",
            CalendarAction::Update => "update",
            CalendarAction::Delete => "delete",
            CalendarAction::Search => "search",
            CalendarAction::CheckAvailability => "check_availability",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarOutcome {
    pub action: CalendarAction,
    #[serde(default)]
    pub event_id: Option<String>,
    #[serde(default)]
    pub events: Vec<CalendarEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareLink {
    pub page_id: String,
    pub url: String,
    pub title: String,
}

/// Payload of a worker result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Artifact {
    TravelInfo(TravelInfo),
    ClarifyingQuestion(ClarifyingQuestion),
    SearchHits(SearchHits),
    LocationDetails(LocationDetails),
    ItineraryDraft(ItineraryDraft),
    FinalItinerary(FinalItinerary),
    CalendarOutcome(CalendarOutcome),
    ShareLink(ShareLink),
}

impl Artifact {
    pub fn kind(&self) -> &'static str {
        match self {
            Artifact::TravelInfo(_) => "travel_info",
            Artifact::ClarifyingQuestion(_) => "clarifying_question",
            Artifact::SearchHits(_) => "search_hits",
            Artifact::LocationDetails(_) => "location_details",
            Artifact::ItineraryDraft(_) => "itinerary_draft",
            Artifact::FinalItinerary(_) => "final_itinerary",
            Artifact::CalendarOutcome(_) => "calendar_outcome",
            Artifact::ShareLink(_) => "share_link",
        }
    }
}
