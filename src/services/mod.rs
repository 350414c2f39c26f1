//! External collaborators
//!
//! The core only sees these traits. Concrete adapters are thin HTTP glue;
//! `Unconfigured` stands in for anything the host did not set up.

mod calendar;
mod kakao;
mod notion;
mod searx;
mod unconfigured;

pub use calendar::{LocalCalendar, RefreshingCalendar};
pub use kakao::KakaoPlaces;
pub use notion::{share_url, NotionPublisher};
pub use searx::SearxSearch;
pub use unconfigured::Unconfigured;

use crate::error::ServiceError;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebHit {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    /// Longitude
    #[serde(default)]
    pub x: Option<f64>,
    /// Latitude
    #[serde(default)]
    pub y: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    #[serde(default)]
    pub location: Option<String>,
}

#[async_trait]
pub trait SearchService: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<WebHit>, ServiceError>;
}

#[async_trait]
pub trait PlaceLookup: Send + Sync {
    async fn lookup(&self, query: &str, limit: usize) -> Result<Vec<Place>, ServiceError>;
}

#[async_trait]
pub trait CalendarBackend: Send + Sync {
    /// Returns the new event id
    async fn create(&self, event: &CalendarEvent) -> Result<String, ServiceError>;

    async fn update(&self, event_id: &str, event: &CalendarEvent) -> Result<(), ServiceError>;

    async fn delete(&self, event_id: &str) -> Result<(), ServiceError>;

    /// Events whose title or description contains `query`
    async fn search(&self, query: &str, include_past: bool)
        -> Result<Vec<CalendarEvent>, ServiceError>;

    /// Events overlapping `[from, to)`
    async fn list_in_range(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<CalendarEvent>, ServiceError>;

    /// Obtain fresh credentials after an `Unauthorized` response
    async fn refresh_credentials(&self) -> Result<(), ServiceError>;
}

#[async_trait]
pub trait PublishService: Send + Sync {
    /// Returns the created page id, or `None` when the service accepted the
    /// request but produced no page
    async fn create_page(&self, title: &str, content: &str) -> Result<Option<String>, ServiceError>;
}

/// The collaborator set a planner is built with
#[derive(Clone)]
pub struct Services {
    pub search: Arc<dyn SearchService>,
    pub places: Arc<dyn PlaceLookup>,
    pub calendar: Arc<dyn CalendarBackend>,
    pub publisher: Arc<dyn PublishService>,
}

impl Services {
    /// Every collaborator unavailable
    pub fn unconfigured() -> Self {
        Self {
            search: Arc::new(Unconfigured::new("web search")),
            places: Arc::new(Unconfigured::new("place lookup")),
            calendar: Arc::new(Unconfigured::new("calendar")),
            publisher: Arc::new(Unconfigured::new("page publishing")),
        }
    }

    pub fn with_search(mut self, search: impl SearchService + 'static) -> Self {
        self.search = Arc::new(search);
        self
    }

    pub fn with_places(mut self, places: impl PlaceLookup + 'static) -> Self {
        self.places = Arc::new(places);
        self
    }

    /// Wraps the backend with the refresh-and-retry-once contract
    pub fn with_calendar(mut self, calendar: impl CalendarBackend + 'static) -> Self {
        self.calendar = Arc::new(RefreshingCalendar::new(calendar));
        self
    }

    pub fn with_publisher(mut self, publisher: impl PublishService + 'static) -> Self {
        self.publisher = Arc::new(publisher);
        self
    }
}
