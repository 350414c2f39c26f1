use super::{
    CalendarBackend, CalendarEvent, Place, PlaceLookup, PublishService, SearchService, WebHit,
};
use crate::error::ServiceError;
use async_trait::async_trait;
use chrono::NaiveDateTime;

/// Placeholder for a collaborator the host did not configure. Every call
/// fails with `ServiceError::Unavailable` naming the service.
#[derive(Debug, Clone)]
pub struct Unconfigured {
    service: &'static str,
}

impl Unconfigured {
    pub fn new(service: &'static str) -> Self {
        Self { service }
    }

    fn fail<T>(&self) -> Result<T, ServiceError> {
        Err(ServiceError::Unavailable(self.service.to_string()))
    }
}

#[async_trait]
impl SearchService for Unconfigured {
    async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<WebHit>, ServiceError> {
        self.fail()
    }
}

#[async_trait]
impl PlaceLookup for Unconfigured {
    async fn lookup(&self, _query: &str, _limit: usize) -> Result<Vec<Place>, ServiceError> {
        self.fail()
    }
}

#[async_trait]
impl CalendarBackend for Unconfigured {
    async fn create(&self, _event: &CalendarEvent) -> Result<String, ServiceError> {
        self.fail()
    }

    async fn update(&self, _event_id: &str, _event: &CalendarEvent) -> Result<(), ServiceError> {
        self.fail()
    }

    async fn delete(&self, _event_id: &str) -> Result<(), ServiceError> {
        self.fail()
    }

    async fn search(
        &self,
        _query: &str,
        _include_past: bool,
    ) -> Result<Vec<CalendarEvent>, ServiceError> {
        self.fail()
    }

    async fn list_in_range(
        &self,
        _from: NaiveDateTime,
        _to: NaiveDateTime,
    ) -> Result<Vec<CalendarEvent>, ServiceError> {
        self.fail()
    }

    async fn refresh_credentials(&self) -> Result<(), ServiceError> {
        self.fail()
    }
}

#[async_trait]
impl PublishService for Unconfigured {
    async fn create_page(&self, _title: &str, _content: &str) -> Result<Option<String>, ServiceError> {
        self.fail()
    }
}
