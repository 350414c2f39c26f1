//! Calendar backends
//!
//! `RefreshingCalendar` wraps any backend with the credential contract:
//! an `Unauthorized` response triggers exactly one refresh and one retry.
//! `LocalCalendar` keeps events in process for offline use.

use super::{CalendarBackend, CalendarEvent};
use crate::error::ServiceError;
use async_trait::async_trait;
use chrono::{Local, NaiveDateTime};
use parking_lot::Mutex;
use std::future::Future;
use tracing::{info, warn};

pub struct RefreshingCalendar<B> {
    inner: B,
}

impl<B: CalendarBackend> RefreshingCalendar<B> {
    pub fn new(inner: B) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }

    async fn with_refresh<T, F, Fut>(&self, op: &str, mut call: F) -> Result<T, ServiceError>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, ServiceError>> + Send,
        T: Send,
    {
        match call().await {
            Err(ServiceError::Unauthorized(reason)) => {
                warn!(op, %reason, "Calendar credentials rejected, refreshing");
                self.inner.refresh_credentials().await?;
                info!(op, "Calendar credentials refreshed, retrying");
                call().await
            }
            other => other,
        }
    }
}

#[async_trait]
impl<B: CalendarBackend> CalendarBackend for RefreshingCalendar<B> {
    async fn create(&self, event: &CalendarEvent) -> Result<String, ServiceError> {
        self.with_refresh("create", || self.inner.create(event)).await
    }

    async fn update(&self, event_id: &str, event: &CalendarEvent) -> Result<(), ServiceError> {
        self.with_refresh("update", || self.inner.update(event_id, event))
            .await
    }

    async fn delete(&self, event_id: &str) -> Result<(), ServiceError> {
        self.with_refresh("delete", || self.inner.delete(event_id)).await
    }

    async fn search(
        &self,
        query: &str,
        include_past: bool,
    ) -> Result<Vec<CalendarEvent>, ServiceError> {
        self.with_refresh("search", || self.inner.search(query, include_past))
            .await
    }

    async fn list_in_range(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<CalendarEvent>, ServiceError> {
        self.with_refresh("list_in_range", || self.inner.list_in_range(from, to))
            .await
    }

    async fn refresh_credentials(&self) -> Result<(), ServiceError> {
        self.inner.refresh_credentials().await
    }
}

/// In-process calendar
#[derive(Default)]
pub struct LocalCalendar {
    events: Mutex<Vec<CalendarEvent>>,
    next_id: Mutex<u64>,
    now: Option<NaiveDateTime>,
}

impl LocalCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin "now" for past-event filtering
    pub fn with_now(mut self, now: NaiveDateTime) -> Self {
        self.now = Some(now);
        self
    }

    pub fn events(&self) -> Vec<CalendarEvent> {
        self.events.lock().clone()
    }

    fn now(&self) -> NaiveDateTime {
        self.now.unwrap_or_else(|| Local::now().naive_local())
    }
}

#[async_trait]
impl CalendarBackend for LocalCalendar {
    async fn create(&self, event: &CalendarEvent) -> Result<String, ServiceError> {
        let id = {
            let mut next = self.next_id.lock();
            *next += 1;
            format!("evt-{}", *next)
        };
        let mut stored = event.clone();
        stored.id = Some(id.clone());
        self.events.lock().push(stored);
        Ok(id)
    }

    async fn update(&self, event_id: &str, event: &CalendarEvent) -> Result<(), ServiceError> {
        let mut events = self.events.lock();
        let slot = events
            .iter_mut()
            .find(|e| e.id.as_deref() == Some(event_id))
            .ok_or_else(|| ServiceError::Upstream(format!("event {} not found", event_id)))?;
        *slot = CalendarEvent {
            id: Some(event_id.to_string()),
            ..event.clone()
        };
        Ok(())
    }

    async fn delete(&self, event_id: &str) -> Result<(), ServiceError> {
        let mut events = self.events.lock();
        let before = events.len();
        events.retain(|e| e.id.as_deref() != Some(event_id));
        if events.len() == before {
            return Err(ServiceError::Upstream(format!("event {} not found", event_id)));
        }
        Ok(())
    }

    async fn search(
        &self,
        query: &str,
        include_past: bool,
    ) -> Result<Vec<CalendarEvent>, ServiceError> {
        let needle = query.to_lowercase();
        let now = self.now();
        Ok(self
            .events
            .lock()
            .iter()
            .filter(|e| include_past || e.end >= now)
            .filter(|e| {
                e.title.to_lowercase().contains(&needle)
                    || e.description.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect())
    }

    async fn list_in_range(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<CalendarEvent>, ServiceError> {
        Ok(self
            .events
            .lock()
            .iter()
            .filter(|e| e.start < to && e.end > from)
            .cloned()
            .collect())
    }

    async fn refresh_credentials(&self) -> Result<(), ServiceError> {
        Ok(())
    }
}
