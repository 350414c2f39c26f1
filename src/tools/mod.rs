//! Tool implementations
//!
//! Each tool implements `crate::tool::Tool` and wraps one collaborator
//! operation. Outputs are JSON so workers can decode them.

mod calendar;
mod place_lookup;
mod publish_page;
mod web_search;

pub use calendar::{
    CalendarAvailabilityTool, CalendarCreateTool, CalendarDeleteTool, CalendarSearchTool,
    CalendarUpdateTool, CreatedEvent,
};
pub use place_lookup::PlaceLookupTool;
pub use publish_page::{PublishPageTool, PublishedPage};
pub use web_search::WebSearchTool;

use crate::services::Services;
use crate::tool::ToolRegistry;

pub const WEB_SEARCH: &str = "web_search";
pub const PLACE_LOOKUP: &str = "place_lookup";
pub const CALENDAR_CREATE: &str = "calendar_create";
pub const CALENDAR_UPDATE: &str = "calendar_update";
pub const CALENDAR_DELETE: &str = "calendar_delete";
pub const CALENDAR_SEARCH: &str = "calendar_search";
pub const CALENDAR_AVAILABILITY: &str = "calendar_check_availability";
pub const PUBLISH_PAGE: &str = "publish_page";

/// Create a registry with every tool, backed by `services`
pub fn create_registry(services: &Services) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    registry.register(WebSearchTool::new(services.search.clone()));
    registry.register(PlaceLookupTool::new(services.places.clone()));
    registry.register(CalendarCreateTool::new(services.calendar.clone()));
    registry.register(CalendarUpdateTool::new(services.calendar.clone()));
    registry.register(CalendarDeleteTool::new(services.calendar.clone()));
    registry.register(CalendarSearchTool::new(services.calendar.clone()));
    registry.register(CalendarAvailabilityTool::new(services.calendar.clone()));
    registry.register(PublishPageTool::new(services.publisher.clone()));

    registry
}
