//! Built-in capability definitions
//!
//! Built-in workers:
//! - `info_collection`: gathers when/where/duration/concept, no tools
//! - `search`: web search, and place detail lookup for a draft itinerary
//! - `planner`: two-phase itinerary planning
//! - `calendar`: registers and manages trips in the calendar
//! - `share`: publishes a finalized itinerary as a page

use super::config::Capability;
use super::worker::WorkerId;
use crate::tools;
use indexmap::IndexMap;

const INFO_COLLECTION_PROMPT: &str = "\
Collect four facts about the trip: when, where, how long, and the concept \
(e.g. healing, food tour, activities). Read every user message, not only the \
last one. Validate dates (2025-05-03, May 3, 5/3, 5월 3일) and durations \
(3 days, 2 nights 3 days, 2박3일, day trip). When something is missing, ask \
for exactly the missing facts in one message.";

const SEARCH_PROMPT: &str = "\
Search for information that grounds the itinerary. With no draft yet, run a \
web search for the destination and concept. When a draft names places, look \
up each place by its exact name, one query per place, with no extra words \
such as 'attraction' or a city prefix. Drop places outside the requested \
region.";

const PLANNER_PROMPT: &str = "\
You plan itineraries in two phases.\n\
Phase 1 (no place detail yet): you MUST call web_search and build a day-by-day \
draft from the results. Never rely on prior knowledge alone. Name every place \
explicitly.\n\
Phase 2 (place detail was delivered): do NOT search again. Merge addresses, \
phone numbers and categories into the draft and produce the final plan.";

const CALENDAR_PROMPT: &str = "\
Register, update, delete and search trips in the calendar. Only register a \
trip when it has a concrete start date and a resolvable end date. Ask for \
missing dates instead of guessing. When the year is omitted, use the next \
occurrence of that month and day. Updates need an event id; search first when \
the user does not have one.";

const SHARE_PROMPT: &str = "\
Publish the finalized itinerary as a page titled '<destination> travel plan - \
<date>' with a structured, readable body, and return the link.";

/// Get all built-in capabilities, in routing order
pub fn builtin_capabilities() -> IndexMap<WorkerId, Capability> {
    let mut caps = IndexMap::new();

    caps.insert(
        WorkerId::InfoCollection,
        Capability::new("Collects destination, dates, duration and trip concept from the user.")
            .with_instructions(INFO_COLLECTION_PROMPT),
    );

    caps.insert(
        WorkerId::Search,
        Capability::new(
            "Web search for the destination, or place detail lookup for places in a draft itinerary.",
        )
        .with_tool(tools::WEB_SEARCH)
        .with_tool(tools::PLACE_LOOKUP)
        .with_instructions(SEARCH_PROMPT),
    );

    caps.insert(
        WorkerId::Planner,
        Capability::new(
            "Builds a draft itinerary from search results, then a final plan once place details exist.",
        )
        .with_tool(tools::WEB_SEARCH)
        .with_instructions(PLANNER_PROMPT),
    );

    caps.insert(
        WorkerId::Calendar,
        Capability::new("Adds, updates, deletes, searches calendar events and checks availability.")
            .with_tool(tools::CALENDAR_CREATE)
            .with_tool(tools::CALENDAR_UPDATE)
            .with_tool(tools::CALENDAR_DELETE)
            .with_tool(tools::CALENDAR_SEARCH)
            .with_tool(tools::CALENDAR_AVAILABILITY)
            .with_instructions(CALENDAR_PROMPT),
    );

    caps.insert(
        WorkerId::Share,
        Capability::new("Publishes a finalized itinerary as a shareable page.")
            .with_tool(tools::PUBLISH_PAGE)
            .with_instructions(SHARE_PROMPT),
    );

    caps
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_worker_has_a_builtin() {
        let caps = builtin_capabilities();
        for id in WorkerId::ALL {
            assert!(caps.contains_key(&id), "missing builtin for {}", id);
        }
    }

    #[test]
    fn test_info_collection_has_no_tools() {
        let caps = builtin_capabilities();
        assert!(caps[&WorkerId::InfoCollection].tools.is_empty());
        assert!(caps[&WorkerId::Planner].tools.contains(&tools::WEB_SEARCH.to_string()));
    }
}
