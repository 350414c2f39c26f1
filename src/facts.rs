//! Facts computed over a conversation snapshot
//!
//! The log has no query API; routing, the guard and workers derive what
//! they need here. Every lookup returns the sequence index of the turn it
//! came from so callers can compare recency.

use crate::agent::{WorkerId, WorkerResult};
use crate::artifact::{
    Artifact, CalendarOutcome, ClarifyingQuestion, FinalItinerary, ItineraryDraft,
    LocationDetails, SearchHits, ShareLink, TravelInfo,
};
use crate::state::{Payload, Role, Turn};

/// A value found in the log with the sequence index of its turn
#[derive(Debug, Clone, Copy)]
pub struct Found<'a, T: ?Sized> {
    pub seq: u64,
    pub value: &'a T,
}

/// Newest successful artifact matching `pick`
fn latest<'a, T>(
    turns: &'a [Turn],
    pick: impl Fn(&'a Artifact) -> Option<&'a T>,
) -> Option<Found<'a, T>> {
    turns.iter().rev().find_map(|turn| {
        let result = turn.result().filter(|r| r.is_success())?;
        let value = pick(result.artifact()?)?;
        Some(Found {
            seq: turn.seq(),
            value,
        })
    })
}

fn seq_of<T: ?Sized>(found: &Option<Found<'_, T>>) -> Option<u64> {
    found.as_ref().map(|f| f.seq)
}

/// `a` exists and is newer than `b` (or `b` is absent)
fn newer(a: Option<u64>, b: Option<u64>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a > b,
        (Some(_), None) => true,
        (None, _) => false,
    }
}

pub fn travel_info(turns: &[Turn]) -> Option<Found<'_, TravelInfo>> {
    latest(turns, |a| match a {
        Artifact::TravelInfo(v) => Some(v),
        _ => None,
    })
}

pub fn clarifying_question(turns: &[Turn]) -> Option<Found<'_, ClarifyingQuestion>> {
    latest(turns, |a| match a {
        Artifact::ClarifyingQuestion(v) => Some(v),
        _ => None,
    })
}

pub fn search_hits(turns: &[Turn]) -> Option<Found<'_, SearchHits>> {
    latest(turns, |a| match a {
        Artifact::SearchHits(v) => Some(v),
        _ => None,
    })
}

pub fn location_details(turns: &[Turn]) -> Option<Found<'_, LocationDetails>> {
    latest(turns, |a| match a {
        Artifact::LocationDetails(v) => Some(v),
        _ => None,
    })
}

pub fn draft(turns: &[Turn]) -> Option<Found<'_, ItineraryDraft>> {
    latest(turns, |a| match a {
        Artifact::ItineraryDraft(v) => Some(v),
        _ => None,
    })
}

pub fn final_plan(turns: &[Turn]) -> Option<Found<'_, FinalItinerary>> {
    latest(turns, |a| match a {
        Artifact::FinalItinerary(v) => Some(v),
        _ => None,
    })
}

pub fn calendar_outcome(turns: &[Turn]) -> Option<Found<'_, CalendarOutcome>> {
    latest(turns, |a| match a {
        Artifact::CalendarOutcome(v) => Some(v),
        _ => None,
    })
}

pub fn share_link(turns: &[Turn]) -> Option<Found<'_, ShareLink>> {
    latest(turns, |a| match a {
        Artifact::ShareLink(v) => Some(v),
        _ => None,
    })
}

/// The newest user turn's text
pub fn last_user(turns: &[Turn]) -> Option<Found<'_, str>> {
    turns.iter().rev().find_map(|turn| match (turn.role(), turn.payload()) {
        (Role::User, Payload::Text(text)) => Some(Found {
            seq: turn.seq(),
            value: text.as_str(),
        }),
        _ => None,
    })
}

pub fn last_user_text(turns: &[Turn]) -> &str {
    last_user(turns).map(|f| f.value).unwrap_or("")
}

/// Every user message, oldest first
pub fn user_texts(turns: &[Turn]) -> impl Iterator<Item = &str> {
    turns.iter().filter_map(|turn| match (turn.role(), turn.payload()) {
        (Role::User, Payload::Text(text)) => Some(text.as_str()),
        _ => None,
    })
}

/// Worker results appended since the newest user turn, oldest first
pub fn results_since_user(turns: &[Turn]) -> impl Iterator<Item = &WorkerResult> {
    let from = last_user(turns).map(|f| f.seq);
    turns
        .iter()
        .filter(move |turn| from.map_or(true, |from| turn.seq() > from))
        .filter_map(Turn::result)
}

/// Text of the newest agent-authored turn
pub fn last_agent_text(turns: &[Turn]) -> Option<&str> {
    turns
        .iter()
        .rev()
        .filter(|turn| turn.role() == Role::Agent)
        .find_map(|turn| turn.payload().text())
}

/// A clarifying question that the user has not answered yet
pub fn question_pending(turns: &[Turn]) -> bool {
    let question = seq_of(&clarifying_question(turns));
    newer(question, seq_of(&last_user(turns))) && newer(question, seq_of(&travel_info(turns)))
}

/// Travel info is complete and not superseded by a later question
pub fn info_complete(turns: &[Turn]) -> bool {
    let info = seq_of(&travel_info(turns));
    info.is_some() && !newer(seq_of(&clarifying_question(turns)), info)
}

/// Search results gathered for the current travel info
pub fn hits_current(turns: &[Turn]) -> bool {
    newer(seq_of(&search_hits(turns)), seq_of(&travel_info(turns)))
}

/// A draft built from the current search results
pub fn draft_current(turns: &[Turn]) -> bool {
    hits_current(turns) && newer(seq_of(&draft(turns)), seq_of(&search_hits(turns)))
}

/// Place detail gathered for the current draft
pub fn details_current(turns: &[Turn]) -> bool {
    draft_current(turns) && newer(seq_of(&location_details(turns)), seq_of(&draft(turns)))
}

/// A final plan merged from the current draft and detail
pub fn final_current(turns: &[Turn]) -> bool {
    details_current(turns)
        && newer(seq_of(&final_plan(turns)), seq_of(&location_details(turns)))
}

/// A final plan exists for the newest travel info
pub fn plan_finished(turns: &[Turn]) -> bool {
    let (Some(plan), Some(info)) = (final_plan(turns), travel_info(turns)) else {
        return false;
    };
    plan.seq > info.seq || plan.value.info == *info.value
}

/// Whether `worker` already produced a result since the newest user turn
pub fn ran_since_user(turns: &[Turn], worker: WorkerId) -> bool {
    results_since_user(turns).any(|r| r.worker() == worker)
}
