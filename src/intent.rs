//! Keyword intent detection over user text
//!
//! English and Korean keyword sets. Used by the rule router, the
//! precondition guard and the calendar worker.

use crate::artifact::CalendarAction;
use regex::Regex;
use std::sync::OnceLock;

// "schedule" and "일정" also mean itinerary, so they are not calendar nouns
const CALENDAR_NOUNS: &[&str] = &["calendar", "event", "events", "캘린더", "이벤트", "등록"];
const AVAILABILITY: &[&str] = &["available", "availability", "free on", "busy", "가능", "비어"];
const DELETE: &[&str] = &["delete", "remove", "cancel", "삭제", "취소"];
const UPDATE: &[&str] = &["update", "change", "reschedule", "move", "수정", "변경"];
const SEARCH: &[&str] = &[
    "find", "search", "look up", "show", "list", "조회", "찾아", "보여",
];
const SHARE: &[&str] = &["share", "notion", "publish", "공유", "노션", "보내줘"];
const SKIP_SEARCH: &[&str] = &[
    "skip search",
    "skip the search",
    "no search",
    "without search",
    "검색 없이",
    "검색하지 말고",
];

/// Compile a literal pattern once
pub(crate) fn cached_regex(
    cell: &'static OnceLock<Option<Regex>>,
    pattern: &str,
) -> Option<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern).ok()).as_ref()
}

/// Lowercased text padded with single spaces between words, so ASCII
/// phrases match on word boundaries
fn words(text: &str) -> String {
    let mut out = String::from(" ");
    for word in text
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric() && c != '-')
        .filter(|w| !w.is_empty())
    {
        out.push_str(word);
        out.push(' ');
    }
    out
}

fn mentions(text: &str, keywords: &[&str]) -> bool {
    let padded = words(text);
    let lower = text.to_lowercase();
    keywords.iter().any(|k| {
        if k.is_ascii() {
            padded.contains(&format!(" {} ", k))
        } else {
            lower.contains(k)
        }
    })
}

/// The calendar operation the text asks for, if it is about the calendar
pub fn calendar_action(text: &str) -> Option<CalendarAction> {
    if !mentions(text, CALENDAR_NOUNS) {
        return None;
    }
    let action = if mentions(text, AVAILABILITY) {
        CalendarAction::CheckAvailability
    } else if mentions(text, DELETE) {
        CalendarAction::Delete
    } else if mentions(text, UPDATE) {
        CalendarAction::Update
    } else if mentions(text, SEARCH) {
        CalendarAction::Search
    } else {
        CalendarAction::Create
    };
    Some(action)
}

/// Calendar requests that do not need a finished plan
pub fn is_calendar_management(text: &str) -> bool {
    matches!(
        calendar_action(text),
        Some(action) if action != CalendarAction::Create
    )
}

pub fn wants_share(text: &str) -> bool {
    mentions(text, SHARE)
}

/// The user explicitly asked to plan without searching first
pub fn skip_search(text: &str) -> bool {
    mentions(text, SKIP_SEARCH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calendar_actions() {
        assert_eq!(
            calendar_action("Add it to my calendar"),
            Some(CalendarAction::Create)
        );
        assert_eq!(
            calendar_action("delete event evt-3 from the calendar"),
            Some(CalendarAction::Delete)
        );
        assert_eq!(
            calendar_action("캘린더 일정 수정해줘"),
            Some(CalendarAction::Update)
        );
        assert_eq!(
            calendar_action("Am I available on 2025-05-03? check my calendar"),
            Some(CalendarAction::CheckAvailability)
        );
        assert_eq!(
            calendar_action("find my Jeju events"),
            Some(CalendarAction::Search)
        );
        assert_eq!(calendar_action("find good restaurants in Busan"), None);
    }

    #[test]
    fn test_word_boundaries() {
        assert_eq!(
            calendar_action("put the showroom visit in my calendar"),
            Some(CalendarAction::Create)
        );
        assert!(!wants_share("shareholders meeting"));
    }

    #[test]
    fn test_share_and_skip() {
        assert!(wants_share("please share it to Notion"));
        assert!(wants_share("노션에 공유해줘"));
        assert!(skip_search("plan it, skip search"));
        assert!(!skip_search("search for cafes"));
    }

    #[test]
    fn test_management_excludes_create() {
        assert!(is_calendar_management("remove the calendar event evt-1"));
        assert!(!is_calendar_management("register it in the calendar"));
    }
}
