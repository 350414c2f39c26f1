//! Info-collection worker
//!
//! Gathers when / where / how long / what kind from every user turn so far.
//! Later messages override earlier ones field by field. A partial result is
//! not a failure: the worker asks for whatever is still missing.

use super::dates::{find_date, find_duration};
use crate::agent::{Worker, WorkerId, WorkerResult};
use crate::artifact::{Artifact, ClarifyingQuestion, InfoField, TravelInfo};
use crate::facts;
use crate::intent::cached_regex;
use crate::state::Snapshot;
use crate::tool::ToolBox;
use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

static DEST_PREPOSITION: OnceLock<Option<Regex>> = OnceLock::new();
static DEST_SUFFIX: OnceLock<Option<Regex>> = OnceLock::new();
static DEST_KOREAN_PARTICLE: OnceLock<Option<Regex>> = OnceLock::new();
static DEST_KOREAN_TRIP: OnceLock<Option<Regex>> = OnceLock::new();

// Phrases first so "food tour" wins over "food"
const CONCEPTS: &[&str] = &[
    "food tour",
    "healing",
    "relaxing",
    "relaxation",
    "foodie",
    "food",
    "gourmet",
    "activities",
    "activity",
    "adventure",
    "hiking",
    "nature",
    "culture",
    "history",
    "shopping",
    "family",
    "romantic",
    "honeymoon",
    "beach",
    "sightseeing",
    "호캉스",
    "힐링",
    "맛집",
    "먹방",
    "액티비티",
    "관광",
    "문화",
    "역사",
    "쇼핑",
    "가족",
    "커플",
    "자연",
    "휴양",
    "바다",
];

// Capitalized words that follow "in"/"to" but are not places
const NOT_PLACES: &[&str] = &[
    "January", "February", "March", "April", "May", "June", "July", "August", "September",
    "October", "November", "December", "Jan", "Feb", "Mar", "Apr", "Jun", "Jul", "Aug", "Sep",
    "Sept", "Oct", "Nov", "Dec", "Monday", "Tuesday", "Wednesday", "Thursday", "Friday",
    "Saturday", "Sunday", "Notion", "I",
];

const NOT_PLACES_KO: &[&str] = &["당일치기", "일일", "가족", "힐링", "맛집", "국내", "해외", "커플", "혼자"];

/// Facts gathered so far
#[derive(Debug, Default, Clone, PartialEq)]
struct Gathered {
    when: Option<(String, NaiveDate)>,
    destination: Option<String>,
    duration: Option<(String, u32)>,
    concept: Option<String>,
}

impl Gathered {
    fn absorb(&mut self, text: &str, today: NaiveDate) {
        if let Some(found) = find_date(text, today) {
            self.when = Some((found.text, found.date));
        }
        if let Some(found) = find_duration(text) {
            self.duration = Some((found.text, found.days));
        }
        if let Some(place) = destination(text) {
            self.destination = Some(place);
        }
        if let Some(concept) = concept(text) {
            self.concept = Some(concept);
        }
    }

    fn missing(&self) -> Vec<InfoField> {
        InfoField::ALL
            .into_iter()
            .filter(|field| match field {
                InfoField::When => self.when.is_none(),
                InfoField::Where => self.destination.is_none(),
                InfoField::Duration => self.duration.is_none(),
                InfoField::Concept => self.concept.is_none(),
            })
            .collect()
    }

    fn into_info(self) -> Option<TravelInfo> {
        let (when, start_date) = self.when?;
        let (duration, days) = self.duration?;
        Some(TravelInfo {
            when,
            destination: self.destination?,
            duration,
            concept: self.concept?,
            start_date: Some(start_date),
            days: Some(days),
        })
    }
}

fn destination(text: &str) -> Option<String> {
    let accept = |name: &str| {
        let name = name.trim();
        (!name.is_empty() && !NOT_PLACES.contains(&name)).then(|| name.to_string())
    };

    if let Some(re) = cached_regex(
        &DEST_PREPOSITION,
        r"\b(?:to|in|visit|visiting|around)\s+([A-Z][A-Za-z'-]+(?:\s+[A-Z][A-Za-z'-]+)*)",
    ) {
        if let Some(name) = re
            .captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .find_map(|m| accept(m.as_str()))
        {
            return Some(name);
        }
    }
    if let Some(re) = cached_regex(
        &DEST_SUFFIX,
        r"\b([A-Z][A-Za-z'-]+)\s+(?:trip|travel|tour|getaway|vacation|holiday)\b",
    ) {
        if let Some(name) = re
            .captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .find_map(|m| accept(m.as_str()))
        {
            return Some(name);
        }
    }
    // "제주도로 가요", then "제주 여행"
    [
        cached_regex(&DEST_KOREAN_PARTICLE, r"([가-힣]{2,}?)(?:으로|로)\s"),
        cached_regex(&DEST_KOREAN_TRIP, r"([가-힣]{2,})\s*여행"),
    ]
    .into_iter()
    .flatten()
    .find_map(|re| {
        re.captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str())
            .find(|name| !NOT_PLACES_KO.contains(name))
            .map(str::to_string)
    })
}

fn concept(text: &str) -> Option<String> {
    let lower = text.to_lowercase();
    CONCEPTS
        .iter()
        .find(|c| lower.contains(*c))
        .map(|c| c.to_string())
}

fn question_for(missing: &[InfoField]) -> String {
    missing
        .iter()
        .map(|field| field.prompt())
        .collect::<Vec<_>>()
        .join("\n")
}

pub struct InfoCollectionWorker {
    today: Option<NaiveDate>,
}

impl InfoCollectionWorker {
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
}

impl Default for InfoCollectionWorker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Worker for InfoCollectionWorker {
    fn id(&self) -> WorkerId {
        WorkerId::InfoCollection
    }

    async fn run(&self, directive: &str, snapshot: &Snapshot, _tools: &ToolBox) -> WorkerResult {
        let today = self.today();
        let mut gathered = Gathered::default();
        for text in facts::user_texts(snapshot) {
            gathered.absorb(text, today);
        }

        let missing = gathered.missing();
        debug!(directive, missing = ?missing, "Collected travel info");

        match gathered.into_info() {
            Some(info) => {
                let message = format!(
                    "Trip to {} starting {} for {} ({}).",
                    info.destination, info.when, info.duration, info.concept
                );
                WorkerResult::success(self.id(), Artifact::TravelInfo(info), message)
            }
            None => {
                let question = question_for(&missing);
                WorkerResult::success(
                    self.id(),
                    Artifact::ClarifyingQuestion(ClarifyingQuestion {
                        missing,
                        question: question.clone(),
                    }),
                    question,
                )
            }
        }
    }
}
