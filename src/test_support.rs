//! Shared test fixtures: canned artifacts, fake collaborators, scripted
//! routers, models and workers

use crate::agent::{
    CapabilityRegistry, ErrorCode, Worker, WorkerId, WorkerResult, WorkerSet,
};
use crate::artifact::{
    Artifact, ClarifyingQuestion, DayPlan, FinalItinerary, InfoField, ItineraryDraft,
    LocationDetails, SearchHits, TravelInfo,
};
use crate::error::{ProviderError, ServiceError};
use crate::provider::{ChatModel, ChatRequest};
use crate::services::{
    CalendarBackend, CalendarEvent, LocalCalendar, Place, PlaceLookup, PublishService,
    RefreshingCalendar, SearchService, Services, WebHit,
};
use crate::state::{Conversation, NewTurn, Snapshot, Turn};
use crate::supervisor::{RoutingDecision, RoutingPolicy};
use crate::tool::{ToolBox, ToolContext};
use crate::tools::create_registry;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

// === Conversation logs ===

/// Builds a conversation turn by turn
#[derive(Default)]
pub struct LogBuilder {
    conversation: Conversation,
}

impl LogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user(&mut self, text: impl Into<String>) -> &mut Self {
        self.conversation.append(NewTurn::user(text)).unwrap();
        self
    }

    pub fn result(&mut self, result: WorkerResult) -> &mut Self {
        self.conversation.append(NewTurn::agent(result)).unwrap();
        self
    }

    pub fn turns(&self) -> &[Turn] {
        self.conversation.turns()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.conversation.snapshot()
    }
}

// === Artifacts ===

pub fn date(month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, month, day).unwrap()
}

/// Seoul, May 3 2025, two days, food tour
pub fn travel_info() -> TravelInfo {
    TravelInfo {
        when: "May 3".into(),
        destination: "Seoul".into(),
        duration: "2 days".into(),
        concept: "food tour".into(),
        start_date: Some(date(5, 3)),
        days: Some(2),
    }
}

pub fn info() -> WorkerResult {
    WorkerResult::success(
        WorkerId::InfoCollection,
        Artifact::TravelInfo(travel_info()),
        "Trip to Seoul starting May 3 for 2 days (food tour).",
    )
}

pub fn question() -> WorkerResult {
    let missing = vec![InfoField::When, InfoField::Concept];
    let question = missing
        .iter()
        .map(|f| f.prompt())
        .collect::<Vec<_>>()
        .join("\n");
    WorkerResult::success(
        WorkerId::InfoCollection,
        Artifact::ClarifyingQuestion(ClarifyingQuestion {
            missing,
            question: question.clone(),
        }),
        question,
    )
}

const PLACES: [&str; 3] = ["Gyeongbokgung Palace", "Gwangjang Market", "Myeongdong Street Food"];

pub fn web_hits() -> Vec<WebHit> {
    vec![
        WebHit {
            title: "Gyeongbokgung Palace - Visit Seoul".into(),
            url: "https://example.com/gyeongbokgung".into(),
            description: "Joseon palace in central Seoul".into(),
        },
        WebHit {
            title: "Gwangjang Market | Seoul food guide".into(),
            url: "https://example.com/gwangjang".into(),
            description: "Bindaetteok and mayak gimbap".into(),
        },
        WebHit {
            title: "Myeongdong Street Food: what to eat".into(),
            url: "https://example.com/myeongdong".into(),
            description: "Evening street stalls".into(),
        },
    ]
}

pub fn hits() -> WorkerResult {
    let query = travel_info().search_query();
    WorkerResult::success(
        WorkerId::Search,
        Artifact::SearchHits(SearchHits {
            query: query.clone(),
            hits: web_hits(),
        }),
        format!("Found 3 results for '{}'.", query),
    )
}

fn days(activities: [&[&str]; 2]) -> Vec<DayPlan> {
    activities
        .iter()
        .enumerate()
        .map(|(i, names)| DayPlan {
            day: i as u32 + 1,
            date: Some(date(5, 3 + i as u32)),
            activities: names.iter().map(|n| n.to_string()).collect(),
        })
        .collect()
}

pub fn draft_result() -> WorkerResult {
    let text = "Seoul itinerary, 2 days (food tour), starting May 3\n\n\
                Day 1 (2025-05-03):\n- Gyeongbokgung Palace\n- Gwangjang Market\n\n\
                Day 2 (2025-05-04):\n- Myeongdong Street Food";
    WorkerResult::success(
        WorkerId::Planner,
        Artifact::ItineraryDraft(ItineraryDraft {
            info: travel_info(),
            days: days([&PLACES[..2], &PLACES[2..]]),
            places: PLACES.iter().map(|p| p.to_string()).collect(),
            text: text.to_string(),
        }),
        text,
    )
}

pub fn place(name: &str) -> Place {
    Place {
        name: name.to_string(),
        address: format!("{} road, Jongno-gu, Seoul", name),
        phone: Some("02-000-0000".into()),
        category: Some("attraction".into()),
        url: None,
        x: Some(126.97),
        y: Some(37.57),
    }
}

pub fn details() -> WorkerResult {
    WorkerResult::success(
        WorkerId::Search,
        Artifact::LocationDetails(LocationDetails {
            places: PLACES.iter().map(|p| place(p)).collect(),
        }),
        "Found details for 3 places.",
    )
}

/// A final plan with no day list, for calendar edge cases
pub fn final_plan_result(info: TravelInfo, text: &str) -> WorkerResult {
    WorkerResult::success(
        WorkerId::Planner,
        Artifact::FinalItinerary(FinalItinerary {
            info,
            days: Vec::new(),
            places: Vec::new(),
            text: text.to_string(),
        }),
        text,
    )
}

pub fn final_result() -> WorkerResult {
    let text = "Seoul itinerary, 2 days (food tour), starting May 3\n\n\
                Day 1 (2025-05-03):\n- Gyeongbokgung Palace (Gyeongbokgung Palace road, Jongno-gu, Seoul)";
    WorkerResult::success(
        WorkerId::Planner,
        Artifact::FinalItinerary(FinalItinerary {
            info: travel_info(),
            days: days([&PLACES[..2], &PLACES[2..]]),
            places: PLACES.iter().map(|p| place(p)).collect(),
            text: text.to_string(),
        }),
        text,
    )
}

/// A full planning conversation ending in a final plan
pub fn final_turns() -> LogBuilder {
    let mut log = LogBuilder::new();
    log.user("plan a 2-day Seoul food tour from May 3");
    log.result(info());
    log.result(hits());
    log.result(draft_result());
    log.result(details());
    log.result(final_result());
    log
}

// === Fake collaborators ===

struct FakeSearch {
    queries: Arc<Mutex<Vec<String>>>,
    no_hits: bool,
    failing: bool,
}

#[async_trait]
impl SearchService for FakeSearch {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<WebHit>, ServiceError> {
        self.queries.lock().push(query.to_string());
        if self.failing {
            return Err(ServiceError::Upstream("search backend down".into()));
        }
        if self.no_hits {
            return Ok(Vec::new());
        }
        Ok(web_hits().into_iter().take(limit).collect())
    }
}

struct FakePlaces {
    queries: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl PlaceLookup for FakePlaces {
    async fn lookup(&self, query: &str, _limit: usize) -> Result<Vec<Place>, ServiceError> {
        self.queries.lock().push(query.to_string());
        Ok(vec![place(query)])
    }
}

/// Rejects every call, even after a refresh
struct ExpiredCalendar;

#[async_trait]
impl CalendarBackend for ExpiredCalendar {
    async fn create(&self, _event: &CalendarEvent) -> Result<String, ServiceError> {
        Err(ServiceError::Unauthorized("token expired".into()))
    }

    async fn update(&self, _id: &str, _event: &CalendarEvent) -> Result<(), ServiceError> {
        Err(ServiceError::Unauthorized("token expired".into()))
    }

    async fn delete(&self, _id: &str) -> Result<(), ServiceError> {
        Err(ServiceError::Unauthorized("token expired".into()))
    }

    async fn search(&self, _query: &str, _past: bool) -> Result<Vec<CalendarEvent>, ServiceError> {
        Err(ServiceError::Unauthorized("token expired".into()))
    }

    async fn list_in_range(
        &self,
        _from: NaiveDateTime,
        _to: NaiveDateTime,
    ) -> Result<Vec<CalendarEvent>, ServiceError> {
        Err(ServiceError::Unauthorized("token expired".into()))
    }

    async fn refresh_credentials(&self) -> Result<(), ServiceError> {
        Ok(())
    }
}

struct FakePublisher {
    pages: Arc<Mutex<Vec<(String, String)>>>,
    silent: bool,
}

#[async_trait]
impl PublishService for FakePublisher {
    async fn create_page(&self, title: &str, content: &str) -> Result<Option<String>, ServiceError> {
        if self.silent {
            return Ok(None);
        }
        let mut pages = self.pages.lock();
        pages.push((title.to_string(), content.to_string()));
        Ok(Some(format!("1a2b3c4d-0000-4000-8000-00000000000{}", pages.len())))
    }
}

/// Recording fakes for every collaborator
pub struct FakeServices {
    pub calendar: Arc<LocalCalendar>,
    searches: Arc<Mutex<Vec<String>>>,
    lookups: Arc<Mutex<Vec<String>>>,
    pages: Arc<Mutex<Vec<(String, String)>>>,
    no_hits: bool,
    failing_search: bool,
    expired_calendar: bool,
    silent_publisher: bool,
}

impl FakeServices {
    pub fn new() -> Self {
        let now = date(1, 10).and_hms_opt(9, 0, 0).unwrap();
        Self {
            calendar: Arc::new(LocalCalendar::new().with_now(now)),
            searches: Arc::default(),
            lookups: Arc::default(),
            pages: Arc::default(),
            no_hits: false,
            failing_search: false,
            expired_calendar: false,
            silent_publisher: false,
        }
    }

    pub fn with_no_hits(mut self) -> Self {
        self.no_hits = true;
        self
    }

    pub fn with_failing_search(mut self) -> Self {
        self.failing_search = true;
        self
    }

    pub fn with_expired_calendar(mut self) -> Self {
        self.expired_calendar = true;
        self
    }

    pub fn with_silent_publisher(mut self) -> Self {
        self.silent_publisher = true;
        self
    }

    pub fn services(&self) -> Services {
        let calendar: Arc<dyn CalendarBackend> = if self.expired_calendar {
            Arc::new(RefreshingCalendar::new(ExpiredCalendar))
        } else {
            self.calendar.clone()
        };
        Services {
            search: Arc::new(FakeSearch {
                queries: self.searches.clone(),
                no_hits: self.no_hits,
                failing: self.failing_search,
            }),
            places: Arc::new(FakePlaces {
                queries: self.lookups.clone(),
            }),
            calendar,
            publisher: Arc::new(FakePublisher {
                pages: self.pages.clone(),
                silent: self.silent_publisher,
            }),
        }
    }

    pub fn search_queries(&self) -> Vec<String> {
        self.searches.lock().clone()
    }

    pub fn place_queries(&self) -> Vec<String> {
        self.lookups.lock().clone()
    }

    /// Published (title, content) pairs
    pub fn pages(&self) -> Vec<(String, String)> {
        self.pages.lock().clone()
    }
}

/// A toolbox granting `worker`'s built-in tools over `services`
pub fn toolbox_with(services: &FakeServices, worker: WorkerId) -> ToolBox {
    toolbox_over(services.services(), worker)
}

/// A toolbox whose collaborators are all unconfigured
pub fn empty_toolbox(worker: WorkerId) -> ToolBox {
    toolbox_over(Services::unconfigured(), worker)
}

fn toolbox_over(services: Services, worker: WorkerId) -> ToolBox {
    let granted = CapabilityRegistry::builtin()
        .resolve(worker)
        .unwrap()
        .tools
        .clone();
    ToolBox::new(
        worker,
        Arc::new(create_registry(&services)),
        granted,
        ToolContext::new(CancellationToken::new(), Duration::from_secs(5)),
    )
}

// === Scripted collaborators for the supervisor ===

/// Returns scripted decisions in order, then `then` forever
pub struct ScriptedRouter {
    script: Mutex<VecDeque<RoutingDecision>>,
    then: RoutingDecision,
}

impl ScriptedRouter {
    /// Script, then finish
    pub fn new(script: Vec<RoutingDecision>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            then: RoutingDecision::finish(),
        }
    }

    pub fn always(decision: RoutingDecision) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            then: decision,
        }
    }
}

#[async_trait]
impl RoutingPolicy for ScriptedRouter {
    async fn decide(&self, _snapshot: &Snapshot) -> RoutingDecision {
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.then.clone())
    }
}

/// A chat model with a fixed reply
pub struct ScriptedModel {
    reply: Option<String>,
    delay: Duration,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedModel {
    pub fn replying(reply: &str) -> Arc<Self> {
        Self::slow(reply, Duration::ZERO)
    }

    pub fn slow(reply: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            reply: Some(reply.to_string()),
            delay,
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Every call fails with a transport error
    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            reply: None,
            delay: Duration::ZERO,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, request: &ChatRequest) -> Result<String, ProviderError> {
        self.requests.lock().push(request.clone());
        tokio::time::sleep(self.delay).await;
        self.reply
            .clone()
            .ok_or_else(|| ProviderError::Api("connection reset".into()))
    }
}

/// A worker that replays canned results
pub struct StubWorker {
    id: WorkerId,
    script: Mutex<VecDeque<WorkerResult>>,
    repeat: Option<WorkerResult>,
    delay: Mutex<Duration>,
    calls: AtomicUsize,
}

impl StubWorker {
    /// Returns `results` in order, then fails
    pub fn scripted(id: WorkerId, results: Vec<WorkerResult>) -> Arc<Self> {
        Arc::new(Self {
            id,
            script: Mutex::new(results.into()),
            repeat: None,
            delay: Mutex::new(Duration::ZERO),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn repeating(id: WorkerId, result: WorkerResult) -> Arc<Self> {
        Arc::new(Self {
            id,
            script: Mutex::new(VecDeque::new()),
            repeat: Some(result),
            delay: Mutex::new(Duration::ZERO),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn with_delay(self: Arc<Self>, delay: Duration) -> Arc<Self> {
        *self.delay.lock() = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Worker for StubWorker {
    fn id(&self) -> WorkerId {
        self.id
    }

    async fn run(&self, _directive: &str, _snapshot: &Snapshot, _tools: &ToolBox) -> WorkerResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock();
        tokio::time::sleep(delay).await;

        let next = self.script.lock().pop_front();
        next.or_else(|| self.repeat.clone()).unwrap_or_else(|| {
            WorkerResult::failure(self.id, ErrorCode::UpstreamError, "script exhausted")
        })
    }
}

/// A worker set of stubs: `stubs` plus a failing stub for every other id
pub fn stub_workers(stubs: Vec<Arc<StubWorker>>) -> WorkerSet {
    let mut workers = WorkerSet::new();
    for id in WorkerId::ALL {
        let fallback = WorkerResult::failure(id, ErrorCode::UpstreamError, "not scripted");
        workers.insert(id, StubWorker::repeating(id, fallback));
    }
    for stub in stubs {
        workers.insert(stub.id, stub);
    }
    workers
}
