//! Share worker: publishes the final itinerary as a page

use super::failed_call;
use crate::agent::{ErrorCode, Worker, WorkerId, WorkerResult};
use crate::artifact::{Artifact, FinalItinerary, ShareLink};
use crate::facts;
use crate::state::Snapshot;
use crate::tool::ToolBox;
use crate::tools::{PublishedPage, PUBLISH_PAGE};
use async_trait::async_trait;
use serde_json::json;

/// "<destination> travel plan - <date>"
pub fn page_title(plan: &FinalItinerary) -> String {
    let when = plan
        .info
        .start_date
        .map(|d| d.to_string())
        .unwrap_or_else(|| plan.info.when.clone());
    format!("{} travel plan - {}", plan.info.destination, when)
}

/// Markdown body of the shared page
pub fn page_body(plan: &FinalItinerary) -> String {
    let info = &plan.info;
    let mut body = format!(
        "## Overview\n\n- Where: {}\n- When: {}\n- Duration: {}\n- Concept: {}\n",
        info.destination, info.when, info.duration, info.concept
    );

    if !plan.days.is_empty() {
        body.push_str("\n## Itinerary\n");
        for day in &plan.days {
            match day.date {
                Some(date) => body.push_str(&format!("\n### Day {} ({})\n\n", day.day, date)),
                None => body.push_str(&format!("\n### Day {}\n\n", day.day)),
            }
            for activity in &day.activities {
                body.push_str(&format!("- {}\n", activity));
            }
        }
    }

    let located: Vec<_> = plan.places.iter().filter(|p| !p.address.is_empty()).collect();
    if !located.is_empty() {
        body.push_str("\n## Places\n\n");
        for place in located {
            body.push_str(&format!("- **{}**: {}", place.name, place.address));
            if let Some(phone) = &place.phone {
                body.push_str(&format!(", {}", phone));
            }
            body.push('\n');
        }
    }

    if plan.days.is_empty() {
        body.push_str("\n## Plan\n\n");
        body.push_str(&plan.text);
        body.push('\n');
    }
    body
}

#[derive(Default)]
pub struct ShareWorker;

impl ShareWorker {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Worker for ShareWorker {
    fn id(&self) -> WorkerId {
        WorkerId::Share
    }

    async fn run(&self, _directive: &str, snapshot: &Snapshot, tools: &ToolBox) -> WorkerResult {
        let Some(plan) = facts::final_plan(snapshot).map(|f| f.value) else {
            return WorkerResult::failure(
                self.id(),
                ErrorCode::NoFinalPlan,
                "There is no finished plan to share yet.",
            );
        };

        let title = page_title(plan);
        let result = tools
            .call(PUBLISH_PAGE, json!({"title": title, "content": page_body(plan)}))
            .await;
        if result.is_error {
            return failed_call(self.id(), PUBLISH_PAGE, &result);
        }
        let Some(page) = result.parse::<PublishedPage>() else {
            return WorkerResult::failure(
                self.id(),
                ErrorCode::UpstreamError,
                "The page service returned no page.",
            );
        };

        let message = format!("Shared '{}': {}", title, page.url);
        WorkerResult::success(
            self.id(),
            Artifact::ShareLink(ShareLink {
                page_id: page.page_id,
                url: page.url,
                title,
            }),
            message,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{final_turns, toolbox_with, FakeServices, LogBuilder};

    #[tokio::test]
    async fn test_share_publishes_final_plan() {
        let services = FakeServices::new();
        let tools = toolbox_with(&services, WorkerId::Share);
        let mut log = final_turns();
        log.user("share it to notion");

        let result = ShareWorker::new().run("", &log.snapshot(), &tools).await;
        assert!(result.is_success(), "{}", result.message());
        match result.artifact() {
            Some(Artifact::ShareLink(link)) => {
                assert_eq!(link.title, "Seoul travel plan - 2025-05-03");
                assert!(link.url.starts_with("https://www.notion.so/"));
                assert!(!link.url.contains('-'));
            }
            other => panic!("unexpected artifact {:?}", other),
        }

        let pages = services.pages();
        assert_eq!(pages.len(), 1);
        assert!(pages[0].1.contains("### Day 1 (2025-05-03)"));
    }

    #[tokio::test]
    async fn test_share_without_plan() {
        let services = FakeServices::new();
        let tools = toolbox_with(&services, WorkerId::Share);
        let mut log = LogBuilder::new();
        log.user("share it");

        let result = ShareWorker::new().run("", &log.snapshot(), &tools).await;
        assert_eq!(result.error_code(), Some(ErrorCode::NoFinalPlan));
        assert!(services.pages().is_empty());
    }

    #[tokio::test]
    async fn test_share_without_page_is_upstream_error() {
        let services = FakeServices::new().with_silent_publisher();
        let tools = toolbox_with(&services, WorkerId::Share);
        let log = final_turns();

        let result = ShareWorker::new().run("", &log.snapshot(), &tools).await;
        assert_eq!(result.error_code(), Some(ErrorCode::UpstreamError));
    }
}
