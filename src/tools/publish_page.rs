//! Page publishing tool

use crate::services::{share_url, PublishService};
use crate::tool::{parameters_for, Tool, ToolContext, ToolDefinition, ToolFailure, ToolResult};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Deserialize, JsonSchema)]
struct Args {
    /// Page title
    title: String,
    /// Page body (markdown)
    content: String,
}

/// Output of `publish_page`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishedPage {
    pub page_id: String,
    pub url: String,
}

pub struct PublishPageTool {
    service: Arc<dyn PublishService>,
}

impl PublishPageTool {
    pub fn new(service: Arc<dyn PublishService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Tool for PublishPageTool {
    fn name(&self) -> &str {
        super::PUBLISH_PAGE
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: super::PUBLISH_PAGE.to_string(),
            description: "Publish a page. Returns {page_id, url}.".to_string(),
            parameters: parameters_for::<Args>(),
        }
    }

    async fn execute(&self, args: serde_json::Value, ctx: &ToolContext) -> ToolResult {
        if ctx.is_cancelled() {
            return ToolResult::failure(ToolFailure::Cancelled, "Cancelled");
        }

        let args: Args = match serde_json::from_value(args) {
            Ok(a) => a,
            Err(e) => return ToolResult::invalid_arguments(e),
        };

        match self.service.create_page(&args.title, &args.content).await {
            Ok(Some(page_id)) => ToolResult::json(&PublishedPage {
                url: share_url(&page_id),
                page_id,
            }),
            Ok(None) => ToolResult::error("Page creation returned no page id"),
            Err(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use serde_json::json;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    struct Publisher(Option<&'static str>);

    #[async_trait]
    impl PublishService for Publisher {
        async fn create_page(&self, _t: &str, _c: &str) -> Result<Option<String>, ServiceError> {
            Ok(self.0.map(String::from))
        }
    }

    fn ctx() -> ToolContext {
        ToolContext::new(CancellationToken::new(), Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_publish_returns_url() {
        let tool = PublishPageTool::new(Arc::new(Publisher(Some("ab-cd"))));
        let page: PublishedPage = tool
            .execute(json!({"title": "t", "content": "c"}), &ctx())
            .await
            .parse()
            .unwrap();
        assert_eq!(page.url, "https://www.notion.so/abcd");
    }

    #[tokio::test]
    async fn test_missing_page_id_is_an_error() {
        let tool = PublishPageTool::new(Arc::new(Publisher(None)));
        let result = tool.execute(json!({"title": "t", "content": "c"}), &ctx()).await;
        assert_eq!(result.failure, Some(ToolFailure::Upstream));
    }
}
