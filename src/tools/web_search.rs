//! Web search tool

use crate::services::SearchService;
use crate::tool::{parameters_for, Tool, ToolContext, ToolDefinition, ToolFailure, ToolResult};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize, JsonSchema)]
struct Args {
    /// The search query
    query: String,
    /// Maximum results (default: 5)
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    5
}

pub struct WebSearchTool {
    service: Arc<dyn SearchService>,
}

impl WebSearchTool {
    pub fn new(service: Arc<dyn SearchService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        super::WEB_SEARCH
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: super::WEB_SEARCH.to_string(),
            description: "Search the web for travel information. Returns a JSON array of \
                          {title, url, description}."
                .to_string(),
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
        if args.query.trim().is_empty() {
            return ToolResult::invalid_arguments("query is empty");
        }

        match self.service.search(args.query.trim(), args.limit).await {
            Ok(hits) => ToolResult::json(&hits),
            Err(e) => e.into(),
        }
    }
}
