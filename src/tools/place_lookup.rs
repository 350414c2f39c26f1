//! Place detail lookup tool

use crate::services::PlaceLookup;
use crate::tool::{parameters_for, Tool, ToolContext, ToolDefinition, ToolFailure, ToolResult};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize, JsonSchema)]
struct Args {
    /// The exact place name, with no extra words
    query: String,
    /// Maximum results (default: 3)
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    3
}

pub struct PlaceLookupTool {
    service: Arc<dyn PlaceLookup>,
}

impl PlaceLookupTool {
    pub fn new(service: Arc<dyn PlaceLookup>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Tool for PlaceLookupTool {
    fn name(&self) -> &str {
        super::PLACE_LOOKUP
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: super::PLACE_LOOKUP.to_string(),
            description: "Look up a place by its exact name. Returns a JSON array of places \
                          with address, phone, category, url and coordinates."
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

        match self.service.lookup(args.query.trim(), args.limit).await {
            Ok(places) => ToolResult::json(&places),
            Err(e) => e.into(),
        }
    }
}
