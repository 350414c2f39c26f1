//! LLM Provider layer
//!
//! The router and the planner only see `ChatModel`. `ProviderClient` is the
//! OpenAI-compatible implementation.

mod client;
mod config;

pub use client::*;
pub use config::*;

use crate::error::ProviderError;
use async_trait::async_trait;

/// A single-shot chat completion
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub system: String,
    pub user: String,
    /// Ask the provider for a JSON object response
    pub json: bool,
}

impl ChatRequest {
    pub fn text(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            json: false,
        }
    }

    pub fn json(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            json: true,
            ..Self::text(system, user)
        }
    }
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, request: &ChatRequest) -> Result<String, ProviderError>;
}
