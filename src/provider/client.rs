//! OpenAI-compatible provider client

use super::{ChatModel, ChatRequest, ProviderConfig};
use crate::auth::AuthConfig;
use crate::error::ProviderError;
use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs, ResponseFormat,
    },
    Client,
};
use async_trait::async_trait;
use std::time::Instant;

/// OpenAI-compatible client wrapper
#[derive(Clone)]
pub struct ProviderClient {
    config: ProviderConfig,
    client: Client<OpenAIConfig>,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl ProviderClient {
    /// Create a client, reading the API key from the environment or auth.json
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        let api_key = Self::get_api_key(&config)?;
        Ok(Self::with_api_key(config, api_key))
    }

    pub fn with_api_key(config: ProviderConfig, api_key: impl Into<String>) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(api_key.into())
            .with_api_base(&config.base_url);

        Self {
            model: config.default_model.clone(),
            client: Client::with_config(openai_config),
            config,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_sampling(mut self, temperature: Option<f32>, max_tokens: Option<u32>) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    /// Get API key from environment or XDG auth.json
    fn get_api_key(config: &ProviderConfig) -> Result<String, ProviderError> {
        let _ = dotenvy::dotenv();

        if let Ok(key) = std::env::var(&config.api_key_env) {
            return Ok(key);
        }

        AuthConfig::load()
            .ok()
            .and_then(|auth| auth.api_key(&config.name.to_lowercase()).map(String::from))
            .ok_or_else(|| ProviderError::MissingApiKey(config.api_key_env.clone()))
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn messages(request: &ChatRequest) -> Result<Vec<ChatCompletionRequestMessage>, ProviderError> {
        let system = ChatCompletionRequestSystemMessageArgs::default()
            .content(request.system.as_str())
            .build()
            .map_err(|e| ProviderError::Request(e.to_string()))?;
        let user = ChatCompletionRequestUserMessageArgs::default()
            .content(request.user.as_str())
            .build()
            .map_err(|e| ProviderError::Request(e.to_string()))?;
        Ok(vec![system.into(), user.into()])
    }
}

#[async_trait]
impl ChatModel for ProviderClient {
    async fn complete(&self, request: &ChatRequest) -> Result<String, ProviderError> {
        let mut builder = CreateChatCompletionRequestArgs::default();
        builder.model(&self.model).messages(Self::messages(request)?);
        if let Some(temperature) = self.temperature {
            builder.temperature(temperature);
        }
        if let Some(max_tokens) = self.max_tokens {
            builder.max_completion_tokens(max_tokens);
        }
        if request.json {
            builder.response_format(ResponseFormat::JsonObject);
        }
        let body = builder
            .build()
            .map_err(|e| ProviderError::Request(e.to_string()))?;

        let start = Instant::now();
        tracing::info!(
            target: "llm",
            model = %self.model,
            json = request.json,
            "Starting LLM call"
        );

        let response = self.client.chat().create(body).await.map_err(|e| {
            tracing::error!(target: "llm", error = %e, "LLM call failed");
            ProviderError::Api(e.to_string())
        })?;

        let usage = response.usage.as_ref();
        tracing::info!(
            target: "llm",
            model = %self.model,
            elapsed_ms = start.elapsed().as_millis() as u64,
            input_tokens = usage.map(|u| u.prompt_tokens),
            output_tokens = usage.map(|u| u.completion_tokens),
            "LLM call completed"
        );

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(ProviderError::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_override() {
        let client = ProviderClient::with_api_key(ProviderConfig::openai(), "sk-test")
            .with_model("gpt-4o");
        assert_eq!(client.model(), "gpt-4o");
        assert_eq!(client.config().name, "OpenAI");
    }

    #[test]
    fn test_messages_are_system_then_user() {
        let messages = ProviderClient::messages(&ChatRequest::text("sys", "hi")).unwrap();
        assert!(matches!(messages[0], ChatCompletionRequestMessage::System(_)));
        assert!(matches!(messages[1], ChatCompletionRequestMessage::User(_)));
    }
}
