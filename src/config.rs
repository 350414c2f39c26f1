//! Configuration for the travel planner

use crate::auth::AuthConfig;
use crate::error::{ConfigError, ProviderError};
use crate::provider::{ChatModel, ProviderClient, ProviderConfig};
use crate::services::{KakaoPlaces, LocalCalendar, NotionPublisher, SearxSearch, Services};
use crate::supervisor::{DEFAULT_MAX_ITERATIONS, DEFAULT_TOOL_TIMEOUT};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Main configuration for the planner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// LLM provider configuration
    pub llm: LlmConfig,

    /// Run loop limits
    pub orchestrator: OrchestratorConfig,

    /// External collaborators
    pub services: ServicesConfig,

    /// Telemetry settings
    pub telemetry: TelemetryConfig,

    /// Directory searched for `.trip/workers/*.yaml` overrides
    pub working_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider type (openrouter, openai, custom)
    pub provider: LlmProvider,

    /// API key (can also be set via environment variable)
    pub api_key: Option<String>,

    /// Base URL for the API (for custom endpoints like LM Studio)
    pub base_url: Option<String>,

    /// Model name/ID
    pub model: String,

    /// Maximum tokens for response
    pub max_tokens: Option<u32>,

    /// Temperature for sampling
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LlmProvider {
    #[default]
    OpenRouter,
    OpenAI,
    /// Custom OpenAI-compatible endpoint (e.g., LM Studio, vLLM)
    Custom,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmProvider::OpenRouter => "openrouter",
            LlmProvider::OpenAI => "openai",
            LlmProvider::Custom => "custom",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Worker dispatches allowed per submit
    pub max_iterations: u32,

    pub tool_timeout_secs: u64,

    pub routing_timeout_secs: u64,

    /// Route with rules only; no model calls at all
    pub offline: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServicesConfig {
    pub searxng_url: Option<String>,
    pub kakao_api_key: Option<String>,
    pub notion_api_key: Option<String>,
    pub notion_database_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Directory for log files
    pub log_dir: PathBuf,

    /// Enable verbose logging
    pub verbose: bool,

    /// OTLP HTTP endpoint for span export
    pub otel_endpoint: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            services: ServicesConfig::default(),
            working_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::OpenRouter,
            api_key: None,
            base_url: None,
            model: "openai/gpt-4o-mini".to_string(),
            max_tokens: Some(2048),
            temperature: Some(0.2),
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            tool_timeout_secs: DEFAULT_TOOL_TIMEOUT.as_secs(),
            routing_timeout_secs: 60,
            offline: false,
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from(".trip_logs"),
            verbose: false,
            otel_endpoint: None,
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Defaults plus service settings and keys from the environment
    /// (after loading `.env`)
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        let auth = AuthConfig::load().unwrap_or_default();

        let mut config = Self::default();
        config.services = ServicesConfig {
            searxng_url: env_var("SEARXNG_URL"),
            kakao_api_key: env_var("KAKAO_REST_API_KEY")
                .or_else(|| auth.api_key("kakao").map(String::from)),
            notion_api_key: env_var("NOTION_API_KEY")
                .or_else(|| auth.api_key("notion").map(String::from)),
            notion_database_id: env_var("NOTION_DATABASE_ID"),
        };
        if let Some(model) = env_var("TRIP_MODEL") {
            config.llm.model = model;
        }
        config
    }

    /// Create config for a local OpenAI-compatible server
    pub fn lm_studio(mut self, base_url: &str, model: &str) -> Self {
        self.llm = LlmConfig {
            provider: LlmProvider::Custom,
            api_key: Some("lm-studio".to_string()),
            base_url: Some(base_url.to_string()),
            model: model.to_string(),
            ..LlmConfig::default()
        };
        self
    }

    /// Set verbose logging
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.telemetry.verbose = verbose;
        self
    }

    /// Set log directory
    pub fn with_log_dir(mut self, log_dir: PathBuf) -> Self {
        self.telemetry.log_dir = log_dir;
        self
    }

    pub fn with_otel_endpoint(mut self, endpoint: Option<String>) -> Self {
        self.telemetry.otel_endpoint = endpoint;
        self
    }

    /// Set API key
    pub fn with_api_key(mut self, api_key: String) -> Self {
        self.llm.api_key = Some(api_key);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.llm.model = model.into();
        self
    }

    /// A base URL makes the provider a custom endpoint
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.llm.base_url = Some(base_url.into());
        self.llm.provider = LlmProvider::Custom;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.orchestrator.max_iterations = max_iterations;
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.orchestrator.tool_timeout_secs = timeout.as_secs();
        self
    }

    pub fn with_offline(mut self, offline: bool) -> Self {
        self.orchestrator.offline = offline;
        self
    }

    pub fn with_searxng_url(mut self, url: impl Into<String>) -> Self {
        self.services.searxng_url = Some(url.into());
        self
    }

    pub fn with_working_dir(mut self, working_dir: PathBuf) -> Self {
        self.working_dir = working_dir;
        self
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.orchestrator.tool_timeout_secs)
    }

    pub fn routing_timeout(&self) -> Duration {
        Duration::from_secs(self.orchestrator.routing_timeout_secs)
    }

    /// Reject settings the run loop cannot honour
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &str, message: &str| ConfigError::Invalid {
            key: key.to_string(),
            message: message.to_string(),
        };
        if self.orchestrator.max_iterations == 0 {
            return Err(invalid("max_iterations", "must be at least 1"));
        }
        if self.orchestrator.tool_timeout_secs == 0 {
            return Err(invalid("tool_timeout", "must be at least 1 second"));
        }
        if self.orchestrator.routing_timeout_secs == 0 {
            return Err(invalid("routing_timeout", "must be at least 1 second"));
        }
        if self.services.notion_api_key.is_some() != self.services.notion_database_id.is_some() {
            return Err(invalid(
                "notion",
                "NOTION_API_KEY and NOTION_DATABASE_ID must be set together",
            ));
        }
        Ok(())
    }

    pub fn provider_config(&self) -> ProviderConfig {
        match (self.llm.provider, &self.llm.base_url) {
            (_, Some(base_url)) => {
                ProviderConfig::custom("custom", base_url, "LLM_API_KEY", &self.llm.model)
            }
            (LlmProvider::OpenAI, None) => ProviderConfig::openai(),
            _ => ProviderConfig::openrouter(),
        }
    }

    /// The chat model for routing and planner prose; `None` when offline
    pub fn chat_model(&self) -> Result<Option<Arc<dyn ChatModel>>, ProviderError> {
        if self.orchestrator.offline {
            debug!("Offline mode, no chat model");
            return Ok(None);
        }
        let provider = self.provider_config();
        let client = match &self.llm.api_key {
            Some(key) => ProviderClient::with_api_key(provider, key.clone()),
            None => ProviderClient::new(provider)?,
        }
        .with_model(&self.llm.model)
        .with_sampling(self.llm.temperature, self.llm.max_tokens);
        info!(model = client.model(), provider = %client.config().name, "Chat model configured");
        Ok(Some(Arc::new(client)))
    }

    /// Concrete collaborators for whatever is configured. Anything missing
    /// stays `Unconfigured`; the calendar is always the in-process one.
    pub fn build_services(&self) -> Services {
        let mut services = Services::unconfigured().with_calendar(LocalCalendar::new());
        if let Some(url) = &self.services.searxng_url {
            services = services.with_search(SearxSearch::with_url(url));
        }
        if let Some(key) = &self.services.kakao_api_key {
            services = services.with_places(KakaoPlaces::new(key.clone()));
        }
        if let (Some(key), Some(database)) = (
            &self.services.notion_api_key,
            &self.services.notion_database_id,
        ) {
            services = services.with_publisher(NotionPublisher::new(key.clone(), database.clone()));
        }
        services
    }

    /// Create config from a provider name in auth.json
    ///
    /// Looks up the provider in auth.json and uses its API key and base_url.
    pub fn from_provider(provider: &str, model: &str) -> Result<Self, ConfigError> {
        let auth = AuthConfig::load()?;
        let entry = auth.get(provider).ok_or_else(|| ConfigError::Invalid {
            key: "provider".to_string(),
            message: format!("'{}' not found in auth.json", provider),
        })?;

        let llm_provider = match (entry.base_url(), provider.to_lowercase().as_str()) {
            (Some(_), _) => LlmProvider::Custom,
            (None, "openrouter") => LlmProvider::OpenRouter,
            (None, "openai") => LlmProvider::OpenAI,
            _ => LlmProvider::Custom,
        };

        let mut config = Self::from_env();
        config.llm = LlmConfig {
            provider: llm_provider,
            api_key: Some(entry.api_key().to_string()),
            base_url: entry.base_url().map(String::from),
            model: model.to_string(),
            ..LlmConfig::default()
        };
        Ok(config)
    }

    /// List available providers from auth.json
    pub fn list_providers() -> Result<Vec<String>, ConfigError> {
        let auth = AuthConfig::load()?;
        Ok(auth.providers().cloned().collect())
    }
}
