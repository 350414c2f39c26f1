//! Page publishing via the Notion API

use super::PublishService;
use crate::error::ServiceError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

const NOTION_API_BASE: &str = "https://api.notion.com/v1";
const NOTION_VERSION: &str = "2022-06-28";
// Notion caps a rich text object at 2000 characters
const MAX_TEXT_CHARS: usize = 2000;

/// Public URL of a page
pub fn share_url(page_id: &str) -> String {
    format!("https://www.notion.so/{}", page_id.replace('-', ""))
}

pub struct NotionPublisher {
    client: Client,
    api_key: String,
    database_id: String,
    title_property: String,
    base_url: String,
}

impl NotionPublisher {
    pub fn new(api_key: impl Into<String>, database_id: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            database_id: database_id.into(),
            title_property: "Name".to_string(),
            base_url: NOTION_API_BASE.to_string(),
        }
    }

    /// Reads NOTION_API_KEY and NOTION_DATABASE_ID (after loading `.env`)
    pub fn from_env() -> Option<Self> {
        let _ = dotenvy::dotenv();
        let api_key = std::env::var("NOTION_API_KEY").ok()?;
        let database_id = std::env::var("NOTION_DATABASE_ID").ok()?;
        let mut publisher = Self::new(api_key, database_id);
        if let Ok(property) = std::env::var("NOTION_TITLE_PROPERTY") {
            publisher.title_property = property;
        }
        Some(publisher)
    }

    fn page_body(&self, title: &str, content: &str) -> serde_json::Value {
        let children: Vec<serde_json::Value> = chunk_text(content, MAX_TEXT_CHARS)
            .into_iter()
            .map(|chunk| {
                json!({
                    "object": "block",
                    "type": "paragraph",
                    "paragraph": {
                        "rich_text": [{"type": "text", "text": {"content": chunk}}]
                    }
                })
            })
            .collect();

        let mut properties = serde_json::Map::new();
        properties.insert(
            self.title_property.clone(),
            json!({"title": [{"text": {"content": title}}]}),
        );

        json!({
            "parent": {"database_id": self.database_id},
            "properties": properties,
            "children": children,
        })
    }
}

fn chunk_text(content: &str, max: usize) -> Vec<String> {
    let chars: Vec<char> = content.chars().collect();
    chars.chunks(max).map(|c| c.iter().collect()).collect()
}

#[derive(Debug, Deserialize)]
struct PageResponse {
    id: Option<String>,
}

#[async_trait]
impl PublishService for NotionPublisher {
    async fn create_page(&self, title: &str, content: &str) -> Result<Option<String>, ServiceError> {
        let response = self
            .client
            .post(format!("{}/pages", self.base_url))
            .bearer_auth(&self.api_key)
            .header("Notion-Version", NOTION_VERSION)
            .json(&self.page_body(title, content))
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::UNAUTHORIZED => {
                return Err(ServiceError::Unauthorized("Notion rejected the API key".into()))
            }
            status => {
                let text = response.text().await.unwrap_or_default();
                warn!(%status, "Notion page creation failed");
                return Err(ServiceError::Upstream(format!(
                    "Notion page creation failed: {} {}",
                    status, text
                )));
            }
        }

        let page: PageResponse = response.json().await?;
        debug!(page_id = ?page.id, "Notion page created");
        Ok(page.id)
    }
}
