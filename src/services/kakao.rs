//! Place lookup via the Kakao Local keyword search API

use super::{Place, PlaceLookup};
use crate::error::ServiceError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

const KAKAO_API_BASE: &str = "https://dapi.kakao.com";

pub struct KakaoPlaces {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl KakaoPlaces {
    /// Reads KAKAO_REST_API_KEY (after loading `.env`)
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self {
            client: Client::new(),
            api_key: std::env::var("KAKAO_REST_API_KEY").ok(),
            base_url: KAKAO_API_BASE.to_string(),
        }
    }

    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: Some(api_key.into()),
            base_url: KAKAO_API_BASE.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct KeywordResponse {
    #[serde(default)]
    documents: Vec<Document>,
}

#[derive(Debug, Deserialize)]
struct Document {
    place_name: String,
    #[serde(default)]
    road_address_name: String,
    #[serde(default)]
    address_name: String,
    #[serde(default)]
    phone: String,
    #[serde(default)]
    category_name: String,
    #[serde(default)]
    place_url: String,
    #[serde(default)]
    x: String,
    #[serde(default)]
    y: String,
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

impl From<Document> for Place {
    fn from(doc: Document) -> Self {
        let address = if doc.road_address_name.is_empty() {
            doc.address_name
        } else {
            doc.road_address_name
        };
        Place {
            name: doc.place_name,
            address,
            phone: non_empty(doc.phone),
            category: non_empty(doc.category_name),
            url: non_empty(doc.place_url),
            x: doc.x.parse().ok(),
            y: doc.y.parse().ok(),
        }
    }
}

#[async_trait]
impl PlaceLookup for KakaoPlaces {
    async fn lookup(&self, query: &str, limit: usize) -> Result<Vec<Place>, ServiceError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ServiceError::Unavailable("KAKAO_REST_API_KEY is not set".into()))?;

        let size = limit.clamp(1, 15).to_string();
        let response = self
            .client
            .get(format!("{}/v2/local/search/keyword.json", self.base_url))
            .header("Authorization", format!("KakaoAK {}", api_key))
            .query(&[("query", query), ("size", size.as_str())])
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::UNAUTHORIZED => {
                return Err(ServiceError::Unauthorized("Kakao rejected the API key".into()))
            }
            status => return Err(ServiceError::Upstream(format!("Kakao search failed: {}", status))),
        }

        let data: KeywordResponse = response.json().await?;
        let places: Vec<Place> = data.documents.into_iter().map(Place::from).collect();
        debug!(query, places = places.len(), "Kakao place lookup");
        Ok(places)
    }
}
