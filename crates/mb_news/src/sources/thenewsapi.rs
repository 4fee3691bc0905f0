use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mb_core::{Article, Error, Result, Topic};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};
use url::Url;

use super::{FetchWindow, FetchedNews, NewsSource};

pub const DEFAULT_BASE_URL: &str = "https://api.thenewsapi.com/v1/news";
const SEARCH_CATEGORIES: &str = "politics,general,business,world,tech";

#[derive(Debug, Clone)]
pub struct TheNewsApiConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    /// Pause after each query to stay under the free-tier rate limit
    pub request_delay: Duration,
    pub limit: u32,
}

impl Default for TheNewsApiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            request_delay: Duration::from_millis(150),
            limit: 50,
        }
    }
}

#[derive(Deserialize)]
struct TopResponse {
    #[serde(default)]
    data: Vec<RawArticle>,
}

#[derive(Deserialize)]
struct RawArticle {
    #[serde(default)]
    uuid: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    snippet: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    published_at: Option<String>,
    #[serde(default)]
    categories: Option<Vec<String>>,
}

impl RawArticle {
    fn into_article(self, topic: Topic) -> Option<Article> {
        let url = self.url.filter(|u| !u.is_empty())?;
        let published_at = self
            .published_at
            .as_deref()
            .and_then(|p| DateTime::parse_from_rfc3339(p).ok())
            .map(|p| p.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);
        Some(Article {
            id: self.uuid.unwrap_or_default(),
            title: self
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| "Untitled".to_string()),
            description: self.description.unwrap_or_default(),
            snippet: self.snippet.unwrap_or_default(),
            url,
            image_url: self.image_url.unwrap_or_default(),
            source: self
                .source
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "Unknown".to_string()),
            published_at,
            categories: self.categories.unwrap_or_default(),
            topic,
        })
    }
}

/// TheNewsAPI `/top` client. Each topic runs its three search variants in
/// sequence.
pub struct TheNewsApi {
    client: Client,
    api_key: String,
    base_url: String,
    request_delay: Duration,
    limit: u32,
}

impl fmt::Debug for TheNewsApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TheNewsApi")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("request_delay", &self.request_delay)
            .finish()
    }
}

impl TheNewsApi {
    pub fn new(config: TheNewsApiConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::NotConfigured("THENEWSAPI_KEY not configured".to_string()))?;
        let base_url = config
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        Url::parse(&base_url)
            .map_err(|e| Error::InvalidInput(format!("Invalid news API URL {}: {}", base_url, e)))?;

        Ok(Self {
            client: Client::builder().timeout(Duration::from_secs(30)).build()?,
            api_key,
            base_url,
            request_delay: config.request_delay,
            limit: config.limit,
        })
    }

    fn query_url(&self, query: &str, window: &FetchWindow) -> Result<Url> {
        let limit = self.limit.to_string();
        let published_after = FetchWindow::format(window.published_after);
        let mut params = vec![
            ("api_token", self.api_key.as_str()),
            ("locale", "us"),
            ("language", "en"),
            ("categories", SEARCH_CATEGORIES),
            ("published_after", published_after.as_str()),
            ("search", query),
            ("sort", "published_at"),
            ("limit", limit.as_str()),
        ];
        let published_before = window.published_before.map(FetchWindow::format);
        if let Some(before) = published_before.as_deref() {
            params.push(("published_before", before));
        }
        Url::parse_with_params(&format!("{}/top", self.base_url), &params)
            .map_err(|e| Error::Fetch(e.to_string()))
    }

    async fn fetch_query(&self, query: &str, window: &FetchWindow) -> Result<Vec<RawArticle>> {
        let response = self
            .client
            .get(self.query_url(query, window)?)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Fetch(format!("TheNewsAPI returned {}", status)));
        }
        Ok(response.json::<TopResponse>().await?.data)
    }
}

#[async_trait]
impl NewsSource for TheNewsApi {
    fn name(&self) -> &str {
        "TheNewsAPI"
    }

    async fn fetch_all(&self, window: &FetchWindow) -> Result<FetchedNews> {
        info!("📡 Fetching {} topics from {}", Topic::ALL.len(), self.name());
        let mut news = FetchedNews::new();
        let mut requests = 0;

        for topic in Topic::ALL {
            for query in topic.queries() {
                requests += 1;
                match self.fetch_query(query, window).await {
                    Ok(articles) => {
                        debug!(topic = %topic, query, count = articles.len(), "query returned");
                        for raw in articles {
                            if let Some(article) = raw.into_article(topic) {
                                news.insert(topic, article);
                            }
                        }
                    }
                    Err(e) => warn!("⚠️ Skipping {} query {:?}: {}", topic, query, e),
                }
                if !self.request_delay.is_zero() {
                    tokio::time::sleep(self.request_delay).await;
                }
            }
            info!("📰 {}: {} articles", topic.display_name(), news.topic(topic).len());
        }

        info!("✨ Fetch complete: {} requests, {} unique articles", requests, news.all.len());
        Ok(news)
    }
}
