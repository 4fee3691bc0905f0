use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use mb_core::{Article, Result, Topic};

pub mod thenewsapi;

pub use thenewsapi::{TheNewsApi, TheNewsApiConfig};

#[async_trait]
pub trait NewsSource: Send + Sync {
    /// Returns the name of the news source
    fn name(&self) -> &str;

    /// Runs every topic query for the window. Individual query failures are
    /// skipped, not returned.
    async fn fetch_all(&self, window: &FetchWindow) -> Result<FetchedNews>;
}

/// Publication-time bounds for a fetch, in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchWindow {
    pub published_after: NaiveDateTime,
    pub published_before: Option<NaiveDateTime>,
}

impl FetchWindow {
    /// The 24 hours ending at `now`, open-ended.
    pub fn last_24h(now: DateTime<Utc>) -> Self {
        Self {
            published_after: (now - Duration::hours(24)).naive_utc(),
            published_before: None,
        }
    }

    /// Midnight of the previous day through the last second of `date`.
    pub fn for_date(date: NaiveDate) -> Self {
        let day_before = date - Duration::days(1);
        Self {
            published_after: day_before.and_time(NaiveTime::default()),
            published_before: NaiveTime::from_hms_opt(23, 59, 59).map(|t| date.and_time(t)),
        }
    }

    pub fn format(time: NaiveDateTime) -> String {
        time.format("%Y-%m-%dT%H:%M:%S").to_string()
    }
}

/// Articles grouped by topic plus the de-duplicated union of all of them.
///
/// The same URL may appear under several topics but only once in `all`.
#[derive(Debug, Clone, Default)]
pub struct FetchedNews {
    pub by_topic: BTreeMap<Topic, Vec<Article>>,
    pub all: Vec<Article>,
    seen: HashSet<String>,
}

impl FetchedNews {
    pub fn new() -> Self {
        let mut news = Self::default();
        for topic in Topic::ALL {
            news.by_topic.insert(topic, Vec::new());
        }
        news
    }

    /// Returns false when the URL was already listed under `topic`.
    pub fn insert(&mut self, topic: Topic, article: Article) -> bool {
        let bucket = self.by_topic.entry(topic).or_default();
        if bucket.iter().any(|a| a.url == article.url) {
            return false;
        }
        if self.seen.insert(article.url.clone()) {
            self.all.push(article.clone());
        }
        bucket.push(article);
        true
    }

    pub fn topic(&self, topic: Topic) -> &[Article] {
        self.by_topic.get(&topic).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }
}
