use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Subject buckets used to partition the news search queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topic {
    China,
    Russia,
    MiddleEast,
    Economy,
    Defense,
    Technology,
}

impl Topic {
    pub const ALL: [Topic; 6] = [
        Topic::China,
        Topic::Russia,
        Topic::MiddleEast,
        Topic::Economy,
        Topic::Defense,
        Topic::Technology,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Topic::China => "china",
            Topic::Russia => "russia",
            Topic::MiddleEast => "middleeast",
            Topic::Economy => "economy",
            Topic::Defense => "defense",
            Topic::Technology => "technology",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Topic::China => "China & Asia",
            Topic::Russia => "Russia & Europe",
            Topic::MiddleEast => "Middle East",
            Topic::Economy => "Economy & Trade",
            Topic::Defense => "Defense & Security",
            Topic::Technology => "Technology",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Topic::China => "🇨🇳",
            Topic::Russia => "🇷🇺",
            Topic::MiddleEast => "🇮🇱",
            Topic::Economy => "💰",
            Topic::Defense => "🛡️",
            Topic::Technology => "💻",
        }
    }

    /// The search query variants issued for this bucket, one request each.
    pub fn queries(&self) -> [&'static str; 3] {
        match self {
            Topic::China => [
                "China | Beijing | Xi Jinping | CCP",
                "Taiwan | South China Sea | Hong Kong",
                "North Korea | Kim Jong | Japan | Asia Pacific",
            ],
            Topic::Russia => [
                "Russia | Putin | Kremlin | Moscow",
                "Ukraine | Kyiv | Zelensky | war",
                "NATO | EU | Europe | Germany | France",
            ],
            Topic::MiddleEast => [
                "Israel | Gaza | Hamas | Netanyahu",
                "Iran | Tehran | Hezbollah | Lebanon",
                "Saudi Arabia | Syria | Yemen | Gulf",
            ],
            Topic::Economy => [
                "tariffs | trade war | sanctions | import",
                "Federal Reserve | interest rates | inflation | dollar",
                "markets | stocks | economy | GDP | recession",
            ],
            Topic::Defense => [
                "military | Pentagon | defense | troops",
                "nuclear | missiles | weapons | arms",
                "cybersecurity | espionage | intelligence | CIA",
            ],
            Topic::Technology => [
                "AI | artificial intelligence | OpenAI | chips",
                "semiconductors | TSMC | Nvidia | tech war",
                "Huawei | TikTok | cyber | data | tech regulation",
            ],
        }
    }

    pub fn from_key(key: &str) -> Option<Topic> {
        let key = key.trim().to_lowercase();
        Topic::ALL.into_iter().find(|t| t.key() == key)
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: String,
    pub title: String,
    pub description: String,
    pub snippet: String,
    pub url: String,
    pub image_url: String,
    pub source: String,
    pub published_at: DateTime<Utc>,
    pub categories: Vec<String>,
    pub topic: Topic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Story {
    pub id: String,
    pub article_id: String,
    pub title: String,
    pub summary: String,
    pub topic: Topic,
    pub topic_display: String,
    pub source: String,
    pub source_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub published_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryBrief {
    pub topic: Topic,
    pub display_name: String,
    pub emoji: String,
    pub headline: String,
    pub script: String,
    #[serde(default)]
    pub audio_url: Option<String>,
    pub story_count: usize,
    pub estimated_duration: String,
    pub stories: Vec<Story>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullBriefing {
    pub headline: String,
    pub script: String,
    #[serde(default)]
    pub audio_url: Option<String>,
    pub duration: String,
    pub story_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BriefingMeta {
    pub total_stories: usize,
    pub category_counts: BTreeMap<Topic, usize>,
    pub top_sources: Vec<String>,
}

impl BriefingMeta {
    pub const MAX_TOP_SOURCES: usize = 10;

    /// Counts stories per topic and collects sources in first-seen order.
    pub fn from_stories(stories: &[Story]) -> Self {
        let mut category_counts = BTreeMap::new();
        let mut top_sources: Vec<String> = Vec::new();
        for story in stories {
            *category_counts.entry(story.topic).or_insert(0) += 1;
            if !top_sources.contains(&story.source) {
                top_sources.push(story.source.clone());
            }
        }
        top_sources.truncate(Self::MAX_TOP_SOURCES);
        Self {
            total_stories: stories.len(),
            category_counts,
            top_sources,
        }
    }
}

/// One day's aggregate document, keyed by `date`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Briefing {
    pub date: NaiveDate,
    pub generated_at: DateTime<Utc>,
    pub full_briefing: FullBriefing,
    pub category_briefs: Vec<CategoryBrief>,
    pub stories: Vec<Story>,
    pub meta: BriefingMeta,
}

impl Briefing {
    pub fn summary(&self) -> BriefingSummary {
        BriefingSummary {
            date: self.date,
            headline: self.full_briefing.headline.clone(),
            duration: self.full_briefing.duration.clone(),
            story_count: self.meta.total_stories,
            category_count: self.category_briefs.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BriefingSummary {
    pub date: NaiveDate,
    pub headline: String,
    pub duration: String,
    pub story_count: usize,
    pub category_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscriber {
    pub email: String,
    pub active: bool,
    pub subscribed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushKeys {
    pub p256dh: String,
    pub auth: String,
}

/// A browser push receiver; the endpoint identifies it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushSubscription {
    pub endpoint: String,
    pub keys: PushKeys,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushPayload {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub url: String,
    pub tag: String,
}

impl PushPayload {
    pub fn daily_briefing(headline: Option<&str>) -> Self {
        Self {
            title: "🎧 Your Morning Brief is Ready".to_string(),
            body: headline
                .filter(|h| !h.trim().is_empty())
                .unwrap_or("Today's geopolitics briefing is waiting for you.")
                .to_string(),
            icon: "/icons/icon-192.png".to_string(),
            badge: "/icons/badge-72.png".to_string(),
            url: "/".to_string(),
            tag: "daily-briefing".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushDelivery {
    Delivered,
    /// The push service reported the endpoint gone (404/410).
    Expired,
    Failed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn story(topic: Topic, source: &str) -> Story {
        Story {
            id: format!("{}-1", topic),
            article_id: "a".to_string(),
            title: "t".to_string(),
            summary: "s".to_string(),
            topic,
            topic_display: topic.display_name().to_string(),
            source: source.to_string(),
            source_url: "https://example.com".to_string(),
            image_url: None,
            published_at: Utc::now(),
        }
    }

    #[test]
    fn test_topic_keys_round_trip() {
        for topic in Topic::ALL {
            assert_eq!(Topic::from_key(topic.key()), Some(topic));
        }
        assert_eq!(Topic::from_key("MiddleEast"), Some(Topic::MiddleEast));
        assert_eq!(Topic::from_key("sports"), None);
        assert_eq!(serde_json::to_string(&Topic::MiddleEast).unwrap(), "\"middleeast\"");
    }

    #[test]
    fn test_meta_counts_and_sources() {
        let stories = vec![
            story(Topic::China, "reuters.com"),
            story(Topic::China, "bbc.co.uk"),
            story(Topic::Economy, "reuters.com"),
        ];
        let meta = BriefingMeta::from_stories(&stories);
        assert_eq!(meta.total_stories, 3);
        assert_eq!(meta.category_counts[&Topic::China], 2);
        assert_eq!(meta.category_counts[&Topic::Economy], 1);
        assert_eq!(meta.top_sources, vec!["reuters.com", "bbc.co.uk"]);
    }

    #[test]
    fn test_push_payload_defaults_body() {
        let payload = PushPayload::daily_briefing(None);
        assert_eq!(payload.body, "Today's geopolitics briefing is waiting for you.");
        let payload = PushPayload::daily_briefing(Some("Markets rally"));
        assert_eq!(payload.body, "Markets rally");
        assert_eq!(payload.tag, "daily-briefing");
    }
}
