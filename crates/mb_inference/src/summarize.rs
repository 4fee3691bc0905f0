//! Turns curated articles into stories, category briefs and the full
//! narration script.
//!
//! Every model call has a text fallback: a failed or unparsable reply never
//! fails the briefing, it only makes it plainer.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::NaiveDate;
use mb_core::{Article, CategoryBrief, LanguageModel, Story, Topic};
use serde::Deserialize;
use tracing::{info, warn};

pub const MAX_STORIES_PER_TOPIC: usize = 6;

const STORY_TITLE_CHARS: usize = 80;
const STORY_SUMMARY_CHARS: usize = 300;
const CATEGORY_HEADLINE_CHARS: usize = 50;
const CATEGORY_SCRIPT_CHARS: usize = 1200;
const CATEGORY_FALLBACK_CHARS: usize = 1000;
const FULL_HEADLINE_CHARS: usize = 60;
const FULL_SCRIPT_CHARS: usize = 4000;
const FULL_FALLBACK_CHARS: usize = 3500;
const DEFAULT_FULL_HEADLINE: &str = "Global News Roundup";

/// Narration speed used for duration estimates (~150 words per minute).
const CHARS_PER_SECOND: f64 = 12.0;

#[derive(Debug, Clone, PartialEq)]
pub struct BriefingDraft {
    pub headline: String,
    pub script: String,
    pub stories: Vec<Story>,
    pub category_briefs: Vec<CategoryBrief>,
    pub estimated_duration: String,
}

#[derive(Deserialize)]
struct StorySummary {
    index: usize,
    #[serde(default)]
    title: String,
    #[serde(default)]
    summary: String,
}

pub struct Summarizer {
    model: Arc<dyn LanguageModel>,
}

impl fmt::Debug for Summarizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Summarizer")
            .field("model", &self.model.name())
            .finish()
    }
}

impl Summarizer {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Builds one brief per non-empty topic (in topic order), then the full
    /// briefing on top of them.
    pub async fn generate_all(
        &self,
        by_topic: &BTreeMap<Topic, Vec<Article>>,
        date: NaiveDate,
    ) -> BriefingDraft {
        let mut category_briefs = Vec::new();
        let mut stories = Vec::new();

        for (topic, articles) in by_topic {
            if articles.is_empty() {
                info!("⏭️ Skipping {} - no articles", topic);
                continue;
            }
            info!("🤖 Summarizing {}: {} articles", topic, articles.len());
            let brief = self.category_brief(*topic, articles).await;
            stories.extend(brief.stories.iter().cloned());
            category_briefs.push(brief);
        }

        let (headline, script) = self.full_briefing(&category_briefs, date).await;
        info!(
            "✨ Summaries complete: {} stories, {} category briefs",
            stories.len(),
            category_briefs.len()
        );

        BriefingDraft {
            estimated_duration: estimate_duration(&script),
            headline,
            script,
            stories,
            category_briefs,
        }
    }

    pub async fn category_brief(&self, topic: Topic, articles: &[Article]) -> CategoryBrief {
        let top = &articles[..articles.len().min(MAX_STORIES_PER_TOPIC)];
        let stories = self.summarize_stories(topic, top).await;
        let headline = self.category_headline(&stories, topic.display_name()).await;
        let script = self.category_script(&stories, topic.display_name()).await;

        CategoryBrief {
            topic,
            display_name: topic.display_name().to_string(),
            emoji: topic.emoji().to_string(),
            headline,
            estimated_duration: estimate_duration(&script),
            script,
            audio_url: None,
            story_count: stories.len(),
            stories,
        }
    }

    /// One batch prompt for all articles; replies are matched back by index.
    pub async fn summarize_stories(&self, topic: Topic, articles: &[Article]) -> Vec<Story> {
        let listing = articles
            .iter()
            .enumerate()
            .map(|(i, a)| {
                let body = if a.description.is_empty() { &a.snippet } else { &a.description };
                format!("[{}] {}\nSource: {}\n{}", i + 1, a.title, a.source, body)
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        let prompt = format!(
            "Summarize each news story in 2-3 sentences. Be factual, engaging and concise.\n\n\
             ARTICLES:\n{}\n\n\
             Return a JSON array:\n\
             [{{\"index\": 1, \"title\": \"Compelling headline (max 80 chars)\", \"summary\": \"2-3 sentence summary with key facts and context\"}}]\n\n\
             Return ONLY valid JSON.",
            listing
        );

        let summaries = match self.model.complete(&prompt, 2000).await {
            Ok(reply) => match parse_story_summaries(&reply) {
                Some(summaries) => summaries,
                None => {
                    warn!("Story summaries for {} were not valid JSON, using descriptions", topic);
                    Vec::new()
                }
            },
            Err(e) => {
                warn!("Story summaries for {} failed: {}", topic, e);
                Vec::new()
            }
        };

        articles
            .iter()
            .enumerate()
            .map(|(i, article)| {
                let reply = summaries.iter().find(|s| s.index == i + 1);
                let title = reply
                    .map(|s| s.title.trim())
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .unwrap_or_else(|| truncate_chars(&article.title, STORY_TITLE_CHARS));
                let summary = reply
                    .map(|s| s.summary.trim())
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .unwrap_or_else(|| fallback_summary(article));
                story_from(topic, i, article, title, summary)
            })
            .collect()
    }

    pub async fn category_headline(&self, stories: &[Story], display_name: &str) -> String {
        let top = stories
            .iter()
            .take(3)
            .map(|s| s.title.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        let prompt = format!(
            "Based on these {} news stories, create a compelling headline.\n\n\
             STORIES:\n{}\n\n\
             REQUIREMENTS:\n\
             - Maximum 50 characters\n\
             - Focus on the biggest story\n\
             - News style (CNN, BBC)\n\
             - No quotes\n\n\
             Return ONLY the headline text.",
            display_name, top
        );

        match self.model.complete(&prompt, 60).await {
            Ok(reply) if !strip_quotes(&reply).is_empty() => {
                truncate_chars(&strip_quotes(&reply), CATEGORY_HEADLINE_CHARS)
            }
            _ => stories
                .first()
                .map(|s| truncate_chars(&s.title, CATEGORY_HEADLINE_CHARS))
                .unwrap_or_else(|| format!("{} Update", display_name)),
        }
    }

    pub async fn category_script(&self, stories: &[Story], display_name: &str) -> String {
        let listing = stories
            .iter()
            .map(|s| format!("- {}: {}", s.title, s.summary))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = format!(
            "Write a 1-2 MINUTE audio briefing script for {display} news.\n\n\
             STORIES:\n{listing}\n\n\
             REQUIREMENTS:\n\
             1. Opening (5 sec): \"Here's your {display} update.\"\n\
             2. Cover {count} stories with 2-3 sentences each\n\
             3. Closing (5 sec): \"That's your {display} brief.\"\n\
             4. Total: 600-1000 characters (1-2 minutes)\n\
             5. Conversational, professional tone\n\n\
             Return ONLY the script text.",
            display = display_name,
            listing = listing,
            count = stories.len().min(4),
        );

        match self.model.complete(&prompt, 600).await {
            Ok(reply) if !reply.trim().is_empty() => {
                clip_with_ellipsis(reply.trim(), CATEGORY_SCRIPT_CHARS)
            }
            Ok(_) => fallback_category_script(stories, display_name),
            Err(e) => {
                warn!("Script for {} failed: {}", display_name, e);
                fallback_category_script(stories, display_name)
            }
        }
    }

    /// Returns `(headline, script)` for the full multi-topic narration.
    pub async fn full_briefing(
        &self,
        briefs: &[CategoryBrief],
        date: NaiveDate,
    ) -> (String, String) {
        let spoken_date = spoken_date(date);

        let headlines = briefs
            .iter()
            .map(|b| b.headline.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        let headline_prompt = format!(
            "Based on today's top news across all categories, create ONE main headline.\n\n\
             CATEGORY HEADLINES:\n{}\n\n\
             Requirements: Max 60 chars, punchy, captures the day's biggest story.\n\
             Return ONLY the headline.",
            headlines
        );
        let headline = match self.model.complete(&headline_prompt, 80).await {
            Ok(reply) if !strip_quotes(&reply).is_empty() => {
                truncate_chars(&strip_quotes(&reply), FULL_HEADLINE_CHARS)
            }
            _ => briefs
                .first()
                .map(|b| b.headline.clone())
                .unwrap_or_else(|| DEFAULT_FULL_HEADLINE.to_string()),
        };

        let by_category = briefs
            .iter()
            .map(|b| {
                let top = b
                    .stories
                    .iter()
                    .take(2)
                    .map(|s| format!("- {}", s.title))
                    .collect::<Vec<_>>()
                    .join("\n");
                format!("{} {}:\n{}", b.emoji, b.display_name, top)
            })
            .collect::<Vec<_>>()
            .join("\n\n");
        let script_prompt = format!(
            "Write a 5-MINUTE comprehensive news briefing script.\n\n\
             DATE: {date}\n\n\
             NEWS BY CATEGORY:\n{news}\n\n\
             REQUIREMENTS:\n\
             1. Opening (15 sec): \"Good morning. It's {date}. Here's your Morning Brief with today's top stories from around the world.\"\n\n\
             2. Cover EACH category with a section:\n\
             \x20  - Use transitions: \"Turning to...\", \"Meanwhile in...\", \"On the economic front...\", \"In tech news...\"\n\
             \x20  - 2-3 sentences per major story\n\
             \x20  - Cover 2-3 stories per category\n\n\
             3. Closing (15 sec): \"That's your Morning Brief for {date}. Check our app for individual category briefs if you want to dive deeper into any topic. Stay informed, and have a great day.\"\n\n\
             4. Total: 2800-3500 characters (5 minutes of audio)\n\
             5. Professional, authoritative tone (NPR/BBC style)\n\
             6. Say \"United States\" not \"US\", spell out abbreviations\n\n\
             Return ONLY the script text.",
            date = spoken_date,
            news = by_category,
        );
        let script = match self.model.complete(&script_prompt, 2000).await {
            Ok(reply) if !reply.trim().is_empty() => clip_with_ellipsis(reply.trim(), FULL_SCRIPT_CHARS),
            Ok(_) => fallback_full_script(briefs, &spoken_date),
            Err(e) => {
                warn!("Full briefing script failed: {}", e);
                fallback_full_script(briefs, &spoken_date)
            }
        };

        info!("📝 Full briefing: \"{}\" - {} chars", headline, script.chars().count());
        (headline, script)
    }
}

/// Estimated narration length as `m:ss`.
pub fn estimate_duration(text: &str) -> String {
    let seconds = (text.chars().count() as f64 / CHARS_PER_SECOND).round() as u64;
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

fn spoken_date(date: NaiveDate) -> String {
    date.format("%A, %B %-d").to_string()
}

fn story_from(topic: Topic, i: usize, article: &Article, title: String, summary: String) -> Story {
    Story {
        id: format!("{}-{}", topic.key(), i + 1),
        article_id: article.id.clone(),
        title,
        summary,
        topic,
        topic_display: topic.display_name().to_string(),
        source: article.source.clone(),
        source_url: article.url.clone(),
        image_url: Some(article.image_url.clone()).filter(|u| !u.is_empty()),
        published_at: article.published_at,
    }
}

fn fallback_summary(article: &Article) -> String {
    let summary = truncate_chars(&article.description, STORY_SUMMARY_CHARS);
    if summary.is_empty() {
        article.snippet.clone()
    } else {
        summary
    }
}

fn fallback_category_script(stories: &[Story], display_name: &str) -> String {
    let mut script = format!("Here's your {} update.\n\n", display_name);
    for story in stories.iter().take(3) {
        script.push_str(&format!("{}. {}\n\n", story.title, story.summary));
    }
    script.push_str(&format!("That's your {} brief.", display_name));
    truncate_chars(&script, CATEGORY_FALLBACK_CHARS)
}

fn fallback_full_script(briefs: &[CategoryBrief], spoken_date: &str) -> String {
    let mut script = format!("Good morning. It's {}. Here's your Morning Brief.\n\n", spoken_date);
    for brief in briefs {
        script.push_str(&format!("{} {}:\n", brief.emoji, brief.display_name));
        for story in brief.stories.iter().take(2) {
            script.push_str(&format!("{}. {}\n", story.title, story.summary));
        }
        script.push('\n');
    }
    script.push_str(&format!("That's your Morning Brief for {}. Stay informed.", spoken_date));
    truncate_chars(&script, FULL_FALLBACK_CHARS)
}

/// The model is asked for a bare array but often wraps it in prose; take the
/// widest `[ ... ]` span.
fn parse_story_summaries(reply: &str) -> Option<Vec<StorySummary>> {
    let start = reply.find('[')?;
    let end = reply.rfind(']')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&reply[start..=end]).ok()
}

fn strip_quotes(text: &str) -> String {
    let trimmed = text.trim();
    let trimmed = trimmed
        .strip_prefix(|c| c == '"' || c == '\'')
        .unwrap_or(trimmed);
    let trimmed = trimmed
        .strip_suffix(|c| c == '"' || c == '\'')
        .unwrap_or(trimmed);
    trimmed.to_string()
}

pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

fn clip_with_ellipsis(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        format!("{}...", truncate_chars(text, max - 3))
    } else {
        text.to_string()
    }
}
