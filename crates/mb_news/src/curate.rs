//! Per-topic article selection: drop near-duplicate titles, put trusted
//! outlets first, keep the newest.

use std::collections::HashSet;

use lazy_static::lazy_static;
use mb_core::{Article, Topic};
use regex::Regex;

pub const MAX_ARTICLES_PER_TOPIC: usize = 6;

pub const PREMIUM_SOURCES: [&str; 14] = [
    "reuters", "apnews", "bbc", "nytimes", "wsj", "ft", "economist", "politico", "aljazeera",
    "nbcnews", "cbsnews", "foxnews", "cnn", "bloomberg",
];

const TITLE_KEY_WORDS: usize = 6;

lazy_static! {
    static ref NON_ALPHANUMERIC: Regex = Regex::new(r"[^a-z0-9\s]").unwrap();
    static ref TOPIC_KEYWORDS: Vec<(Topic, Regex)> = vec![
        (Topic::China, Regex::new(r"china|beijing|xi jinping|taiwan|hong kong|asia|chinese|ccp").unwrap()),
        (Topic::Russia, Regex::new(r"russia|moscow|putin|kremlin|ukraine|kyiv|nato|europe").unwrap()),
        (Topic::MiddleEast, Regex::new(r"iran|israel|gaza|hamas|middle east|saudi|syria|hezbollah").unwrap()),
        (Topic::Economy, Regex::new(r"tariff|trade|sanction|economy|market|fed|inflation|dollar").unwrap()),
        (Topic::Defense, Regex::new(r"military|defense|pentagon|nuclear|missile|weapon|army").unwrap()),
        (Topic::Technology, Regex::new(r"\bai\b|chip|semiconductor|tech|cyber|huawei|tiktok").unwrap()),
    ];
}

/// Lowercased title reduced to its first six alphanumeric words.
pub fn title_key(title: &str) -> String {
    let lowered = title.to_lowercase();
    let cleaned = NON_ALPHANUMERIC.replace_all(&lowered, "");
    cleaned
        .split_whitespace()
        .take(TITLE_KEY_WORDS)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Keeps the first article for each title key, in input order.
pub fn deduplicate(articles: Vec<Article>) -> Vec<Article> {
    let mut seen = HashSet::new();
    articles
        .into_iter()
        .filter(|article| seen.insert(title_key(&article.title)))
        .collect()
}

pub fn is_premium(source: &str) -> bool {
    let source = source.to_lowercase();
    PREMIUM_SOURCES.iter().any(|premium| source.contains(premium))
}

/// Premium outlets first, then newest first. The sort is stable.
pub fn rank(mut articles: Vec<Article>) -> Vec<Article> {
    articles.sort_by(|a, b| {
        is_premium(&b.source)
            .cmp(&is_premium(&a.source))
            .then_with(|| b.published_at.cmp(&a.published_at))
    });
    articles
}

pub fn curate(articles: Vec<Article>, limit: usize) -> Vec<Article> {
    let mut ranked = rank(deduplicate(articles));
    ranked.truncate(limit);
    ranked
}

/// Keyword guess for an article that arrived without a topic. Falls back to
/// economy.
pub fn categorize(title: &str, description: &str) -> Topic {
    let text = format!("{} {}", title, description).to_lowercase();
    TOPIC_KEYWORDS
        .iter()
        .find(|(_, pattern)| pattern.is_match(&text))
        .map(|(topic, _)| *topic)
        .unwrap_or(Topic::Economy)
}
