use async_trait::async_trait;
use chrono::NaiveDate;
use crate::types::{Briefing, BriefingSummary, PushSubscription, Subscriber};
use crate::Result;

/// Public path prefix under which stored audio is served.
pub const AUDIO_URL_PREFIX: &str = "/audio/";

#[async_trait]
pub trait BriefingStorage: Send + Sync {
    /// Insert or replace the briefing for its date
    async fn save_briefing(&self, briefing: &Briefing) -> Result<()>;

    /// Point lookup by date
    async fn get_briefing(&self, date: NaiveDate) -> Result<Option<Briefing>>;

    async fn has_briefing(&self, date: NaiveDate) -> Result<bool> {
        Ok(self.get_briefing(date).await?.is_some())
    }

    /// All stored dates, newest first
    async fn list_dates(&self) -> Result<Vec<NaiveDate>>;

    /// Summaries of the `limit` most recent briefings, newest first
    async fn history(&self, limit: usize) -> Result<Vec<BriefingSummary>> {
        let mut summaries = Vec::new();
        for date in self.list_dates().await?.into_iter().take(limit) {
            if let Some(briefing) = self.get_briefing(date).await? {
                summaries.push(briefing.summary());
            }
        }
        Ok(summaries)
    }

    /// Store an audio blob and return its public URL
    async fn save_audio(&self, filename: &str, data: &[u8]) -> Result<String>;

    async fn get_audio(&self, filename: &str) -> Result<Option<Vec<u8>>>;

    /// Delete briefings and date-prefixed audio strictly older than `cutoff`
    async fn purge_before(&self, cutoff: NaiveDate) -> Result<usize>;

    /// Oldest date a save keeps when this backend sweeps on save.
    /// Briefings dated before it would be deleted right after being written.
    fn retention_cutoff(&self, _today: NaiveDate) -> Option<NaiveDate> {
        None
    }
}

#[async_trait]
pub trait SubscriberStorage: Send + Sync {
    /// Upsert by email; re-subscribing reactivates
    async fn add_subscriber(&self, email: &str) -> Result<Subscriber>;

    async fn active_subscribers(&self) -> Result<Vec<Subscriber>>;

    /// Upsert by endpoint
    async fn save_push_subscription(&self, subscription: &PushSubscription) -> Result<()>;

    /// Returns false when no subscription had that endpoint
    async fn remove_push_subscription(&self, endpoint: &str) -> Result<bool>;

    async fn push_subscriptions(&self) -> Result<Vec<PushSubscription>>;
}

pub trait Storage: BriefingStorage + SubscriberStorage {}

impl<T: BriefingStorage + SubscriberStorage> Storage for T {}

pub fn audio_url(filename: &str) -> String {
    format!("{}{}", AUDIO_URL_PREFIX, filename)
}

/// Rejects names that could escape the audio namespace.
pub fn is_valid_audio_name(filename: &str) -> bool {
    !filename.is_empty()
        && filename
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        && !filename.starts_with('.')
}
