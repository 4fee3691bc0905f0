use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use mb_core::storage::audio_url;
use mb_core::{
    Briefing, BriefingStorage, PushSubscription, Result, Subscriber, SubscriberStorage,
};
use tokio::sync::RwLock;

use crate::audio_file_date;

#[derive(Default)]
pub struct MemoryStore {
    briefings: BTreeMap<NaiveDate, Briefing>,
    audio: HashMap<String, Vec<u8>>,
    subscribers: Vec<Subscriber>,
    push_subscriptions: Vec<PushSubscription>,
}

impl MemoryStore {
    pub fn upsert_briefing(&mut self, briefing: &Briefing) {
        self.briefings.insert(briefing.date, briefing.clone());
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.briefings.keys().rev().copied().collect()
    }

    pub fn purge_before(&mut self, cutoff: NaiveDate) -> usize {
        let before = self.briefings.len();
        self.briefings.retain(|date, _| *date >= cutoff);
        self.audio
            .retain(|name, _| audio_file_date(name).map_or(true, |date| date >= cutoff));
        before - self.briefings.len()
    }

    pub fn upsert_subscriber(&mut self, email: &str) -> Subscriber {
        if let Some(existing) = self.subscribers.iter_mut().find(|s| s.email == email) {
            existing.active = true;
            return existing.clone();
        }
        let subscriber = Subscriber {
            email: email.to_string(),
            active: true,
            subscribed_at: Utc::now(),
        };
        self.subscribers.push(subscriber.clone());
        subscriber
    }

    pub fn upsert_push_subscription(&mut self, subscription: &PushSubscription) {
        if let Some(existing) = self
            .push_subscriptions
            .iter_mut()
            .find(|s| s.endpoint == subscription.endpoint)
        {
            *existing = subscription.clone();
        } else {
            self.push_subscriptions.push(subscription.clone());
        }
    }

    pub fn remove_push_subscription(&mut self, endpoint: &str) -> bool {
        let before = self.push_subscriptions.len();
        self.push_subscriptions.retain(|s| s.endpoint != endpoint);
        before != self.push_subscriptions.len()
    }
}

/// Process-local storage. Nothing survives a restart.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    store: Arc<RwLock<MemoryStore>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BriefingStorage for MemoryStorage {
    async fn save_briefing(&self, briefing: &Briefing) -> Result<()> {
        self.store.write().await.upsert_briefing(briefing);
        Ok(())
    }

    async fn get_briefing(&self, date: NaiveDate) -> Result<Option<Briefing>> {
        Ok(self.store.read().await.briefings.get(&date).cloned())
    }

    async fn list_dates(&self) -> Result<Vec<NaiveDate>> {
        Ok(self.store.read().await.dates())
    }

    async fn save_audio(&self, filename: &str, data: &[u8]) -> Result<String> {
        self.store
            .write()
            .await
            .audio
            .insert(filename.to_string(), data.to_vec());
        Ok(audio_url(filename))
    }

    async fn get_audio(&self, filename: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.store.read().await.audio.get(filename).cloned())
    }

    async fn purge_before(&self, cutoff: NaiveDate) -> Result<usize> {
        Ok(self.store.write().await.purge_before(cutoff))
    }
}

#[async_trait]
impl SubscriberStorage for MemoryStorage {
    async fn add_subscriber(&self, email: &str) -> Result<Subscriber> {
        Ok(self.store.write().await.upsert_subscriber(email))
    }

    async fn active_subscribers(&self) -> Result<Vec<Subscriber>> {
        Ok(self
            .store
            .read()
            .await
            .subscribers
            .iter()
            .filter(|s| s.active)
            .cloned()
            .collect())
    }

    async fn save_push_subscription(&self, subscription: &PushSubscription) -> Result<()> {
        self.store.write().await.upsert_push_subscription(subscription);
        Ok(())
    }

    async fn remove_push_subscription(&self, endpoint: &str) -> Result<bool> {
        Ok(self.store.write().await.remove_push_subscription(endpoint))
    }

    async fn push_subscriptions(&self) -> Result<Vec<PushSubscription>> {
        Ok(self.store.read().await.push_subscriptions.clone())
    }
}
