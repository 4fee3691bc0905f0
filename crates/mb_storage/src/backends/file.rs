use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use mb_core::storage::{audio_url, is_valid_audio_name};
use mb_core::{
    Briefing, BriefingStorage, Error, PushSubscription, Result, Subscriber, SubscriberStorage,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::{audio_file_date, retention_cutoff};

const BRIEFINGS_DIR: &str = "briefings";
const AUDIO_DIR: &str = "audio";
const SUBSCRIBERS_FILE: &str = "subscribers.json";
const PUSH_FILE: &str = "push_subscriptions.json";

/// JSON documents and audio files under one root directory:
///
/// ```text
/// {root}/briefings/2026-01-11.json
/// {root}/audio/2026-01-11-full.mp3
/// {root}/audio/2026-01-11-china.mp3
/// {root}/subscribers.json
/// {root}/push_subscriptions.json
/// ```
///
/// Every briefing save is followed by a retention sweep.
pub struct FileStorage {
    root: PathBuf,
    // serializes read-modify-write of the subscriber lists
    lists: Mutex<()>,
}

impl FileStorage {
    pub async fn new(root: PathBuf) -> Result<Self> {
        fs::create_dir_all(root.join(BRIEFINGS_DIR)).await?;
        fs::create_dir_all(root.join(AUDIO_DIR)).await?;
        Ok(Self { root, lists: Mutex::new(()) })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn briefing_path(&self, date: NaiveDate) -> PathBuf {
        self.root
            .join(BRIEFINGS_DIR)
            .join(format!("{}.json", date.format("%Y-%m-%d")))
    }

    fn audio_path(&self, filename: &str) -> Result<PathBuf> {
        if !is_valid_audio_name(filename) {
            return Err(Error::InvalidInput(format!("Invalid audio file name: {}", filename)));
        }
        Ok(self.root.join(AUDIO_DIR).join(filename))
    }

    async fn read_list<T: DeserializeOwned>(&self, name: &str) -> Result<Vec<T>> {
        match fs::read(self.root.join(name)).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_list<T: Serialize>(&self, name: &str, items: &[T]) -> Result<()> {
        let json = serde_json::to_vec_pretty(items)?;
        fs::write(self.root.join(name), json).await?;
        Ok(())
    }

    async fn sweep_briefings(&self, cutoff: NaiveDate) -> Result<usize> {
        let mut removed = 0;
        for date in self.list_dates().await? {
            if date < cutoff {
                match fs::remove_file(self.briefing_path(date)).await {
                    Ok(()) => {
                        info!("🧹 Deleted old briefing: {}", date);
                        removed += 1;
                    }
                    Err(e) => warn!("Failed to delete briefing {}: {}", date, e),
                }
            }
        }
        Ok(removed)
    }

    async fn sweep_audio(&self, cutoff: NaiveDate) -> Result<()> {
        let mut entries = fs::read_dir(self.root.join(AUDIO_DIR)).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if audio_file_date(&name).is_some_and(|date| date < cutoff) {
                match fs::remove_file(entry.path()).await {
                    Ok(()) => info!("🧹 Deleted old audio: {}", name),
                    Err(e) => warn!("Failed to delete audio {}: {}", name, e),
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl BriefingStorage for FileStorage {
    async fn save_briefing(&self, briefing: &Briefing) -> Result<()> {
        let json = serde_json::to_vec_pretty(briefing)?;
        fs::write(self.briefing_path(briefing.date), json).await?;
        info!("💾 Saved briefing for {}", briefing.date);

        let cutoff = retention_cutoff(Utc::now().date_naive());
        if let Err(e) = self.purge_before(cutoff).await {
            warn!("Retention sweep failed: {}", e);
        }
        Ok(())
    }

    fn retention_cutoff(&self, today: NaiveDate) -> Option<NaiveDate> {
        Some(retention_cutoff(today))
    }

    async fn get_briefing(&self, date: NaiveDate) -> Result<Option<Briefing>> {
        match fs::read(self.briefing_path(date)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_dates(&self) -> Result<Vec<NaiveDate>> {
        let mut dates = Vec::new();
        let mut entries = fs::read_dir(self.root.join(BRIEFINGS_DIR)).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(stem) = name.strip_suffix(".json") {
                if let Ok(date) = NaiveDate::parse_from_str(stem, "%Y-%m-%d") {
                    dates.push(date);
                }
            }
        }
        dates.sort_by(|a, b| b.cmp(a));
        Ok(dates)
    }

    async fn save_audio(&self, filename: &str, data: &[u8]) -> Result<String> {
        fs::write(self.audio_path(filename)?, data).await?;
        let url = audio_url(filename);
        info!("🔊 Saved audio: {}", url);
        Ok(url)
    }

    async fn get_audio(&self, filename: &str) -> Result<Option<Vec<u8>>> {
        match fs::read(self.audio_path(filename)?).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn purge_before(&self, cutoff: NaiveDate) -> Result<usize> {
        let removed = self.sweep_briefings(cutoff).await?;
        self.sweep_audio(cutoff).await?;
        Ok(removed)
    }
}

#[async_trait]
impl SubscriberStorage for FileStorage {
    async fn add_subscriber(&self, email: &str) -> Result<Subscriber> {
        let _guard = self.lists.lock().await;
        let mut subscribers: Vec<Subscriber> = self.read_list(SUBSCRIBERS_FILE).await?;
        let subscriber = match subscribers.iter_mut().find(|s| s.email == email) {
            Some(existing) => {
                existing.active = true;
                existing.clone()
            }
            None => {
                let subscriber = Subscriber {
                    email: email.to_string(),
                    active: true,
                    subscribed_at: Utc::now(),
                };
                subscribers.push(subscriber.clone());
                subscriber
            }
        };
        self.write_list(SUBSCRIBERS_FILE, &subscribers).await?;
        Ok(subscriber)
    }

    async fn active_subscribers(&self) -> Result<Vec<Subscriber>> {
        let subscribers: Vec<Subscriber> = self.read_list(SUBSCRIBERS_FILE).await?;
        Ok(subscribers.into_iter().filter(|s| s.active).collect())
    }

    async fn save_push_subscription(&self, subscription: &PushSubscription) -> Result<()> {
        let _guard = self.lists.lock().await;
        let mut subscriptions: Vec<PushSubscription> = self.read_list(PUSH_FILE).await?;
        subscriptions.retain(|s| s.endpoint != subscription.endpoint);
        subscriptions.push(subscription.clone());
        self.write_list(PUSH_FILE, &subscriptions).await
    }

    async fn remove_push_subscription(&self, endpoint: &str) -> Result<bool> {
        let _guard = self.lists.lock().await;
        let mut subscriptions: Vec<PushSubscription> = self.read_list(PUSH_FILE).await?;
        let before = subscriptions.len();
        subscriptions.retain(|s| s.endpoint != endpoint);
        if subscriptions.len() == before {
            return Ok(false);
        }
        self.write_list(PUSH_FILE, &subscriptions).await?;
        Ok(true)
    }

    async fn push_subscriptions(&self) -> Result<Vec<PushSubscription>> {
        self.read_list(PUSH_FILE).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_briefing;
    use chrono::Duration;
    use mb_core::PushKeys;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_file_storage_upsert_by_date() {
        let temp_dir = tempdir().unwrap();
        let storage = FileStorage::new(temp_dir.path().to_path_buf()).await.unwrap();
        let today = Utc::now().date_naive();

        storage.save_briefing(&sample_briefing(today, "first")).await.unwrap();
        storage.save_briefing(&sample_briefing(today, "second")).await.unwrap();

        assert_eq!(storage.list_dates().await.unwrap(), vec![today]);
        let stored = storage.get_briefing(today).await.unwrap().unwrap();
        assert_eq!(stored.full_briefing.headline, "second");
        assert!(temp_dir
            .path()
            .join("briefings")
            .join(format!("{}.json", today.format("%Y-%m-%d")))
            .exists());
    }

    #[tokio::test]
    async fn test_save_sweeps_files_past_retention() {
        let temp_dir = tempdir().unwrap();
        let storage = FileStorage::new(temp_dir.path().to_path_buf()).await.unwrap();
        let today = Utc::now().date_naive();
        let stale = today - Duration::days(45);
        let recent = today - Duration::days(3);

        // written directly so the sweep only runs on the final save
        let stale_json = serde_json::to_vec(&sample_briefing(stale, "stale")).unwrap();
        fs::write(storage.briefing_path(stale), stale_json).await.unwrap();
        let stale_audio = format!("{}-full.mp3", stale.format("%Y-%m-%d"));
        let recent_audio = format!("{}-china.mp3", recent.format("%Y-%m-%d"));
        storage.save_audio(&stale_audio, b"x").await.unwrap();
        storage.save_audio(&recent_audio, b"y").await.unwrap();
        storage.save_audio("jingle.mp3", b"z").await.unwrap();

        storage.save_briefing(&sample_briefing(recent, "recent")).await.unwrap();

        assert_eq!(storage.list_dates().await.unwrap(), vec![recent]);
        assert!(storage.get_audio(&stale_audio).await.unwrap().is_none());
        assert!(storage.get_audio(&recent_audio).await.unwrap().is_some());
        assert!(storage.get_audio("jingle.mp3").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_sweep_continues_past_undeletable_entries() {
        let temp_dir = tempdir().unwrap();
        let storage = FileStorage::new(temp_dir.path().to_path_buf()).await.unwrap();
        let today = Utc::now().date_naive();
        let stale = today - Duration::days(50);
        let older = today - Duration::days(60);

        // a directory under a briefing name cannot be removed as a file
        fs::create_dir(storage.briefing_path(stale)).await.unwrap();
        let older_json = serde_json::to_vec(&sample_briefing(older, "older")).unwrap();
        fs::write(storage.briefing_path(older), older_json).await.unwrap();
        let stale_audio = format!("{}-full.mp3", stale.format("%Y-%m-%d"));
        storage.save_audio(&stale_audio, b"x").await.unwrap();

        let removed = storage.purge_before(retention_cutoff(today)).await.unwrap();
        assert_eq!(removed, 1);
        assert!(storage.get_briefing(older).await.unwrap().is_none());
        assert!(storage.get_audio(&stale_audio).await.unwrap().is_none());
    }

    #[test]
    fn test_reports_retention_cutoff() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let storage = FileStorage { root: PathBuf::from("unused"), lists: Mutex::new(()) };
        assert_eq!(storage.retention_cutoff(today), Some(retention_cutoff(today)));
    }

    #[tokio::test]
    async fn test_missing_briefing_is_none() {
        let temp_dir = tempdir().unwrap();
        let storage = FileStorage::new(temp_dir.path().to_path_buf()).await.unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 1, 2).unwrap();
        assert!(storage.get_briefing(date).await.unwrap().is_none());
        assert!(storage.history(14).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_audio_names_cannot_escape_root() {
        let temp_dir = tempdir().unwrap();
        let storage = FileStorage::new(temp_dir.path().to_path_buf()).await.unwrap();
        assert!(storage.save_audio("../evil.mp3", b"x").await.is_err());
        assert!(storage.get_audio("a/b.mp3").await.is_err());
    }

    #[tokio::test]
    async fn test_subscriber_lists_persist() {
        let temp_dir = tempdir().unwrap();
        let root = temp_dir.path().to_path_buf();
        {
            let storage = FileStorage::new(root.clone()).await.unwrap();
            storage.add_subscriber("reader@example.com").await.unwrap();
            storage
                .save_push_subscription(&PushSubscription {
                    endpoint: "https://push.example/abc".to_string(),
                    keys: PushKeys { p256dh: "p".to_string(), auth: "a".to_string() },
                })
                .await
                .unwrap();
        }

        let storage = FileStorage::new(root).await.unwrap();
        let subscribers = storage.active_subscribers().await.unwrap();
        assert_eq!(subscribers.len(), 1);
        assert_eq!(subscribers[0].email, "reader@example.com");
        assert_eq!(storage.push_subscriptions().await.unwrap().len(), 1);
        assert!(storage.remove_push_subscription("https://push.example/abc").await.unwrap());
        assert!(storage.push_subscriptions().await.unwrap().is_empty());
    }
}
