use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{NaiveDate, Utc};
use mb_core::{
    Briefing, BriefingMeta, Error, FullBriefing, Result, Storage, Topic, VoiceOptions,
};
use mb_inference::Summarizer;
use mb_tts::Narrator;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::curate::{curate, MAX_ARTICLES_PER_TOPIC};
use crate::sources::{FetchWindow, NewsSource};

#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    /// Target date; today (UTC) when absent
    pub date: Option<NaiveDate>,
    /// Regenerate even if the date already has a briefing
    pub force: bool,
    pub voice: VoiceOptions,
}

impl GenerateRequest {
    pub fn today() -> Self {
        Self::default()
    }

    pub fn for_date(date: NaiveDate) -> Self {
        Self { date: Some(date), ..Self::default() }
    }
}

#[derive(Debug, Clone)]
pub enum GenerateOutcome {
    Generated { briefing: Briefing, elapsed: Duration },
    /// The date already had a briefing; nothing was fetched
    Skipped(Briefing),
}

impl GenerateOutcome {
    pub fn briefing(&self) -> &Briefing {
        match self {
            GenerateOutcome::Generated { briefing, .. } => briefing,
            GenerateOutcome::Skipped(briefing) => briefing,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, GenerateOutcome::Skipped(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoricalStatus {
    Success,
    Skipped,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoricalResult {
    pub date: NaiveDate,
    pub status: HistoricalStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Every date from `start` through `end`, inclusive.
pub fn date_range(start: NaiveDate, end: NaiveDate) -> Result<Vec<NaiveDate>> {
    if end < start {
        return Err(Error::InvalidInput(format!(
            "endDate {} is before startDate {}",
            end, start
        )));
    }
    Ok(start.iter_days().take_while(|d| *d <= end).collect())
}

/// Fetch, curate, summarize, narrate and store one day's briefing.
pub struct BriefingGenerator {
    source: Arc<dyn NewsSource>,
    summarizer: Summarizer,
    storage: Arc<dyn Storage>,
    full_narrator: Narrator,
    category_narrator: Narrator,
    per_topic: usize,
    historical_pause: Duration,
}

impl BriefingGenerator {
    pub fn new(
        source: Arc<dyn NewsSource>,
        summarizer: Summarizer,
        storage: Arc<dyn Storage>,
    ) -> Self {
        Self {
            source,
            summarizer,
            storage,
            full_narrator: Narrator::silent(),
            category_narrator: Narrator::silent(),
            per_topic: MAX_ARTICLES_PER_TOPIC,
            historical_pause: Duration::from_secs(2),
        }
    }

    pub fn with_narrators(mut self, full: Narrator, category: Narrator) -> Self {
        self.full_narrator = full;
        self.category_narrator = category;
        self
    }

    /// Pause between dates in a historical batch
    pub fn with_historical_pause(mut self, pause: Duration) -> Self {
        self.historical_pause = pause;
        self
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub async fn generate(&self, request: GenerateRequest) -> Result<GenerateOutcome> {
        let started = Instant::now();
        let today = Utc::now().date_naive();
        let date = request.date.unwrap_or(today);
        self.check_date(date, today)?;

        if !request.force {
            if let Some(existing) = self.storage.get_briefing(date).await? {
                info!("⏭️ Briefing for {} already exists, skipping", date);
                return Ok(GenerateOutcome::Skipped(existing));
            }
        }

        let window = if date < today {
            FetchWindow::for_date(date)
        } else {
            FetchWindow::last_24h(Utc::now())
        };
        info!("🚀 Generating briefing for {}", date);
        let news = self.source.fetch_all(&window).await?;
        if news.is_empty() {
            return Err(Error::NoArticles);
        }
        info!("📰 {} unique articles", news.all.len());

        let curated: BTreeMap<Topic, _> = news
            .by_topic
            .into_iter()
            .map(|(topic, articles)| (topic, curate(articles, self.per_topic)))
            .collect();

        let draft = self.summarizer.generate_all(&curated, date).await;

        let full_audio = self
            .narrate(&self.full_narrator, &draft.script, &request.voice, &format!("{}-full.mp3", date))
            .await;

        let mut category_briefs = draft.category_briefs;
        for brief in category_briefs.iter_mut() {
            let filename = format!("{}-{}.mp3", date, brief.topic.key());
            brief.audio_url = self
                .narrate(&self.category_narrator, &brief.script, &VoiceOptions::default(), &filename)
                .await;
        }

        let meta = BriefingMeta::from_stories(&draft.stories);
        let briefing = Briefing {
            date,
            generated_at: Utc::now(),
            full_briefing: FullBriefing {
                headline: draft.headline,
                script: draft.script,
                audio_url: full_audio,
                duration: draft.estimated_duration,
                story_count: meta.total_stories,
            },
            category_briefs,
            stories: draft.stories,
            meta,
        };

        self.storage.save_briefing(&briefing).await?;
        let elapsed = started.elapsed();
        info!("✅ Briefing for {} complete in {:.1}s", date, elapsed.as_secs_f64());
        Ok(GenerateOutcome::Generated { briefing, elapsed })
    }

    /// Future dates have no news yet. Dates the storage would sweep on save
    /// are refused before anything is fetched or narrated.
    fn check_date(&self, date: NaiveDate, today: NaiveDate) -> Result<()> {
        if date > today {
            return Err(Error::InvalidInput(format!("{} is in the future", date)));
        }
        if let Some(cutoff) = self.storage.retention_cutoff(today) {
            if date < cutoff {
                return Err(Error::InvalidInput(format!(
                    "{} is older than the retention window (oldest kept: {})",
                    date, cutoff
                )));
            }
        }
        Ok(())
    }

    /// Narrates and stores one script. Any failure leaves the URL empty.
    async fn narrate(
        &self,
        narrator: &Narrator,
        script: &str,
        voice: &VoiceOptions,
        filename: &str,
    ) -> Option<String> {
        let narration = narrator.narrate(script, voice).await?;
        match self.storage.save_audio(filename, &narration.audio).await {
            Ok(url) => Some(url),
            Err(e) => {
                warn!("Failed to store {}: {}", filename, e);
                None
            }
        }
    }

    /// Generates each date in order. Existing dates are skipped and failures
    /// are recorded without stopping the batch.
    pub async fn generate_historical(&self, dates: &[NaiveDate]) -> Vec<HistoricalResult> {
        info!("📚 Historical generation for {} dates", dates.len());
        let mut results = Vec::with_capacity(dates.len());

        for (i, date) in dates.iter().enumerate() {
            let result = match self.generate(GenerateRequest::for_date(*date)).await {
                Ok(GenerateOutcome::Skipped(_)) => HistoricalResult {
                    date: *date,
                    status: HistoricalStatus::Skipped,
                    message: Some("Briefing already exists".to_string()),
                },
                Ok(GenerateOutcome::Generated { briefing, .. }) => HistoricalResult {
                    date: *date,
                    status: HistoricalStatus::Success,
                    message: Some(briefing.full_briefing.headline),
                },
                Err(e) => {
                    error!("❌ {}: {}", date, e);
                    HistoricalResult {
                        date: *date,
                        status: HistoricalStatus::Error,
                        message: Some(e.to_string()),
                    }
                }
            };

            let generated = result.status != HistoricalStatus::Skipped;
            results.push(result);
            if generated && i + 1 < dates.len() && !self.historical_pause.is_zero() {
                tokio::time::sleep(self.historical_pause).await;
            }
        }
        results
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{generator, FixedSource};
    use super::*;
    use async_trait::async_trait;
    use mb_core::{BriefingStorage, SpeechProvider};
    use mb_storage::backends::memory::MemoryStorage;
    use mb_storage::FileStorage;

    struct Beep;

    #[async_trait]
    impl SpeechProvider for Beep {
        fn name(&self) -> &str {
            "Beep"
        }

        async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
            Ok(text.as_bytes().to_vec())
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, d).unwrap()
    }

    #[tokio::test]
    async fn test_generate_builds_and_stores_briefing() {
        let storage = Arc::new(MemoryStorage::new());
        let source = FixedSource::sample();
        let generator = generator(source.clone(), storage.clone())
            .with_narrators(Narrator::silent().with_provider(Arc::new(Beep)), Narrator::silent());

        let outcome = generator.generate(GenerateRequest::for_date(day(5))).await.unwrap();
        assert!(!outcome.is_skipped());
        let briefing = outcome.briefing();
        assert_eq!(briefing.date, day(5));
        assert_eq!(briefing.category_briefs.len(), 2);
        assert_eq!(briefing.category_briefs[0].topic, Topic::China);
        assert_eq!(briefing.stories.len(), 3);
        // premium source ranks first within the topic
        assert_eq!(briefing.category_briefs[0].stories[0].source_url, "c1");
        assert_eq!(briefing.meta.category_counts.get(&Topic::China), Some(&2));
        assert_eq!(briefing.full_briefing.audio_url.as_deref(), Some("/audio/2026-01-05-full.mp3"));
        assert!(briefing.category_briefs.iter().all(|b| b.audio_url.is_none()));

        assert!(storage.get_audio("2026-01-05-full.mp3").await.unwrap().is_some());
        assert_eq!(storage.get_briefing(day(5)).await.unwrap().as_ref(), Some(briefing));
        assert_eq!(source.fetches(), 1);
    }

    #[tokio::test]
    async fn test_existing_date_short_circuits_without_fetching() {
        let storage = Arc::new(MemoryStorage::new());
        let source = FixedSource::sample();
        let generator = generator(source.clone(), storage);

        generator.generate(GenerateRequest::for_date(day(6))).await.unwrap();
        let again = generator.generate(GenerateRequest::for_date(day(6))).await.unwrap();
        assert!(again.is_skipped());
        assert_eq!(source.fetches(), 1);

        let forced = generator
            .generate(GenerateRequest { date: Some(day(6)), force: true, ..Default::default() })
            .await
            .unwrap();
        assert!(!forced.is_skipped());
        assert_eq!(source.fetches(), 2);
    }

    #[tokio::test]
    async fn test_no_articles_is_an_error() {
        let storage = Arc::new(MemoryStorage::new());
        let generator = generator(FixedSource::new(vec![]), storage.clone());

        let result = generator.generate(GenerateRequest::for_date(day(7))).await;
        assert!(matches!(result, Err(Error::NoArticles)));
        assert!(storage.list_dates().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_category_narration_failure_leaves_url_empty() {
        let storage = Arc::new(MemoryStorage::new());
        let generator = generator(FixedSource::sample(), storage)
            .with_narrators(Narrator::silent(), Narrator::silent().with_provider(Arc::new(Beep)));

        let outcome = generator.generate(GenerateRequest::for_date(day(8))).await.unwrap();
        let briefing = outcome.briefing();
        assert!(briefing.full_briefing.audio_url.is_none());
        assert_eq!(
            briefing.category_briefs[1].audio_url.as_deref(),
            Some("/audio/2026-01-08-economy.mp3")
        );
    }

    #[tokio::test]
    async fn test_historical_batch_reports_each_date() {
        let storage = Arc::new(MemoryStorage::new());
        let generator = generator(FixedSource::sample(), storage);
        generator.generate(GenerateRequest::for_date(day(2))).await.unwrap();

        let dates = date_range(day(1), day(3)).unwrap();
        let results = generator.generate_historical(&dates).await;
        let statuses: Vec<HistoricalStatus> = results.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![HistoricalStatus::Success, HistoricalStatus::Skipped, HistoricalStatus::Success]
        );
    }

    #[tokio::test]
    async fn test_future_date_is_rejected_without_fetching() {
        let storage = Arc::new(MemoryStorage::new());
        let source = FixedSource::sample();
        let generator = generator(source.clone(), storage.clone());
        let future = Utc::now().date_naive() + chrono::Duration::days(5);

        let result = generator.generate(GenerateRequest::for_date(future)).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
        let results = generator.generate_historical(&[future]).await;
        assert_eq!(results[0].status, HistoricalStatus::Error);
        assert_eq!(source.fetches(), 0);
        assert!(!storage.has_briefing(future).await.unwrap());
    }

    #[tokio::test]
    async fn test_dates_past_file_retention_are_rejected_without_fetching() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(FileStorage::new(temp_dir.path().to_path_buf()).await.unwrap());
        let source = FixedSource::sample();
        let generator = generator(source.clone(), storage.clone());
        let today = Utc::now().date_naive();
        let stale = today - chrono::Duration::days(45);

        let results = generator.generate_historical(&[stale]).await;
        assert_eq!(results[0].status, HistoricalStatus::Error);
        let rerun = generator.generate_historical(&[stale]).await;
        assert_eq!(rerun[0].status, HistoricalStatus::Error);
        assert_eq!(source.fetches(), 0);
        assert!(storage.list_dates().await.unwrap().is_empty());

        let recent = today - chrono::Duration::days(10);
        generator.generate(GenerateRequest::for_date(recent)).await.unwrap();
        assert_eq!(storage.list_dates().await.unwrap(), vec![recent]);
        assert_eq!(source.fetches(), 1);
    }

    #[test]
    fn test_date_range() {
        assert_eq!(date_range(day(30), day(30)).unwrap(), vec![day(30)]);
        assert_eq!(date_range(day(1), day(3)).unwrap().len(), 3);
        assert!(date_range(day(3), day(1)).is_err());
    }
}
