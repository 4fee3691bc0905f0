use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use mb_core::{Error, Result, Storage};

pub mod backends;

pub use backends::*;

/// Briefings and audio older than this many days are swept by the file backend.
pub const RETENTION_DAYS: i64 = 30;

pub fn retention_cutoff(today: NaiveDate) -> NaiveDate {
    today - Duration::days(RETENTION_DAYS)
}

/// Date encoded in the leading `YYYY-MM-DD` of an audio file name, if any.
pub fn audio_file_date(filename: &str) -> Option<NaiveDate> {
    filename
        .get(..10)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Memory,
    File,
    #[cfg(feature = "sqlite")]
    Sqlite,
}

impl FromStr for StorageKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "file" => Ok(Self::File),
            #[cfg(feature = "sqlite")]
            "sqlite" => Ok(Self::Sqlite),
            other => Err(Error::InvalidInput(format!("Unknown storage backend: {}", other))),
        }
    }
}

pub async fn create_storage(kind: StorageKind, location: Option<&str>) -> Result<Arc<dyn Storage>> {
    match kind {
        StorageKind::Memory => Ok(Arc::new(MemoryStorage::new())),
        StorageKind::File => {
            let root = PathBuf::from(location.unwrap_or("data"));
            Ok(Arc::new(FileStorage::new(root).await?))
        }
        #[cfg(feature = "sqlite")]
        StorageKind::Sqlite => {
            let path = PathBuf::from(location.unwrap_or("morning-brief.db"));
            Ok(Arc::new(SQLiteStorage::new_with_path(&path).await?))
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{NaiveDate, Utc};
    use mb_core::{Briefing, BriefingMeta, CategoryBrief, FullBriefing, Story, Topic};

    pub fn sample_briefing(date: NaiveDate, headline: &str) -> Briefing {
        let story = Story {
            id: "china-1".to_string(),
            article_id: "uuid-1".to_string(),
            title: "Beijing sets new targets".to_string(),
            summary: "A short summary.".to_string(),
            topic: Topic::China,
            topic_display: Topic::China.display_name().to_string(),
            source: "reuters.com".to_string(),
            source_url: "https://reuters.com/a".to_string(),
            image_url: None,
            published_at: Utc::now(),
        };
        let stories = vec![story];
        Briefing {
            date,
            generated_at: Utc::now(),
            full_briefing: FullBriefing {
                headline: headline.to_string(),
                script: "Good morning.".to_string(),
                audio_url: None,
                duration: "0:01".to_string(),
                story_count: 1,
            },
            category_briefs: vec![CategoryBrief {
                topic: Topic::China,
                display_name: Topic::China.display_name().to_string(),
                emoji: Topic::China.emoji().to_string(),
                headline: "China".to_string(),
                script: "Here's your China & Asia update.".to_string(),
                audio_url: None,
                story_count: 1,
                estimated_duration: "0:03".to_string(),
                stories: stories.clone(),
            }],
            meta: BriefingMeta::from_stories(&stories),
            stories,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_file_date() {
        assert_eq!(
            audio_file_date("2026-01-11-full.mp3"),
            NaiveDate::from_ymd_opt(2026, 1, 11)
        );
        assert_eq!(audio_file_date("intro.mp3"), None);
        assert_eq!(audio_file_date("x"), None);
    }

    #[test]
    fn test_retention_cutoff() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        assert_eq!(retention_cutoff(today), NaiveDate::from_ymd_opt(2026, 1, 30).unwrap());
    }

    #[test]
    fn test_storage_kind_parse() {
        assert_eq!("memory".parse::<StorageKind>().unwrap(), StorageKind::Memory);
        assert_eq!("FILE".parse::<StorageKind>().unwrap(), StorageKind::File);
        assert!("qdrant".parse::<StorageKind>().is_err());
    }
}
