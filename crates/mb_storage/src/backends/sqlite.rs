use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use mb_core::storage::{audio_url, is_valid_audio_name};
use mb_core::{
    Briefing, BriefingStorage, Error, PushKeys, PushSubscription, Result, Subscriber,
    SubscriberStorage,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool};
use sqlx::Row;

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS briefings (
        date TEXT PRIMARY KEY,
        headline TEXT NOT NULL,
        document TEXT NOT NULL,
        generated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS audio (
        filename TEXT PRIMARY KEY,
        data BLOB NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS subscribers (
        email TEXT PRIMARY KEY,
        active INTEGER NOT NULL,
        subscribed_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS push_subscriptions (
        endpoint TEXT PRIMARY KEY,
        p256dh TEXT NOT NULL,
        auth TEXT NOT NULL
    )
    "#,
];

fn db_error(context: &str, e: sqlx::Error) -> Error {
    Error::Storage(format!("{}: {}", context, e))
}

fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub struct SQLiteStorage {
    pool: Arc<SqlitePool>,
    db_path: PathBuf,
}

impl SQLiteStorage {
    pub async fn new_with_path(db_path: &PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(|e| db_error("Failed to connect to database", e))?;

        for (i, migration) in MIGRATIONS.iter().enumerate() {
            sqlx::query(migration)
                .execute(&pool)
                .await
                .map_err(|e| db_error(&format!("Failed to run migration {}", i), e))?;
        }

        Ok(Self {
            pool: Arc::new(pool),
            db_path: db_path.clone(),
        })
    }

    pub fn get_db_path(&self) -> &PathBuf {
        &self.db_path
    }
}

#[async_trait]
impl BriefingStorage for SQLiteStorage {
    async fn save_briefing(&self, briefing: &Briefing) -> Result<()> {
        let document = serde_json::to_string(briefing)?;

        sqlx::query(
            r#"
            INSERT INTO briefings (date, headline, document, generated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(date) DO UPDATE SET
                headline = excluded.headline,
                document = excluded.document,
                generated_at = excluded.generated_at
            "#,
        )
        .bind(date_key(briefing.date))
        .bind(&briefing.full_briefing.headline)
        .bind(document)
        .bind(briefing.generated_at.to_rfc3339())
        .execute(&*self.pool)
        .await
        .map_err(|e| db_error("Failed to store briefing", e))?;

        Ok(())
    }

    async fn get_briefing(&self, date: NaiveDate) -> Result<Option<Briefing>> {
        let row = sqlx::query("SELECT document FROM briefings WHERE date = ?")
            .bind(date_key(date))
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| db_error("Failed to load briefing", e))?;

        match row {
            Some(row) => {
                let document: String = row.get("document");
                Ok(Some(serde_json::from_str(&document)?))
            }
            None => Ok(None),
        }
    }

    async fn list_dates(&self) -> Result<Vec<NaiveDate>> {
        let rows = sqlx::query("SELECT date FROM briefings ORDER BY date DESC")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| db_error("Failed to list dates", e))?;

        rows.into_iter()
            .map(|row| {
                let date: String = row.get("date");
                NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                    .map_err(|e| Error::Storage(format!("Failed to parse date {}: {}", date, e)))
            })
            .collect()
    }

    async fn save_audio(&self, filename: &str, data: &[u8]) -> Result<String> {
        if !is_valid_audio_name(filename) {
            return Err(Error::InvalidInput(format!("Invalid audio file name: {}", filename)));
        }
        sqlx::query(
            r#"
            INSERT INTO audio (filename, data) VALUES (?, ?)
            ON CONFLICT(filename) DO UPDATE SET data = excluded.data
            "#,
        )
        .bind(filename)
        .bind(data)
        .execute(&*self.pool)
        .await
        .map_err(|e| db_error("Failed to store audio", e))?;

        Ok(audio_url(filename))
    }

    async fn get_audio(&self, filename: &str) -> Result<Option<Vec<u8>>> {
        let row = sqlx::query("SELECT data FROM audio WHERE filename = ?")
            .bind(filename)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| db_error("Failed to load audio", e))?;
        Ok(row.map(|row| row.get::<Vec<u8>, _>("data")))
    }

    async fn purge_before(&self, cutoff: NaiveDate) -> Result<usize> {
        let key = date_key(cutoff);
        let result = sqlx::query("DELETE FROM briefings WHERE date < ?")
            .bind(&key)
            .execute(&*self.pool)
            .await
            .map_err(|e| db_error("Failed to purge briefings", e))?;

        // audio names start with their date, so a lexical compare on the prefix works
        sqlx::query("DELETE FROM audio WHERE filename GLOB '[0-9][0-9][0-9][0-9]-[0-9][0-9]-[0-9][0-9]*' AND substr(filename, 1, 10) < ?")
            .bind(&key)
            .execute(&*self.pool)
            .await
            .map_err(|e| db_error("Failed to purge audio", e))?;

        Ok(result.rows_affected() as usize)
    }
}

#[async_trait]
impl SubscriberStorage for SQLiteStorage {
    async fn add_subscriber(&self, email: &str) -> Result<Subscriber> {
        sqlx::query(
            r#"
            INSERT INTO subscribers (email, active, subscribed_at) VALUES (?, 1, ?)
            ON CONFLICT(email) DO UPDATE SET active = 1
            "#,
        )
        .bind(email)
        .bind(Utc::now().to_rfc3339())
        .execute(&*self.pool)
        .await
        .map_err(|e| db_error("Failed to store subscriber", e))?;

        let row = sqlx::query("SELECT email, active, subscribed_at FROM subscribers WHERE email = ?")
            .bind(email)
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| db_error("Failed to load subscriber", e))?;
        subscriber_from_row(&row)
    }

    async fn active_subscribers(&self) -> Result<Vec<Subscriber>> {
        let rows = sqlx::query(
            "SELECT email, active, subscribed_at FROM subscribers WHERE active = 1 ORDER BY email",
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| db_error("Failed to list subscribers", e))?;
        rows.iter().map(subscriber_from_row).collect()
    }

    async fn save_push_subscription(&self, subscription: &PushSubscription) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO push_subscriptions (endpoint, p256dh, auth) VALUES (?, ?, ?)
            ON CONFLICT(endpoint) DO UPDATE SET p256dh = excluded.p256dh, auth = excluded.auth
            "#,
        )
        .bind(&subscription.endpoint)
        .bind(&subscription.keys.p256dh)
        .bind(&subscription.keys.auth)
        .execute(&*self.pool)
        .await
        .map_err(|e| db_error("Failed to store push subscription", e))?;
        Ok(())
    }

    async fn remove_push_subscription(&self, endpoint: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM push_subscriptions WHERE endpoint = ?")
            .bind(endpoint)
            .execute(&*self.pool)
            .await
            .map_err(|e| db_error("Failed to remove push subscription", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn push_subscriptions(&self) -> Result<Vec<PushSubscription>> {
        let rows = sqlx::query("SELECT endpoint, p256dh, auth FROM push_subscriptions")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| db_error("Failed to list push subscriptions", e))?;
        Ok(rows
            .into_iter()
            .map(|row| PushSubscription {
                endpoint: row.get("endpoint"),
                keys: PushKeys {
                    p256dh: row.get("p256dh"),
                    auth: row.get("auth"),
                },
            })
            .collect())
    }
}

fn subscriber_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Subscriber> {
    let subscribed_at: String = row.get("subscribed_at");
    Ok(Subscriber {
        email: row.get("email"),
        active: row.get::<i64, _>("active") != 0,
        subscribed_at: DateTime::parse_from_rfc3339(&subscribed_at)
            .map_err(|e| Error::Storage(format!("Failed to parse date: {}", e)))?
            .with_timezone(&Utc),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_briefing;
    use tempfile::tempdir;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, d).unwrap()
    }

    #[tokio::test]
    async fn test_sqlite_upsert_by_date() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let storage = SQLiteStorage::new_with_path(&db_path).await.unwrap();

        storage.save_briefing(&sample_briefing(day(1), "first")).await.unwrap();
        storage.save_briefing(&sample_briefing(day(1), "second")).await.unwrap();
        storage.save_briefing(&sample_briefing(day(2), "other")).await.unwrap();

        assert_eq!(storage.list_dates().await.unwrap(), vec![day(2), day(1)]);
        let stored = storage.get_briefing(day(1)).await.unwrap().unwrap();
        assert_eq!(stored.full_briefing.headline, "second");
    }

    #[tokio::test]
    async fn test_sqlite_purge_and_audio() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let storage = SQLiteStorage::new_with_path(&db_path).await.unwrap();

        storage.save_briefing(&sample_briefing(day(1), "old")).await.unwrap();
        storage.save_briefing(&sample_briefing(day(20), "new")).await.unwrap();
        storage.save_audio("2026-02-01-full.mp3", b"old").await.unwrap();
        storage.save_audio("2026-02-20-full.mp3", b"new").await.unwrap();

        assert_eq!(storage.purge_before(day(10)).await.unwrap(), 1);
        assert!(storage.get_audio("2026-02-01-full.mp3").await.unwrap().is_none());
        assert_eq!(
            storage.get_audio("2026-02-20-full.mp3").await.unwrap(),
            Some(b"new".to_vec())
        );
    }

    #[tokio::test]
    async fn test_sqlite_subscribers() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let storage = SQLiteStorage::new_with_path(&db_path).await.unwrap();

        storage.add_subscriber("a@example.com").await.unwrap();
        storage.add_subscriber("a@example.com").await.unwrap();
        assert_eq!(storage.active_subscribers().await.unwrap().len(), 1);

        let sub = PushSubscription {
            endpoint: "https://push.example/1".to_string(),
            keys: PushKeys { p256dh: "p".to_string(), auth: "a".to_string() },
        };
        storage.save_push_subscription(&sub).await.unwrap();
        assert_eq!(storage.push_subscriptions().await.unwrap(), vec![sub.clone()]);
        assert!(storage.remove_push_subscription(&sub.endpoint).await.unwrap());
    }
}
