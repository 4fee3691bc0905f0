use chrono::NaiveDate;
use mb_core::{PushPayload, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::generator::{BriefingGenerator, GenerateOutcome, GenerateRequest};
use crate::notify::{PushNotifier, PushReport};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyReport {
    pub date: NaiveDate,
    pub skipped: bool,
    pub headline: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time: Option<String>,
    pub push: Option<PushReport>,
}

/// Today's scheduled run: generate if missing, then announce the new
/// briefing. An existing briefing is neither regenerated nor announced again.
pub async fn run_daily(
    generator: &BriefingGenerator,
    notifier: Option<&PushNotifier>,
) -> Result<DailyReport> {
    let outcome = generator.generate(GenerateRequest::today()).await?;
    let briefing = outcome.briefing();

    let (skipped, processing_time) = match &outcome {
        GenerateOutcome::Skipped(_) => (true, None),
        GenerateOutcome::Generated { elapsed, .. } => {
            (false, Some(format!("{:.1}s", elapsed.as_secs_f64())))
        }
    };

    let push = match notifier {
        Some(notifier) if !skipped => {
            let payload = PushPayload::daily_briefing(Some(&briefing.full_briefing.headline));
            match notifier.broadcast(&payload).await {
                Ok(report) => Some(report),
                Err(e) => {
                    warn!("Push broadcast failed: {}", e);
                    None
                }
            }
        }
        Some(_) => None,
        None => {
            info!("🔕 Push not configured, skipping notifications");
            None
        }
    };

    Ok(DailyReport {
        date: briefing.date,
        skipped,
        headline: briefing.full_briefing.headline.clone(),
        processing_time,
        push,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::test_support::{generator, FixedSource};
    use async_trait::async_trait;
    use mb_core::{PushDelivery, PushKeys, PushSender, PushSubscription, SubscriberStorage};
    use mb_storage::backends::memory::MemoryStorage;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct CountingSender(AtomicUsize);

    #[async_trait]
    impl PushSender for CountingSender {
        async fn send(&self, _: &PushSubscription, _: &PushPayload) -> PushDelivery {
            self.0.fetch_add(1, Ordering::SeqCst);
            PushDelivery::Delivered
        }
    }

    #[tokio::test]
    async fn test_daily_pushes_once_per_new_briefing() {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .save_push_subscription(&PushSubscription {
                endpoint: "https://push/1".to_string(),
                keys: PushKeys { p256dh: "p".to_string(), auth: "a".to_string() },
            })
            .await
            .unwrap();
        let sender = Arc::new(CountingSender::default());
        let notifier = PushNotifier::new(sender.clone(), storage.clone());
        let generator = generator(FixedSource::sample(), storage);

        let first = run_daily(&generator, Some(&notifier)).await.unwrap();
        assert!(!first.skipped);
        assert_eq!(first.push.as_ref().map(|p| p.sent), Some(1));
        assert!(first.processing_time.is_some());

        let second = run_daily(&generator, Some(&notifier)).await.unwrap();
        assert!(second.skipped);
        assert!(second.push.is_none());
        assert_eq!(second.headline, first.headline);
        assert_eq!(sender.0.load(Ordering::SeqCst), 1);
    }
}
