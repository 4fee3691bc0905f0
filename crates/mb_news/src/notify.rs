use std::sync::Arc;

use futures::future::join_all;
use mb_core::{PushDelivery, PushPayload, PushSender, Result, Storage};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PushReport {
    pub sent: usize,
    /// Includes expired endpoints
    pub failed: usize,
    pub expired: Vec<String>,
}

/// Fans one payload out to every stored push subscription.
pub struct PushNotifier {
    sender: Arc<dyn PushSender>,
    storage: Arc<dyn Storage>,
}

impl PushNotifier {
    pub fn new(sender: Arc<dyn PushSender>, storage: Arc<dyn Storage>) -> Self {
        Self { sender, storage }
    }

    /// All sends run concurrently and settle independently. Expired
    /// endpoints are removed from storage afterwards.
    pub async fn broadcast(&self, payload: &PushPayload) -> Result<PushReport> {
        let subscriptions = self.storage.push_subscriptions().await?;
        if subscriptions.is_empty() {
            info!("📭 No push subscriptions");
            return Ok(PushReport::default());
        }
        info!("📣 Sending push to {} subscribers", subscriptions.len());

        let deliveries = join_all(
            subscriptions
                .iter()
                .map(|subscription| self.sender.send(subscription, payload)),
        )
        .await;

        let mut report = PushReport::default();
        for (subscription, delivery) in subscriptions.iter().zip(deliveries) {
            match delivery {
                PushDelivery::Delivered => report.sent += 1,
                PushDelivery::Expired => {
                    report.failed += 1;
                    report.expired.push(subscription.endpoint.clone());
                }
                PushDelivery::Failed(reason) => {
                    report.failed += 1;
                    warn!("Push to {} failed: {}", short_endpoint(&subscription.endpoint), reason);
                }
            }
        }

        for endpoint in &report.expired {
            if let Err(e) = self.storage.remove_push_subscription(endpoint).await {
                warn!("Could not prune {}: {}", short_endpoint(endpoint), e);
            }
        }

        info!(
            "📬 Push complete: {} sent, {} failed, {} expired",
            report.sent,
            report.failed,
            report.expired.len()
        );
        Ok(report)
    }
}

fn short_endpoint(endpoint: &str) -> String {
    endpoint.chars().take(50).collect()
}

#[cfg(feature = "web-push")]
pub use self::web::{VapidConfig, WebPushSender};

#[cfg(feature = "web-push")]
mod web {
    use async_trait::async_trait;
    use mb_core::{Error, PushDelivery, PushPayload, PushSender, PushSubscription, Result};
    use web_push::{
        ContentEncoding, IsahcWebPushClient, SubscriptionInfo, VapidSignatureBuilder,
        WebPushClient, WebPushMessageBuilder,
    };

    const TTL_SECONDS: u32 = 60 * 60;

    #[derive(Debug, Clone)]
    pub struct VapidConfig {
        pub public_key: String,
        /// URL-safe base64 private key, as printed by the usual VAPID generators
        pub private_key: String,
        pub subject: String,
    }

    pub struct WebPushSender {
        vapid: VapidConfig,
        client: IsahcWebPushClient,
    }

    impl WebPushSender {
        pub fn new(vapid: VapidConfig) -> Result<Self> {
            let client = IsahcWebPushClient::new()
                .map_err(|e| Error::Notification(format!("push client: {}", e)))?;
            Ok(Self { vapid, client })
        }

        async fn deliver(
            &self,
            subscription: &PushSubscription,
            body: &[u8],
        ) -> std::result::Result<(), web_push::WebPushError> {
            let info = SubscriptionInfo::new(
                &subscription.endpoint,
                &subscription.keys.p256dh,
                &subscription.keys.auth,
            );
            let mut signature = VapidSignatureBuilder::from_base64(&self.vapid.private_key, &info)?;
            signature.add_claim("sub", self.vapid.subject.as_str());

            let mut message = WebPushMessageBuilder::new(&info);
            message.set_payload(ContentEncoding::Aes128Gcm, body);
            message.set_vapid_signature(signature.build()?);
            message.set_ttl(TTL_SECONDS);
            self.client.send(message.build()?).await
        }
    }

    #[async_trait]
    impl PushSender for WebPushSender {
        async fn send(&self, subscription: &PushSubscription, payload: &PushPayload) -> PushDelivery {
            let body = match payload_body(payload) {
                Ok(body) => body,
                Err(failed) => return failed,
            };
            match self.deliver(subscription, &body).await {
                Ok(()) => PushDelivery::Delivered,
                Err(e) => match e.short_description() {
                    "endpoint_not_valid" | "endpoint_not_found" => PushDelivery::Expired,
                    _ => PushDelivery::Failed(e.to_string()),
                },
            }
        }
    }

    fn payload_body(payload: &PushPayload) -> std::result::Result<Vec<u8>, PushDelivery> {
        serde_json::to_vec(payload).map_err(|e| PushDelivery::Failed(format!("payload: {}", e)))
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mb_core::{PushKeys, PushSubscription, SubscriberStorage};
    use mb_storage::backends::memory::MemoryStorage;
    use std::sync::Mutex;

    /// Decides delivery by endpoint suffix.
    #[derive(Default)]
    struct ScriptedSender {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PushSender for ScriptedSender {
        async fn send(&self, subscription: &PushSubscription, payload: &PushPayload) -> PushDelivery {
            self.seen.lock().unwrap().push(payload.title.clone());
            if subscription.endpoint.ends_with("gone") {
                PushDelivery::Expired
            } else if subscription.endpoint.ends_with("flaky") {
                PushDelivery::Failed("503".to_string())
            } else {
                PushDelivery::Delivered
            }
        }
    }

    fn subscription(endpoint: &str) -> PushSubscription {
        PushSubscription {
            endpoint: endpoint.to_string(),
            keys: PushKeys { p256dh: "p".to_string(), auth: "a".to_string() },
        }
    }

    #[tokio::test]
    async fn test_broadcast_counts_and_prunes_expired() {
        let storage = Arc::new(MemoryStorage::new());
        for endpoint in ["https://push/1", "https://push/2-gone", "https://push/3-flaky", "https://push/4"] {
            storage.save_push_subscription(&subscription(endpoint)).await.unwrap();
        }
        let sender = Arc::new(ScriptedSender::default());
        let notifier = PushNotifier::new(sender.clone(), storage.clone());

        let report = notifier
            .broadcast(&PushPayload::daily_briefing(Some("Markets rally")))
            .await
            .unwrap();
        assert_eq!(report.sent, 2);
        assert_eq!(report.failed, 2);
        assert_eq!(report.expired, vec!["https://push/2-gone".to_string()]);
        assert_eq!(sender.seen.lock().unwrap().len(), 4);

        let remaining = storage.push_subscriptions().await.unwrap();
        assert_eq!(remaining.len(), 3);
        assert!(remaining.iter().all(|s| !s.endpoint.ends_with("gone")));
    }

    #[tokio::test]
    async fn test_broadcast_without_subscribers() {
        let storage = Arc::new(MemoryStorage::new());
        let sender = Arc::new(ScriptedSender::default());
        let notifier = PushNotifier::new(sender.clone(), storage);

        let report = notifier.broadcast(&PushPayload::daily_briefing(None)).await.unwrap();
        assert_eq!(report, PushReport::default());
        assert!(sender.seen.lock().unwrap().is_empty());
    }
}
