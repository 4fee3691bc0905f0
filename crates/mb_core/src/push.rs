use async_trait::async_trait;
use crate::types::{PushDelivery, PushPayload, PushSubscription};

#[async_trait]
pub trait PushSender: Send + Sync {
    /// Deliver one notification. Transport failures are reported in the
    /// returned `PushDelivery`, never as an error.
    async fn send(&self, subscription: &PushSubscription, payload: &PushPayload) -> PushDelivery;
}
