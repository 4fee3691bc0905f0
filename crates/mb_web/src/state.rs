use std::sync::Arc;

use mb_core::Storage;
use mb_news::{BriefingGenerator, PushNotifier};
use mb_tts::ElevenLabsProvider;

use crate::newsletter::NewsletterProvider;

pub struct AppState {
    pub generator: Arc<BriefingGenerator>,
    pub storage: Arc<dyn Storage>,
    pub notifier: Option<Arc<PushNotifier>>,
    pub vapid_public_key: Option<String>,
    pub elevenlabs: Option<Arc<ElevenLabsProvider>>,
    pub newsletter: Option<Arc<dyn NewsletterProvider>>,
    pub cron_secret: Option<String>,
    /// Falls back to `cron_secret` when unset
    pub admin_secret: Option<String>,
}

impl AppState {
    pub fn new(generator: Arc<BriefingGenerator>) -> Self {
        let storage = generator.storage().clone();
        Self {
            generator,
            storage,
            notifier: None,
            vapid_public_key: None,
            elevenlabs: None,
            newsletter: None,
            cron_secret: None,
            admin_secret: None,
        }
    }

    pub fn with_push(mut self, notifier: Arc<PushNotifier>, vapid_public_key: String) -> Self {
        self.notifier = Some(notifier);
        self.vapid_public_key = Some(vapid_public_key);
        self
    }

    pub fn with_elevenlabs(mut self, provider: Arc<ElevenLabsProvider>) -> Self {
        self.elevenlabs = Some(provider);
        self
    }

    pub fn with_newsletter(mut self, provider: Arc<dyn NewsletterProvider>) -> Self {
        self.newsletter = Some(provider);
        self
    }

    pub fn with_secrets(mut self, cron: Option<String>, admin: Option<String>) -> Self {
        self.cron_secret = cron.filter(|s| !s.is_empty());
        self.admin_secret = admin.filter(|s| !s.is_empty());
        self
    }

    pub fn admin_secret(&self) -> Option<&str> {
        self.admin_secret.as_deref().or(self.cron_secret.as_deref())
    }

    pub fn push_configured(&self) -> bool {
        self.notifier.is_some() && self.vapid_public_key.is_some()
    }
}
