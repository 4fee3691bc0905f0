use std::sync::Arc;

use mb_core::{SpeechProvider, VoiceOptions};
use tracing::{info, warn};

use crate::format::format_for_speech;

#[derive(Debug, Clone, PartialEq)]
pub struct Narration {
    pub audio: Vec<u8>,
    pub provider: String,
}

/// Ordered provider chain. The first provider that returns audio wins; a
/// script is never split across providers.
#[derive(Clone, Default)]
pub struct Narrator {
    providers: Vec<Arc<dyn SpeechProvider>>,
}

impl Narrator {
    pub fn new(providers: Vec<Arc<dyn SpeechProvider>>) -> Self {
        Self { providers }
    }

    pub fn silent() -> Self {
        Self::default()
    }

    pub fn with_provider(mut self, provider: Arc<dyn SpeechProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub async fn narrate(&self, script: &str, options: &VoiceOptions) -> Option<Narration> {
        let text = format_for_speech(script);
        if text.is_empty() {
            return None;
        }

        for provider in &self.providers {
            match provider.synthesize_with(&text, options).await {
                Ok(audio) if !audio.is_empty() => {
                    info!("🔊 {} produced {} bytes", provider.name(), audio.len());
                    return Some(Narration {
                        audio,
                        provider: provider.name().to_string(),
                    });
                }
                Ok(_) => warn!("{} returned empty audio", provider.name()),
                Err(e) => warn!("{} failed: {}", provider.name(), e),
            }
        }
        None
    }
}
