use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::Result;

/// Per-request voice overrides. Providers that have no notion of a voice
/// catalogue ignore them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VoiceOptions {
    pub voice: Option<String>,
    pub model: Option<String>,
}

#[async_trait]
pub trait SpeechProvider: Send + Sync {
    /// Short provider name for logs
    fn name(&self) -> &str;

    /// Synthesize a whole script into MP3 bytes
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>>;

    async fn synthesize_with(&self, text: &str, options: &VoiceOptions) -> Result<Vec<u8>> {
        let _ = options;
        self.synthesize(text).await
    }
}
