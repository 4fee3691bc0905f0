use std::fmt;

use mb_core::{Error, LanguageModel, Result};

/// Declines every prompt so callers take their text fallbacks.
#[derive(Default)]
pub struct OfflineModel;

impl fmt::Debug for OfflineModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OfflineModel").finish()
    }
}

impl OfflineModel {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl LanguageModel for OfflineModel {
    fn name(&self) -> &str {
        "Offline"
    }

    async fn complete(&self, _prompt: &str, _max_tokens: u32) -> Result<String> {
        Err(Error::Inference("offline model does not generate text".to_string()))
    }
}
