use std::sync::Arc;

use mb_core::SpeechProvider;
use tracing::{info, warn};

pub mod elevenlabs;
pub mod format;
pub mod narrator;
#[cfg(feature = "polly")]
pub mod polly;

pub use elevenlabs::{ElevenLabsConfig, ElevenLabsProvider, Usage, Voice};
pub use format::{escape_ssml, format_for_speech};
pub use narrator::{Narration, Narrator};

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub elevenlabs: ElevenLabsConfig,
    pub aws_region: Option<String>,
    /// Use Polly when the crate is built with the `polly` feature
    pub polly: bool,
}

/// The two chains used by a generation run.
#[derive(Clone, Default)]
pub struct Narrators {
    /// Full daily script: ElevenLabs first, Polly as the fallback
    pub full: Narrator,
    /// Category scripts: Polly only, to keep ElevenLabs credits for the full script
    pub category: Narrator,
    pub elevenlabs: Option<Arc<ElevenLabsProvider>>,
}

pub async fn build_narrators(config: Config) -> Narrators {
    let elevenlabs = match ElevenLabsProvider::new(config.elevenlabs) {
        Ok(provider) => Some(Arc::new(provider)),
        Err(e) => {
            warn!("ElevenLabs disabled: {}", e);
            None
        }
    };
    let polly = polly_provider(config.polly, config.aws_region).await;

    let mut full = Narrator::silent();
    if let Some(provider) = &elevenlabs {
        full = full.with_provider(provider.clone());
    }
    let mut category = Narrator::silent();
    if let Some(provider) = polly {
        full = full.with_provider(provider.clone());
        category = category.with_provider(provider);
    }

    info!(
        "🎙️ Narrators ready: full {:?}, category {:?}",
        full.provider_names(),
        category.provider_names()
    );
    Narrators { full, category, elevenlabs }
}

#[cfg(feature = "polly")]
async fn polly_provider(enabled: bool, region: Option<String>) -> Option<Arc<dyn SpeechProvider>> {
    if !enabled {
        return None;
    }
    Some(Arc::new(polly::PollyProvider::new(region).await))
}

#[cfg(not(feature = "polly"))]
async fn polly_provider(enabled: bool, _region: Option<String>) -> Option<Arc<dyn SpeechProvider>> {
    if enabled {
        warn!("Polly requested but mb_tts was built without the `polly` feature");
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_build_narrators_without_credentials() {
        let narrators = build_narrators(Config::default()).await;
        assert!(narrators.full.is_empty());
        assert!(narrators.category.is_empty());
        assert!(narrators.elevenlabs.is_none());
    }

    #[tokio::test]
    async fn test_elevenlabs_only_feeds_the_full_chain() {
        let narrators = build_narrators(Config {
            elevenlabs: ElevenLabsConfig {
                api_key: Some("xi".to_string()),
                ..ElevenLabsConfig::default()
            },
            ..Config::default()
        })
        .await;
        assert_eq!(narrators.full.provider_names(), vec!["ElevenLabs"]);
        assert!(narrators.category.is_empty());
        assert!(narrators.elevenlabs.is_some());
    }
}
