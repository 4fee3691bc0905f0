use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_polly::config::Region;
use aws_sdk_polly::types::{Engine, OutputFormat, TextType, VoiceId};
use aws_sdk_polly::Client;
use mb_core::{Error, Result, SpeechProvider};
use tracing::debug;

use crate::format::escape_ssml;

pub const DEFAULT_REGION: &str = "us-east-1";

/// Amazon Polly, neural Joanna in the newscaster domain. Credentials come
/// from the standard AWS provider chain.
#[derive(Debug, Clone)]
pub struct PollyProvider {
    client: Client,
}

impl PollyProvider {
    pub async fn new(region: Option<String>) -> Self {
        let region = region.unwrap_or_else(|| DEFAULT_REGION.to_string());
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region))
            .load()
            .await;
        Self { client: Client::new(&config) }
    }
}

pub fn newscaster_ssml(text: &str) -> String {
    format!(
        "<speak><amazon:domain name=\"news\">{}</amazon:domain></speak>",
        escape_ssml(text)
    )
}

#[async_trait]
impl SpeechProvider for PollyProvider {
    fn name(&self) -> &str {
        "Polly"
    }

    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .synthesize_speech()
            .text(newscaster_ssml(text))
            .text_type(TextType::Ssml)
            .output_format(OutputFormat::Mp3)
            .voice_id(VoiceId::Joanna)
            .engine(Engine::Neural)
            .sample_rate("24000")
            .send()
            .await
            .map_err(|e| Error::Speech(format!("Polly request failed: {}", e)))?;

        let audio = response
            .audio_stream
            .collect()
            .await
            .map_err(|e| Error::Speech(format!("Polly stream failed: {}", e)))?
            .into_bytes()
            .to_vec();
        debug!(bytes = audio.len(), "Polly audio received");
        Ok(audio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newscaster_ssml_escapes_text() {
        assert_eq!(
            newscaster_ssml("R&D up"),
            "<speak><amazon:domain name=\"news\">R&amp;D up</amazon:domain></speak>"
        );
    }
}
