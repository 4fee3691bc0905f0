use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use mb_core::{Error, Result, SpeechProvider, VoiceOptions};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const DEFAULT_BASE_URL: &str = "https://api.elevenlabs.io/v1";

/// Named model presets. Flash and turbo bill half a credit per character.
pub const MODELS: [(&str, &str); 3] = [
    ("flash", "eleven_flash_v2_5"),
    ("multilingual", "eleven_multilingual_v2"),
    ("turbo", "eleven_turbo_v2_5"),
];

/// Named voice presets suited to news reading.
pub const VOICES: [(&str, &str); 5] = [
    ("george", "JBFqnCBsd6RMkjVDRZzb"),
    ("adam", "pNInz6obpgDQGcFmaJgB"),
    ("josh", "TxGEqnHWrfWFTfGW9XjX"),
    ("rachel", "21m00Tcm4TlvDq8ikWAM"),
    ("bella", "EXAVITQu4vr4xnSDxMaL"),
];

pub const DEFAULT_VOICE: &str = "JBFqnCBsd6RMkjVDRZzb";
pub const DEFAULT_MODEL: &str = "eleven_flash_v2_5";

/// Expected daily spend: one ~900 character full script on a half-credit model.
pub const DAILY_CREDITS: u64 = 450;

const DEFAULT_CHARACTER_LIMIT: u64 = 30_000;

/// Maps a preset name to its id; anything else is taken as a raw id.
pub fn resolve_voice(name_or_id: &str) -> String {
    lookup(&VOICES, name_or_id)
}

pub fn resolve_model(name_or_id: &str) -> String {
    lookup(&MODELS, name_or_id)
}

fn lookup(presets: &[(&str, &str)], key: &str) -> String {
    let lowered = key.to_lowercase();
    presets
        .iter()
        .find(|(name, _)| *name == lowered)
        .map(|(_, id)| id.to_string())
        .unwrap_or_else(|| key.to_string())
}

pub fn estimated_credits(text: &str, model_id: &str) -> u64 {
    let chars = text.chars().count() as u64;
    if model_id.contains("flash") || model_id.contains("turbo") {
        chars.div_ceil(2)
    } else {
        chars
    }
}

#[derive(Debug, Clone)]
pub struct ElevenLabsConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub voice_id: Option<String>,
    pub model_id: Option<String>,
    pub stability: f32,
    pub similarity_boost: f32,
    pub style: f32,
}

impl Default for ElevenLabsConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            voice_id: None,
            model_id: None,
            stability: 0.5,
            similarity_boost: 0.75,
            style: 0.3,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct VoiceSettings {
    stability: f32,
    similarity_boost: f32,
    style: f32,
    use_speaker_boost: bool,
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: &'a VoiceSettings,
}

#[derive(Deserialize)]
struct SubscriptionResponse {
    #[serde(default)]
    character_count: Option<u64>,
    #[serde(default)]
    character_limit: Option<u64>,
}

#[derive(Deserialize)]
struct VoicesResponse {
    #[serde(default)]
    voices: Vec<RawVoice>,
}

#[derive(Deserialize)]
struct RawVoice {
    voice_id: String,
    name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Voice {
    pub voice_id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    pub character_count: u64,
    pub character_limit: u64,
    pub remaining_characters: u64,
}

impl Usage {
    pub fn percent_used(&self) -> u64 {
        if self.character_limit == 0 {
            return 0;
        }
        (self.character_count as f64 / self.character_limit as f64 * 100.0).round() as u64
    }

    pub fn estimated_days_remaining(&self) -> u64 {
        self.remaining_characters / DAILY_CREDITS
    }
}

pub struct ElevenLabsProvider {
    client: Client,
    api_key: String,
    base_url: String,
    voice_id: String,
    model_id: String,
    settings: VoiceSettings,
}

impl fmt::Debug for ElevenLabsProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElevenLabsProvider")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("voice_id", &self.voice_id)
            .field("model_id", &self.model_id)
            .finish()
    }
}

impl ElevenLabsProvider {
    pub fn new(config: ElevenLabsConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::NotConfigured("ELEVENLABS_API_KEY not configured".to_string()))?;
        let client = Client::builder().timeout(Duration::from_secs(120)).build()?;
        Ok(Self {
            client,
            api_key,
            base_url: config
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            voice_id: config
                .voice_id
                .map(|v| resolve_voice(&v))
                .unwrap_or_else(|| DEFAULT_VOICE.to_string()),
            model_id: config
                .model_id
                .map(|m| resolve_model(&m))
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            settings: VoiceSettings {
                stability: config.stability,
                similarity_boost: config.similarity_boost,
                style: config.style,
                use_speaker_boost: true,
            },
        })
    }

    async fn speak(&self, text: &str, voice_id: &str, model_id: &str) -> Result<Vec<u8>> {
        info!(
            "🎙️ ElevenLabs: {} chars, ~{} credits",
            text.chars().count(),
            estimated_credits(text, model_id)
        );

        let response = self
            .client
            .post(format!("{}/text-to-speech/{}", self.base_url, voice_id))
            .header("xi-api-key", &self.api_key)
            .header("Accept", "audio/mpeg")
            .json(&SpeechRequest {
                text,
                model_id,
                voice_settings: &self.settings,
            })
            .send()
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED => {
                Err(Error::Speech("Invalid ElevenLabs API key".to_string()))
            }
            StatusCode::TOO_MANY_REQUESTS => Err(Error::Speech(
                "ElevenLabs rate limit or quota exceeded".to_string(),
            )),
            status if !status.is_success() => {
                let body = response.text().await.unwrap_or_default();
                Err(Error::Speech(format!("ElevenLabs returned {}: {}", status, body)))
            }
            _ => {
                let bytes = response.bytes().await?.to_vec();
                debug!(bytes = bytes.len(), "ElevenLabs audio received");
                Ok(bytes)
            }
        }
    }

    pub async fn usage(&self) -> Result<Usage> {
        let response = self
            .client
            .get(format!("{}/user/subscription", self.base_url))
            .header("xi-api-key", &self.api_key)
            .send()
            .await?
            .error_for_status()?
            .json::<SubscriptionResponse>()
            .await?;

        let character_count = response.character_count.unwrap_or(0);
        let character_limit = response
            .character_limit
            .filter(|l| *l > 0)
            .unwrap_or(DEFAULT_CHARACTER_LIMIT);
        Ok(Usage {
            character_count,
            character_limit,
            remaining_characters: character_limit.saturating_sub(character_count),
        })
    }

    pub async fn voices(&self) -> Result<Vec<Voice>> {
        let response = self
            .client
            .get(format!("{}/voices", self.base_url))
            .header("xi-api-key", &self.api_key)
            .send()
            .await?
            .error_for_status()?
            .json::<VoicesResponse>()
            .await?;

        Ok(response
            .voices
            .into_iter()
            .map(|v| Voice { voice_id: v.voice_id, name: v.name })
            .collect())
    }
}

#[async_trait]
impl SpeechProvider for ElevenLabsProvider {
    fn name(&self) -> &str {
        "ElevenLabs"
    }

    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        self.speak(text, &self.voice_id, &self.model_id).await
    }

    async fn synthesize_with(&self, text: &str, options: &VoiceOptions) -> Result<Vec<u8>> {
        let voice_id = options
            .voice
            .as_deref()
            .map(resolve_voice)
            .unwrap_or_else(|| self.voice_id.clone());
        let model_id = options
            .model
            .as_deref()
            .map(resolve_model)
            .unwrap_or_else(|| self.model_id.clone());
        self.speak(text, &voice_id, &model_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> ElevenLabsProvider {
        ElevenLabsProvider::new(ElevenLabsConfig {
            api_key: Some("xi-test".to_string()),
            base_url: Some(server.uri()),
            ..ElevenLabsConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_presets_and_credits() {
        assert_eq!(resolve_voice("Rachel"), "21m00Tcm4TlvDq8ikWAM");
        assert_eq!(resolve_voice("customVoiceId"), "customVoiceId");
        assert_eq!(resolve_model("turbo"), "eleven_turbo_v2_5");
        assert_eq!(estimated_credits("abc", DEFAULT_MODEL), 2);
        assert_eq!(estimated_credits("abc", "eleven_multilingual_v2"), 3);
        assert!(ElevenLabsProvider::new(ElevenLabsConfig::default()).is_err());
    }

    #[tokio::test]
    async fn test_synthesize_posts_voice_settings() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/text-to-speech/{}", DEFAULT_VOICE)))
            .and(header("xi-api-key", "xi-test"))
            .and(body_partial_json(serde_json::json!({
                "text": "Good morning.",
                "model_id": DEFAULT_MODEL,
                "voice_settings": {"use_speaker_boost": true}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ID3audio".to_vec()))
            .mount(&server)
            .await;

        let audio = provider(&server).synthesize("Good morning.").await.unwrap();
        assert_eq!(audio, b"ID3audio");
    }

    #[tokio::test]
    async fn test_synthesize_with_overrides_voice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/text-to-speech/pNInz6obpgDQGcFmaJgB"))
            .and(body_partial_json(serde_json::json!({"model_id": "eleven_multilingual_v2"})))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"adam".to_vec()))
            .mount(&server)
            .await;

        let options = VoiceOptions {
            voice: Some("adam".to_string()),
            model: Some("multilingual".to_string()),
        };
        let audio = provider(&server).synthesize_with("Hi", &options).await.unwrap();
        assert_eq!(audio, b"adam");
    }

    #[tokio::test]
    async fn test_error_statuses() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let provider = provider(&server);
        let first = provider.synthesize("a").await.unwrap_err();
        assert!(first.to_string().contains("Invalid ElevenLabs API key"));
        let second = provider.synthesize("a").await.unwrap_err();
        assert!(second.to_string().contains("quota"));
    }

    #[tokio::test]
    async fn test_usage_and_voices() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user/subscription"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "character_count": 7500,
                "character_limit": 30000
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/voices"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "voices": [{"voice_id": "v1", "name": "George", "category": "premade"}]
            })))
            .mount(&server)
            .await;

        let provider = provider(&server);
        let usage = provider.usage().await.unwrap();
        assert_eq!(usage.remaining_characters, 22_500);
        assert_eq!(usage.percent_used(), 25);
        assert_eq!(usage.estimated_days_remaining(), 50);

        let voices = provider.voices().await.unwrap();
        assert_eq!(voices, vec![Voice { voice_id: "v1".to_string(), name: "George".to_string() }]);
    }
}
