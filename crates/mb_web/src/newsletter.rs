use async_trait::async_trait;
use lazy_static::lazy_static;
use mb_core::{Error, Result};
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

pub const BEEHIIV_BASE_URL: &str = "https://api.beehiiv.com/v2";

const UTM_SOURCE: &str = "morning_brief_app";
const UTM_MEDIUM: &str = "website";
const UTM_CAMPAIGN: &str = "newsletter_signup";

lazy_static! {
    static ref EMAIL: Regex = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL.is_match(email)
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignupOutcome {
    Subscribed,
    AlreadySubscribed,
}

/// An external mailing-list platform.
#[async_trait]
pub trait NewsletterProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn subscribe(&self, email: &str) -> Result<SignupOutcome>;
}

#[derive(Debug, Clone, Default)]
pub struct BeehiivConfig {
    pub api_key: Option<String>,
    pub publication_id: Option<String>,
    pub base_url: Option<String>,
}

pub struct BeehiivClient {
    client: Client,
    api_key: String,
    publication_id: String,
    base_url: String,
}

#[derive(Serialize)]
struct SubscribeRequest<'a> {
    email: &'a str,
    reactivate_existing: bool,
    send_welcome_email: bool,
    utm_source: &'a str,
    utm_medium: &'a str,
    utm_campaign: &'a str,
}

#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<ErrorItem>,
    message: Option<String>,
}

#[derive(Deserialize)]
struct ErrorItem {
    message: String,
}

impl ErrorBody {
    fn first_message(self) -> Option<String> {
        self.errors.into_iter().next().map(|e| e.message).or(self.message)
    }
}

impl BeehiivClient {
    pub fn new(config: BeehiivConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::NotConfigured("BEEHIIV_API_KEY".to_string()))?;
        let publication_id = config
            .publication_id
            .filter(|p| !p.is_empty())
            .ok_or_else(|| Error::NotConfigured("BEEHIIV_PUBLICATION_ID".to_string()))?;

        Ok(Self {
            client: Client::new(),
            api_key,
            publication_id,
            base_url: config
                .base_url
                .unwrap_or_else(|| BEEHIIV_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        })
    }
}

fn is_already_subscribed(message: &str) -> bool {
    let lowered = message.to_lowercase();
    lowered.contains("already") || lowered.contains("exists")
}

#[async_trait]
impl NewsletterProvider for BeehiivClient {
    fn name(&self) -> &str {
        "Beehiiv"
    }

    async fn subscribe(&self, email: &str) -> Result<SignupOutcome> {
        let url = format!(
            "{}/publications/{}/subscriptions",
            self.base_url, self.publication_id
        );
        let request = SubscribeRequest {
            email,
            reactivate_existing: true,
            send_welcome_email: true,
            utm_source: UTM_SOURCE,
            utm_medium: UTM_MEDIUM,
            utm_campaign: UTM_CAMPAIGN,
        };

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            info!("📨 Beehiiv subscriber added: {}", email);
            return Ok(SignupOutcome::Subscribed);
        }

        let message = response
            .json::<ErrorBody>()
            .await
            .unwrap_or_default()
            .first_message()
            .unwrap_or_else(|| format!("Beehiiv returned {}", status));
        if is_already_subscribed(&message) {
            return Ok(SignupOutcome::AlreadySubscribed);
        }
        error!("Beehiiv signup failed: {}", message);
        Err(Error::Notification(message))
    }
}
