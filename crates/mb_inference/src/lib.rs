pub mod models;
pub mod summarize;

pub const DEFAULT_MODEL: &str = "claude-3-haiku-20240307";

#[derive(Debug, Clone)]
pub struct Config {
    /// `anthropic` or `offline`
    pub provider: String,
    pub api_key: Option<String>,
    pub model_name: Option<String>,
    pub base_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            api_key: None,
            model_name: None,
            base_url: None,
        }
    }
}

pub mod prelude {
    pub use super::Config;
    pub use super::models::create_model;
    pub use super::summarize::{BriefingDraft, Summarizer};
    pub use mb_core::{LanguageModel, Result, Error};
}

pub use models::create_model;
pub use summarize::{estimate_duration, BriefingDraft, Summarizer};

#[cfg(test)]
mod tests {
    use super::*;
    use mb_core::LanguageModel;

    #[tokio::test]
    async fn test_create_model_by_name() {
        let model = create_model(Config {
            provider: "offline".to_string(),
            ..Config::default()
        })
        .unwrap();
        assert_eq!(model.name(), "Offline");

        let missing_key = create_model(Config::default());
        assert!(missing_key.is_err());

        let unknown = create_model(Config {
            provider: "gpt".to_string(),
            ..Config::default()
        });
        assert!(unknown.is_err());
    }
}
