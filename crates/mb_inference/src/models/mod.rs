use std::sync::Arc;

use mb_core::{Error, LanguageModel, Result};
use tracing::info;

use crate::Config;

pub mod anthropic;
pub mod offline;

pub use anthropic::AnthropicModel;
pub use offline::OfflineModel;

pub fn create_model(config: Config) -> Result<Arc<dyn LanguageModel>> {
    let model: Arc<dyn LanguageModel> = match config.provider.to_lowercase().as_str() {
        "anthropic" => Arc::new(AnthropicModel::new(
            config.api_key,
            config.model_name,
            config.base_url,
        )?),
        "offline" => Arc::new(OfflineModel::new()),
        other => {
            return Err(Error::InvalidInput(format!(
                "Unknown model provider: {}. Available: anthropic, offline",
                other
            )))
        }
    };
    info!("🧠 Language model ready: {}", model.name());
    Ok(model)
}
