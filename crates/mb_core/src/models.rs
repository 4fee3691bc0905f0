use async_trait::async_trait;
use crate::Result;

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Short provider name for logs
    fn name(&self) -> &str;

    /// Send a single prompt and return the text of the reply
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String>;
}
