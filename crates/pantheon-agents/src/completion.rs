use async_trait::async_trait;

use crate::error::AgentError;

/// Text-in/text-out completion service. Mockable for testing.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    fn name(&self) -> &str;

    /// Send one prompt and return the raw reply text.
    async fn complete(&self, prompt: &str) -> Result<String, AgentError>;
}
