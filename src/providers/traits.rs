use super::response::{ChatMessage, ProviderResponse};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Description of a virtual tool for the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON schema for the tool's parameters.
    pub parameters: serde_json::Value,
}

/// A chat completion backend.
///
/// Implementations must surface tool invocations from the model unmodified;
/// callers that need normalized argument shapes go through
/// [`super::arguments::ToolArguments`].
#[async_trait]
pub trait Provider: Send + Sync {
    /// One completion round-trip. `tools` may be empty for plain chat.
    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
        model: &str,
    ) -> anyhow::Result<ProviderResponse>;
}
