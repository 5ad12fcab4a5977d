//! Chat providers with virtual tool calling.
//!
//! The rest of the crate only sees the [`Provider`] trait and the value
//! types here. Whether tool-call arguments arrive as structured JSON or as
//! raw text is a provider quirk that [`arguments`] normalizes away.

pub mod arguments;
mod openai;
mod response;
pub mod traits;

pub use arguments::ToolArguments;
pub use openai::OpenAiCompatProvider;
pub use response::{ChatMessage, MessageRole, ProviderResponse, ToolCallRequest};
pub use traits::{Provider, ToolSpec};

use crate::config::Config;
use std::sync::Arc;

/// Build the configured chat provider.
pub fn create_provider(config: &Config) -> Arc<dyn Provider> {
    Arc::new(OpenAiCompatProvider::new(
        &config.api_base,
        config.api_key.as_deref(),
    ))
}
