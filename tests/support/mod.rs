//! Shared test doubles.
#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use vigilia::providers::{ChatMessage, Provider, ProviderResponse, ToolCallRequest, ToolSpec};

/// Provider that plays back queued responses in order.
///
/// When the queue runs dry it answers with plain text, so loops under test
/// never hang on an empty script.
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<ProviderResponse>>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn chat(
        &self,
        _messages: &[ChatMessage],
        _tools: &[ToolSpec],
        _model: &str,
    ) -> anyhow::Result<ProviderResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .responses
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .pop_front();
        Ok(next.unwrap_or_else(|| ProviderResponse::text_only("ok")))
    }
}

/// Provider whose every call fails.
pub struct FailingProvider {
    calls: AtomicUsize,
}

impl FailingProvider {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for FailingProvider {
    async fn chat(
        &self,
        _messages: &[ChatMessage],
        _tools: &[ToolSpec],
        _model: &str,
    ) -> anyhow::Result<ProviderResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(anyhow::anyhow!("backend unavailable"))
    }
}

/// Response whose only content is a single tool invocation.
pub fn tool_call_response(name: &str, arguments: Value) -> ProviderResponse {
    ProviderResponse {
        text: String::new(),
        tool_calls: vec![ToolCallRequest {
            id: "call_test".to_string(),
            name: name.to_string(),
            arguments,
        }],
    }
}

/// Heartbeat decision response.
pub fn heartbeat_response(action: &str, tasks: &str) -> ProviderResponse {
    tool_call_response("heartbeat", json!({ "action": action, "tasks": tasks }))
}
