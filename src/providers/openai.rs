//! OpenAI-compatible chat completions client.
//!
//! Most hosted LLM APIs speak this format. The base URL is injectable so
//! tests can point the client at a local mock server.

use super::response::{ChatMessage, MessageRole, ProviderResponse, ToolCallRequest};
use super::traits::{Provider, ToolSpec};
use crate::error::LlmError;
use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

pub struct OpenAiCompatProvider {
    base_url: String,
    /// Pre-computed `"Bearer <key>"` header value (avoids `format!` per request).
    cached_auth_header: Option<String>,
    client: Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool<'a>>>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct WireTool<'a> {
    r#type: &'static str,
    function: WireToolFunction<'a>,
}

#[derive(Debug, Serialize)]
struct WireToolFunction<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a Value,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    id: String,
    function: WireToolCallFunction,
}

#[derive(Debug, Deserialize)]
struct WireToolCallFunction {
    name: String,
    arguments: String,
}

impl OpenAiCompatProvider {
    pub fn new(base_url: &str, api_key: Option<&str>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            cached_auth_header: api_key.map(|k| format!("Bearer {k}")),
            client: Client::builder()
                .timeout(Duration::from_secs(120))
                .connect_timeout(Duration::from_secs(10))
                .pool_idle_timeout(Duration::from_secs(90))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn wire_role(role: MessageRole) -> &'static str {
        match role {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }

    fn build_tools<'a>(tools: &'a [ToolSpec]) -> Option<Vec<WireTool<'a>>> {
        if tools.is_empty() {
            None
        } else {
            Some(
                tools
                    .iter()
                    .map(|tool| WireTool {
                        r#type: "function",
                        function: WireToolFunction {
                            name: &tool.name,
                            description: &tool.description,
                            parameters: &tool.parameters,
                        },
                    })
                    .collect(),
            )
        }
    }

    fn decode_tool_call(call: WireToolCall) -> ToolCallRequest {
        let WireToolCallFunction { name, arguments } = call.function;
        // The wire format carries arguments as a JSON string. Keep text that
        // does not parse as-is; shape handling belongs to the normalizer,
        // not the transport.
        let arguments = match serde_json::from_str::<Value>(&arguments) {
            Ok(value) => value,
            Err(_) => Value::String(arguments),
        };
        ToolCallRequest {
            id: call.id,
            name,
            arguments,
        }
    }
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
        model: &str,
    ) -> anyhow::Result<ProviderResponse> {
        let auth_header = self.cached_auth_header.as_ref().ok_or(LlmError::Auth {
            provider: "openai".to_string(),
        })?;

        let request = ChatRequest {
            model,
            messages: messages
                .iter()
                .map(|m| WireMessage {
                    role: Self::wire_role(m.role),
                    content: &m.content,
                })
                .collect(),
            tools: Self::build_tools(tools),
        };

        let response = self
            .client
            .post(self.chat_url())
            .header("Authorization", auth_header)
            .json(&request)
            .send()
            .await
            .context("chat completions request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Request {
                provider: "openai".to_string(),
                message: format!("{status}: {body}"),
            }
            .into());
        }

        let decoded: ChatResponse = response
            .json()
            .await
            .context("chat completions JSON decode failed")?;
        let choice = decoded
            .choices
            .into_iter()
            .next()
            .context("empty choices in chat completions response")?;

        Ok(ProviderResponse {
            text: choice.message.content.unwrap_or_default(),
            tool_calls: choice
                .message
                .tool_calls
                .unwrap_or_default()
                .into_iter()
                .map(Self::decode_tool_call)
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn tool_spec() -> ToolSpec {
        ToolSpec {
            name: "heartbeat".into(),
            description: "Report heartbeat decision".into(),
            parameters: json!({"type": "object", "properties": {}}),
        }
    }

    #[test]
    fn strips_trailing_slash() {
        let provider = OpenAiCompatProvider::new("https://example.com/v1/", Some("key"));
        assert_eq!(provider.chat_url(), "https://example.com/v1/chat/completions");
    }

    #[tokio::test]
    async fn chat_fails_without_key() {
        let provider = OpenAiCompatProvider::new("https://example.com/v1", None);
        let err = provider
            .chat(&[ChatMessage::user("hello")], &[], "test-model")
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LlmError>(),
            Some(LlmError::Auth { .. })
        ));
    }

    #[tokio::test]
    async fn plain_text_response_decodes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "hello there"}}]
            })))
            .mount(&server)
            .await;

        let provider = OpenAiCompatProvider::new(&server.uri(), Some("sk-test"));
        let response = provider
            .chat(&[ChatMessage::user("hi")], &[], "test-model")
            .await
            .unwrap();

        assert_eq!(response.text, "hello there");
        assert!(!response.has_tool_calls());
    }

    #[tokio::test]
    async fn tool_call_arguments_parse_to_object() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({"model": "test-model"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {
                            "name": "heartbeat",
                            "arguments": "{\"action\": \"run\", \"tasks\": \"T\"}"
                        }
                    }]
                }}]
            })))
            .mount(&server)
            .await;

        let provider = OpenAiCompatProvider::new(&server.uri(), Some("sk-test"));
        let response = provider
            .chat(&[ChatMessage::user("check")], &[tool_spec()], "test-model")
            .await
            .unwrap();

        let call = response.tool_call("heartbeat").unwrap();
        assert_eq!(call.id, "call_1");
        assert_eq!(call.arguments["action"], "run");
        assert_eq!(call.arguments["tasks"], "T");
    }

    #[tokio::test]
    async fn unparseable_arguments_pass_through_as_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "heartbeat", "arguments": "not json {"}
                    }]
                }}]
            })))
            .mount(&server)
            .await;

        let provider = OpenAiCompatProvider::new(&server.uri(), Some("sk-test"));
        let response = provider
            .chat(&[ChatMessage::user("check")], &[tool_spec()], "test-model")
            .await
            .unwrap();

        assert_eq!(
            response.tool_calls[0].arguments,
            Value::String("not json {".into())
        );
    }

    #[tokio::test]
    async fn server_error_surfaces_as_request_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let provider = OpenAiCompatProvider::new(&server.uri(), Some("sk-test"));
        let err = provider
            .chat(&[ChatMessage::user("hi")], &[], "test-model")
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<LlmError>(),
            Some(LlmError::Request { .. })
        ));
        assert!(err.to_string().contains("500"));
    }
}
