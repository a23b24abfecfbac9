use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use switchboard_core::{ContentBlock, Message};

use super::{ConverseRequest, ConverseResponse, LlmClient, LlmError, StopReason, ToolSpec};

pub const API_VERSION: &str = "2023-06-01";

/// Anthropic Messages API client. The model is chosen per request so one
/// client serves both the router and the specialists.
pub struct AnthropicClient {
    client: Client,
    base_url: String,
    api_key: SecretString,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "str::is_empty")]
    system: &'a str,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    tools: &'a [ToolSpec],
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ResponseBlock>,
    stop_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    #[serde(other)]
    Unsupported,
}

#[derive(Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: String,
}

impl AnthropicClient {
    pub fn new(
        api_key: SecretString,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        if api_key.expose_secret().trim().is_empty() {
            return Err(LlmError::MissingApiKey);
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| LlmError::Transport(error.to_string()))?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client, base_url, api_key })
    }
}

fn convert_blocks(blocks: Vec<ResponseBlock>) -> Vec<ContentBlock> {
    blocks
        .into_iter()
        .filter_map(|block| match block {
            ResponseBlock::Text { text } => Some(ContentBlock::Text { text }),
            ResponseBlock::ToolUse { id, name, input } => {
                Some(ContentBlock::ToolUse { id, name, input })
            }
            ResponseBlock::Unsupported => None,
        })
        .collect()
}

#[async_trait]
impl LlmClient for AnthropicClient {
    fn provider(&self) -> &str {
        "anthropic"
    }

    async fn converse(&self, request: ConverseRequest) -> Result<ConverseResponse, LlmError> {
        let body = MessagesRequest {
            model: &request.model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            system: &request.system,
            messages: &request.messages,
            tools: &request.tools,
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|error| LlmError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let raw = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorEnvelope>(&raw)
                .map(|envelope| envelope.error.message)
                .unwrap_or(raw);
            return Err(LlmError::Api { status: status.as_u16(), message });
        }

        let parsed: MessagesResponse =
            response.json().await.map_err(|error| LlmError::Decode(error.to_string()))?;
        let stop_reason = StopReason::parse(parsed.stop_reason.as_deref());
        debug!(
            event_name = "llm.anthropic.response",
            model = %request.model,
            stop_reason = ?stop_reason,
            blocks = parsed.content.len(),
            "model responded"
        );

        Ok(ConverseResponse { content: convert_blocks(parsed.content), stop_reason })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use switchboard_core::{ContentBlock, Message};

    use super::AnthropicClient;
    use crate::llm::{ConverseRequest, LlmClient, LlmError, StopReason, ToolSpec};

    fn request() -> ConverseRequest {
        ConverseRequest {
            model: "claude-haiku-4-5-20251001".to_string(),
            system: "route things".to_string(),
            messages: vec![Message::user("AAPL怎么样")],
            tools: vec![ToolSpec {
                name: "stock_analysis".to_string(),
                description: "analyze".to_string(),
                input_schema: json!({"type": "object"}),
            }],
            temperature: 0.3,
            max_tokens: 256,
        }
    }

    fn client(server: &MockServer) -> AnthropicClient {
        AnthropicClient::new("sk-test".to_string().into(), server.uri(), Duration::from_secs(5))
            .expect("client")
    }

    #[tokio::test]
    async fn tool_use_responses_become_content_blocks() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "sk-test"))
            .and(header("anthropic-version", "2023-06-01"))
            .and(body_partial_json(json!({
                "system": "route things",
                "messages": [{"role": "user", "content": [{"type": "text", "text": "AAPL怎么样"}]}],
                "tools": [{"name": "stock_analysis", "input_schema": {"type": "object"}}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [
                    {"type": "thinking", "thinking": "hmm"},
                    {"type": "tool_use", "id": "toolu_1", "name": "stock_analysis",
                     "input": {"stock": "AAPL"}}
                ],
                "stop_reason": "tool_use"
            })))
            .mount(&server)
            .await;

        let response = client(&server).converse(request()).await.expect("response");

        assert_eq!(response.stop_reason, StopReason::ToolUse);
        assert_eq!(
            response.content,
            vec![ContentBlock::ToolUse {
                id: "toolu_1".to_string(),
                name: "stock_analysis".to_string(),
                input: json!({"stock": "AAPL"}),
            }]
        );
    }

    #[tokio::test]
    async fn api_errors_surface_the_provider_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "type": "error",
                "error": {"type": "rate_limit_error", "message": "slow down"}
            })))
            .mount(&server)
            .await;

        let error = client(&server).converse(request()).await.expect_err("rate limited");
        assert!(matches!(
            error,
            LlmError::Api { status: 429, ref message } if message == "slow down"
        ));
    }

    #[test]
    fn blank_api_keys_are_rejected() {
        let timeout = Duration::from_secs(1);
        let result = AnthropicClient::new(" ".to_string().into(), "http://localhost", timeout);
        assert!(matches!(result, Err(LlmError::MissingApiKey)));
    }
}
