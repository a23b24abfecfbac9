//! LLM inference seam.
//!
//! Agents talk to the model only through [`LlmClient`]. The Anthropic
//! Messages adapter is used at runtime and the scripted client drives tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use switchboard_core::{ContentBlock, Message, Role};

pub mod anthropic;
pub mod scripted;

pub use anthropic::AnthropicClient;
pub use scripted::{ScriptedLlmClient, ScriptedStep};

/// Tool definition advertised to the model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ConverseRequest {
    pub model: String,
    pub system: String,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolSpec>,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    StopSequence,
    Other(String),
}

impl StopReason {
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("end_turn") | None => Self::EndTurn,
            Some("tool_use") => Self::ToolUse,
            Some("max_tokens") => Self::MaxTokens,
            Some("stop_sequence") => Self::StopSequence,
            Some(other) => Self::Other(other.to_string()),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ConverseResponse {
    pub content: Vec<ContentBlock>,
    pub stop_reason: StopReason,
}

impl ConverseResponse {
    pub fn into_message(self) -> Message {
        Message { role: Role::Assistant, content: self.content }
    }
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("llm api key is not configured")]
    MissingApiKey,
    #[error("llm transport error: {0}")]
    Transport(String),
    #[error("llm api error (status {status}): {message}")]
    Api { status: u16, message: String },
    #[error("llm response decode error: {0}")]
    Decode(String),
    #[error("scripted llm: {0}")]
    Script(String),
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    fn provider(&self) -> &str;

    async fn converse(&self, request: ConverseRequest) -> Result<ConverseResponse, LlmError>;
}

#[cfg(test)]
mod tests {
    use super::StopReason;

    #[test]
    fn stop_reasons_parse_from_wire_names() {
        assert_eq!(StopReason::parse(Some("tool_use")), StopReason::ToolUse);
        assert_eq!(StopReason::parse(None), StopReason::EndTurn);
        assert_eq!(StopReason::parse(Some("refusal")), StopReason::Other("refusal".to_string()));
    }
}
