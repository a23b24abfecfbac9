use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use switchboard_core::ContentBlock;

use super::{ConverseRequest, ConverseResponse, LlmClient, LlmError, StopReason};

/// One canned model turn.
#[derive(Clone, Debug)]
pub enum ScriptedStep {
    Reply(ConverseResponse),
    Fail(String),
}

impl ScriptedStep {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Reply(ConverseResponse {
            content: vec![ContentBlock::Text { text: text.into() }],
            stop_reason: StopReason::EndTurn,
        })
    }

    pub fn tool_use(id: impl Into<String>, name: impl Into<String>, input: Value) -> Self {
        Self::Reply(ConverseResponse {
            content: vec![ContentBlock::ToolUse { id: id.into(), name: name.into(), input }],
            stop_reason: StopReason::ToolUse,
        })
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Fail(message.into())
    }
}

/// Deterministic client that replays steps in order and records every
/// request it receives.
#[derive(Clone, Debug, Default)]
pub struct ScriptedLlmClient {
    script: Arc<Mutex<VecDeque<ScriptedStep>>>,
    requests: Arc<Mutex<Vec<ConverseRequest>>>,
}

impl ScriptedLlmClient {
    pub fn new(steps: Vec<ScriptedStep>) -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::from(steps))),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub async fn requests(&self) -> Vec<ConverseRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.requests.lock().await.len()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    fn provider(&self) -> &str {
        "scripted"
    }

    async fn converse(&self, request: ConverseRequest) -> Result<ConverseResponse, LlmError> {
        self.requests.lock().await.push(request);
        match self.script.lock().await.pop_front() {
            Some(ScriptedStep::Reply(response)) => Ok(response),
            Some(ScriptedStep::Fail(message)) => Err(LlmError::Script(message)),
            None => Err(LlmError::Script("script exhausted".to_string())),
        }
    }
}
