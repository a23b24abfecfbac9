use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use switchboard_core::config::LlmConfig;
use switchboard_core::{ContentBlock, Message, Role};

use crate::hooks::{AgentHook, AgentState, MessageAppended, SessionStart};
use crate::llm::{ConverseRequest, LlmClient, LlmError};
use crate::tools::ToolRegistry;

#[derive(Clone, Debug, PartialEq)]
pub struct AgentSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub max_tool_rounds: u32,
}

impl AgentSettings {
    pub fn router(llm: &LlmConfig) -> Self {
        Self::with_model(llm, &llm.router_model)
    }

    pub fn specialist(llm: &LlmConfig) -> Self {
        Self::with_model(llm, &llm.specialist_model)
    }

    fn with_model(llm: &LlmConfig, model: &str) -> Self {
        Self {
            model: model.to_string(),
            temperature: llm.temperature,
            max_tokens: llm.max_tokens,
            max_tool_rounds: llm.max_tool_rounds,
        }
    }
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error("tool loop did not finish within {0} rounds")]
    ToolRoundsExceeded(u32),
}

/// A conversational agent: a system prompt, a tool set and a growing message
/// history, driven through a tool-use loop against the model.
pub struct Agent {
    name: String,
    llm: Arc<dyn LlmClient>,
    settings: AgentSettings,
    system_prompt: String,
    tools: ToolRegistry,
    hooks: Vec<Arc<dyn AgentHook>>,
    state: AgentState,
    messages: Vec<Message>,
    initialized: bool,
}

impl Agent {
    pub fn new(
        name: impl Into<String>,
        llm: Arc<dyn LlmClient>,
        settings: AgentSettings,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            llm,
            settings,
            system_prompt: system_prompt.into(),
            tools: ToolRegistry::new(),
            hooks: Vec::new(),
            state: AgentState::default(),
            messages: Vec::new(),
            initialized: false,
        }
    }

    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_hook(mut self, hook: Arc<dyn AgentHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn with_state(mut self, state: AgentState) -> Self {
        self.state = state;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn state(&self) -> &AgentState {
        &self.state
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Runs session-start hooks. Only the first call has any effect.
    pub async fn initialize(&mut self) {
        if self.initialized {
            return;
        }
        self.initialized = true;

        let mut start = SessionStart {
            system_prompt: std::mem::take(&mut self.system_prompt),
            state: self.state.clone(),
        };
        for hook in &self.hooks {
            hook.on_session_start(&mut start).await;
        }
        self.system_prompt = start.system_prompt;
    }

    /// Sends one user message and drives the tool loop to a final reply.
    ///
    /// A failed turn is removed from the history so later requests do not
    /// carry it.
    pub async fn invoke(&mut self, text: &str) -> Result<String, AgentError> {
        self.initialize().await;

        let checkpoint = self.messages.len();
        let outcome = self.run_turn(text).await;
        if outcome.is_err() {
            self.messages.truncate(checkpoint);
            debug!(
                event_name = "agent.invoke.rolled_back",
                agent = %self.name,
                "failed turn dropped from history"
            );
        }
        outcome
    }

    async fn run_turn(&mut self, text: &str) -> Result<String, AgentError> {
        self.append(Message::user(text)).await;

        for round in 0..self.settings.max_tool_rounds {
            let request = ConverseRequest {
                model: self.settings.model.clone(),
                system: self.system_prompt.clone(),
                messages: self.messages.clone(),
                tools: self.tools.specs(),
                temperature: self.settings.temperature,
                max_tokens: self.settings.max_tokens,
            };
            let response = self.llm.converse(request).await?;
            let mut reply = response.into_message();
            reply.content.retain(
                |block| !matches!(block, ContentBlock::Text { text } if text.trim().is_empty()),
            );
            let tool_uses = reply
                .tool_uses()
                .map(|(id, name, input)| (id.to_string(), name.to_string(), input.clone()))
                .collect::<Vec<_>>();

            if reply.content.is_empty() {
                // The API rejects an assistant message without content.
                info!(
                    event_name = "agent.invoke.empty_reply",
                    agent = %self.name,
                    rounds = round + 1,
                    "agent produced an empty reply"
                );
                return Ok(String::new());
            }

            let text = reply.text();
            self.append(reply).await;

            if tool_uses.is_empty() {
                info!(
                    event_name = "agent.invoke.completed",
                    agent = %self.name,
                    rounds = round + 1,
                    "agent produced a final reply"
                );
                return Ok(text);
            }

            let mut results = Vec::with_capacity(tool_uses.len());
            for (id, name, input) in tool_uses {
                results.push(self.run_tool(id, &name, input).await);
            }
            self.append(Message { role: Role::User, content: results }).await;
        }

        warn!(
            event_name = "agent.invoke.rounds_exceeded",
            agent = %self.name,
            max_tool_rounds = self.settings.max_tool_rounds,
            "tool loop hit its round limit"
        );
        Err(AgentError::ToolRoundsExceeded(self.settings.max_tool_rounds))
    }

    async fn run_tool(&self, tool_use_id: String, name: &str, input: Value) -> ContentBlock {
        let Some(tool) = self.tools.get(name) else {
            warn!(
                event_name = "agent.tool.unknown",
                agent = %self.name,
                tool = %name,
                "model requested a tool that is not registered"
            );
            return ContentBlock::ToolResult {
                tool_use_id,
                content: format!("Unknown tool: {name}"),
                is_error: true,
            };
        };

        debug!(event_name = "agent.tool.invoked", agent = %self.name, tool = %name, "running tool");
        match tool.execute(input).await {
            Ok(content) => ContentBlock::ToolResult { tool_use_id, content, is_error: false },
            Err(error) => {
                warn!(
                    event_name = "agent.tool.rejected_input",
                    agent = %self.name,
                    tool = %name,
                    error = %error,
                    "tool input was invalid"
                );
                ContentBlock::ToolResult { tool_use_id, content: error.to_string(), is_error: true }
            }
        }
    }

    async fn append(&mut self, message: Message) {
        self.messages.push(message);
        let event = MessageAppended { messages: &self.messages, state: &self.state };
        for hook in &self.hooks {
            hook.on_message_appended(&event).await;
        }
    }
}
