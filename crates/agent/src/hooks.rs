use async_trait::async_trait;

use switchboard_core::{Message, SessionIdentity};

/// Per-agent state visible to hooks.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AgentState {
    pub actor_id: Option<String>,
    pub session_id: Option<String>,
}

impl AgentState {
    pub fn new(actor_id: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self { actor_id: Some(actor_id.into()), session_id: Some(session_id.into()) }
    }

    /// `None` when either half is missing or blank.
    pub fn identity(&self) -> Option<SessionIdentity> {
        SessionIdentity::from_parts(self.actor_id.as_deref(), self.session_id.as_deref())
    }
}

/// Fired once before the first model call. Hooks may extend the prompt.
#[derive(Clone, Debug)]
pub struct SessionStart {
    pub system_prompt: String,
    pub state: AgentState,
}

/// Fired after every message is appended to the history.
#[derive(Debug)]
pub struct MessageAppended<'a> {
    pub messages: &'a [Message],
    pub state: &'a AgentState,
}

impl MessageAppended<'_> {
    pub fn latest(&self) -> Option<&Message> {
        self.messages.last()
    }
}

#[async_trait]
pub trait AgentHook: Send + Sync {
    async fn on_session_start(&self, _event: &mut SessionStart) {}

    async fn on_message_appended(&self, _event: &MessageAppended<'_>) {}
}

#[cfg(test)]
mod tests {
    use super::AgentState;

    #[test]
    fn identity_requires_both_values() {
        assert!(AgentState::default().identity().is_none());
        assert!(AgentState { actor_id: Some("a".into()), session_id: None }.identity().is_none());
        assert!(AgentState::new("a", " ").identity().is_none());
        assert!(AgentState::new("a", "s").identity().is_some());
    }
}
