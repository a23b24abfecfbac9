//! Persists conversation turns to the memory store and replays recent
//! history into the router prompt at session start.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use switchboard_core::domain::memory::resolve_namespace;
use switchboard_core::{ConversationTurn, Role, StrategyType};
use switchboard_memory::provision::{
    SEMANTIC_NAMESPACE, SUMMARY_NAMESPACE, USER_PREFERENCE_NAMESPACE,
};
use switchboard_memory::{EventMessage, MemoryStore};

use crate::hooks::{AgentHook, MessageAppended, SessionStart};
use crate::prompts::RECENT_CONVERSATION_HEADER;

pub const DEFAULT_RECENT_TURNS: usize = 5;
pub const VIEW_TURNS: usize = 3;
pub const VIEW_TEXT_LIMIT: usize = 100;

pub const PREFERENCE_QUERY: &str = "Summaries all the preferences";
pub const SEMANTIC_QUERY: &str = "Summaries all the semantics";
pub const SUMMARY_QUERY: &str = "Summaries all the questions";

pub struct MemoryHook {
    store: Arc<dyn MemoryStore>,
    memory_id: String,
    recent_turns: usize,
    namespaces: RwLock<HashMap<StrategyType, String>>,
}

/// Role string recorded with an event.
pub fn event_role(role: Role) -> &'static str {
    match role {
        Role::User => "USER",
        Role::Assistant => "ASSISTANT",
    }
}

/// Flattens turns into `role: text` lines.
pub fn format_history(turns: &[ConversationTurn]) -> String {
    turns
        .iter()
        .flatten()
        .map(|message| format!("{}: {}", message.role, message.text()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn truncate_for_view(text: &str) -> String {
    if text.chars().count() > VIEW_TEXT_LIMIT {
        let head = text.chars().take(VIEW_TEXT_LIMIT).collect::<String>();
        format!("{head}...")
    } else {
        text.to_string()
    }
}

impl MemoryHook {
    pub fn new(store: Arc<dyn MemoryStore>, memory_id: impl Into<String>) -> Self {
        Self {
            store,
            memory_id: memory_id.into(),
            recent_turns: DEFAULT_RECENT_TURNS,
            namespaces: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_recent_turns(mut self, recent_turns: usize) -> Self {
        self.recent_turns = recent_turns;
        self
    }

    pub fn memory_id(&self) -> &str {
        &self.memory_id
    }

    async fn cache_namespaces(&self) {
        match self.store.list_strategies(&self.memory_id).await {
            Ok(strategies) => {
                let mut namespaces = self.namespaces.write().await;
                for strategy in strategies {
                    if let Some(namespace) = strategy.namespaces.into_iter().next() {
                        namespaces.insert(strategy.strategy_type, namespace);
                    }
                }
            }
            Err(error) => warn!(
                event_name = "memory_hook.strategies_failed",
                memory_id = %self.memory_id,
                error = %error,
                "could not load memory strategy namespaces"
            ),
        }
    }

    async fn namespace_template(&self, strategy: StrategyType) -> String {
        let fallback = match strategy {
            StrategyType::UserPreference => USER_PREFERENCE_NAMESPACE,
            StrategyType::Semantic => SEMANTIC_NAMESPACE,
            StrategyType::Summary => SUMMARY_NAMESPACE,
        };
        self.namespaces
            .read()
            .await
            .get(&strategy)
            .cloned()
            .unwrap_or_else(|| fallback.to_string())
    }

    async fn retrieve(
        &self,
        strategy: StrategyType,
        actor_id: &str,
        session_id: &str,
        query: &str,
    ) -> Vec<Value> {
        let template = self.namespace_template(strategy).await;
        let namespace = resolve_namespace(&template, actor_id, session_id);
        match self.store.retrieve_memories(&self.memory_id, &namespace, query).await {
            Ok(records) => records,
            Err(error) => {
                error!(
                    event_name = "memory_hook.retrieve_failed",
                    namespace = %namespace,
                    error = %error,
                    "memory retrieval failed"
                );
                Vec::new()
            }
        }
    }

    pub async fn retrieve_user_preference(&self, actor_id: &str) -> Vec<Value> {
        self.retrieve(StrategyType::UserPreference, actor_id, "", PREFERENCE_QUERY).await
    }

    pub async fn retrieve_semantic(&self, actor_id: &str) -> Vec<Value> {
        self.retrieve(StrategyType::Semantic, actor_id, "", SEMANTIC_QUERY).await
    }

    pub async fn retrieve_summaries(&self, actor_id: &str, session_id: &str) -> Vec<Value> {
        self.retrieve(StrategyType::Summary, actor_id, session_id, SUMMARY_QUERY).await
    }

    /// Renders the last few turns for display, one `Turn i:` block per turn.
    pub async fn view_memories(&self, actor_id: &str, session_id: &str) -> String {
        let turns = match self
            .store
            .get_last_k_turns(&self.memory_id, actor_id, session_id, VIEW_TURNS)
            .await
        {
            Ok(turns) => turns,
            Err(error) => {
                error!(
                    event_name = "memory_hook.view_failed",
                    error = %error,
                    "could not load turns for display"
                );
                return String::new();
            }
        };

        let mut rendered = String::new();
        for (index, turn) in turns.iter().enumerate() {
            let _ = writeln!(rendered, "Turn {}:", index + 1);
            for message in turn {
                let text = truncate_for_view(message.text());
                let _ = writeln!(rendered, "  {}: {}", message.role, text);
            }
        }
        rendered
    }
}

#[async_trait]
impl AgentHook for MemoryHook {
    async fn on_session_start(&self, event: &mut SessionStart) {
        let Some(identity) = event.state.identity() else {
            warn!(
                event_name = "memory_hook.identity_missing",
                "actor_id and session_id are required to load memory"
            );
            return;
        };

        self.cache_namespaces().await;

        let turns = match self
            .store
            .get_last_k_turns(
                &self.memory_id,
                &identity.actor_id,
                &identity.session_id,
                self.recent_turns,
            )
            .await
        {
            Ok(turns) => turns,
            Err(error) => {
                error!(
                    event_name = "memory_hook.load_failed",
                    error = %error,
                    "memory load error"
                );
                return;
            }
        };

        if turns.is_empty() {
            return;
        }

        let history = format_history(&turns);
        event.system_prompt.push_str(RECENT_CONVERSATION_HEADER);
        event.system_prompt.push_str(&history);
        info!(
            event_name = "memory_hook.context_loaded",
            turns = turns.len(),
            "loaded recent conversation turns"
        );
    }

    async fn on_message_appended(&self, event: &MessageAppended<'_>) {
        let Some(message) = event.latest() else {
            return;
        };
        let Some(text) = message.primary_text() else {
            return;
        };
        let Some(identity) = event.state.identity() else {
            warn!(
                event_name = "memory_hook.identity_missing",
                "actor_id and session_id are required to save memory"
            );
            return;
        };

        let result = self
            .store
            .create_event(
                &self.memory_id,
                &identity.actor_id,
                &identity.session_id,
                vec![EventMessage::new(text, event_role(message.role))],
            )
            .await;

        match result {
            Ok(()) => debug!(
                event_name = "memory_hook.message_saved",
                role = %message.role,
                "saved message to memory"
            ),
            Err(error) => error!(
                event_name = "memory_hook.save_failed",
                error = %error,
                "memory save error"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::Value;

    use switchboard_core::{
        ContentBlock, ConversationTurn, MemoryResource, Message, Role, StrategyBinding,
        TurnMessage,
    };
    use switchboard_memory::provision::create_long_term_memory;
    use switchboard_memory::{
        CreateMemoryRequest, EventMessage, InMemoryMemoryStore, MemoryStore, MemoryStoreError,
    };

    use super::{format_history, MemoryHook};
    use crate::hooks::{AgentHook, AgentState, MessageAppended, SessionStart};

    async fn store_with_memory() -> (Arc<InMemoryMemoryStore>, String) {
        let store = Arc::new(InMemoryMemoryStore::new());
        let id = create_long_term_memory(store.as_ref(), "hook_test").await.expect("memory id");
        (store, id)
    }

    /// In-memory store that fails every call while `down` is set.
    #[derive(Default)]
    struct OutageStore {
        inner: InMemoryMemoryStore,
        down: AtomicBool,
    }

    impl OutageStore {
        fn check(&self) -> Result<(), MemoryStoreError> {
            if self.down.load(Ordering::SeqCst) {
                return Err(MemoryStoreError::Transport("connection refused".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl MemoryStore for OutageStore {
        async fn create_memory(
            &self,
            request: CreateMemoryRequest,
        ) -> Result<MemoryResource, MemoryStoreError> {
            self.check()?;
            self.inner.create_memory(request).await
        }

        async fn list_memories(&self) -> Result<Vec<MemoryResource>, MemoryStoreError> {
            self.check()?;
            self.inner.list_memories().await
        }

        async fn delete_memory(&self, memory_id: &str) -> Result<(), MemoryStoreError> {
            self.check()?;
            self.inner.delete_memory(memory_id).await
        }

        async fn get_last_k_turns(
            &self,
            memory_id: &str,
            actor_id: &str,
            session_id: &str,
            k: usize,
        ) -> Result<Vec<ConversationTurn>, MemoryStoreError> {
            self.check()?;
            self.inner.get_last_k_turns(memory_id, actor_id, session_id, k).await
        }

        async fn create_event(
            &self,
            memory_id: &str,
            actor_id: &str,
            session_id: &str,
            messages: Vec<EventMessage>,
        ) -> Result<(), MemoryStoreError> {
            self.check()?;
            self.inner.create_event(memory_id, actor_id, session_id, messages).await
        }

        async fn retrieve_memories(
            &self,
            memory_id: &str,
            namespace: &str,
            query: &str,
        ) -> Result<Vec<Value>, MemoryStoreError> {
            self.check()?;
            self.inner.retrieve_memories(memory_id, namespace, query).await
        }

        async fn list_strategies(
            &self,
            memory_id: &str,
        ) -> Result<Vec<StrategyBinding>, MemoryStoreError> {
            self.check()?;
            self.inner.list_strategies(memory_id).await
        }
    }

    #[test]
    fn history_lines_use_role_colon_text() {
        let turns = vec![
            vec![TurnMessage::new("USER", "hi"), TurnMessage::new("ASSISTANT", "hello")],
            vec![TurnMessage::new("USER", "AAPL?")],
        ];
        assert_eq!(format_history(&turns), "USER: hi\nASSISTANT: hello\nUSER: AAPL?");
    }

    #[tokio::test]
    async fn written_messages_come_back_in_the_context_block() {
        let (store, id) = store_with_memory().await;
        let hook = MemoryHook::new(store.clone(), id);
        let state = AgentState::new("user_123", "s1");

        let messages = vec![Message::user("我喜欢科技股")];
        hook.on_message_appended(&MessageAppended { messages: &messages, state: &state }).await;

        let mut start = SessionStart { system_prompt: "base".to_string(), state };
        hook.on_session_start(&mut start).await;

        assert_eq!(start.system_prompt, "base\n\nRecent conversation:\nUSER: 我喜欢科技股");
    }

    #[tokio::test]
    async fn nothing_is_appended_without_history() {
        let (store, id) = store_with_memory().await;
        let hook = MemoryHook::new(store, id);

        let mut start =
            SessionStart { system_prompt: "base".to_string(), state: AgentState::new("a", "s") };
        hook.on_session_start(&mut start).await;

        assert_eq!(start.system_prompt, "base");
    }

    #[tokio::test]
    async fn tool_messages_and_empty_text_are_not_written() {
        let (store, id) = store_with_memory().await;
        let hook = MemoryHook::new(store.clone(), id.clone());
        let state = AgentState::new("user_123", "s1");

        let tool_call = Message {
            role: Role::Assistant,
            content: vec![ContentBlock::ToolUse {
                id: "toolu_1".to_string(),
                name: "stock_analysis".to_string(),
                input: serde_json::json!({"stock": "AAPL"}),
            }],
        };
        let empty = Message { role: Role::User, content: vec![] };
        for message in [tool_call, Message::user(""), empty] {
            let messages = vec![message];
            hook.on_message_appended(&MessageAppended { messages: &messages, state: &state })
                .await;
        }

        let turns = store.get_last_k_turns(&id, "user_123", "s1", 5).await.expect("turns");
        assert!(turns.is_empty());
    }

    #[tokio::test]
    async fn view_shows_last_three_turns_with_truncation() {
        let (store, id) = store_with_memory().await;
        for index in 1..=4 {
            store
                .create_event(&id, "a", "s", vec![EventMessage::new(format!("q{index}"), "USER")])
                .await
                .expect("event");
        }
        store
            .create_event(&id, "a", "s", vec![EventMessage::new("x".repeat(120), "ASSISTANT")])
            .await
            .expect("event");

        let view = MemoryHook::new(store, id).view_memories("a", "s").await;
        let expected = format!(
            "Turn 1:\n  USER: q2\nTurn 2:\n  USER: q3\nTurn 3:\n  USER: q4\n  ASSISTANT: {}...\n",
            "x".repeat(100)
        );
        assert_eq!(view, expected);
    }

    #[tokio::test]
    async fn retrieval_helpers_read_strategy_namespaces() {
        let (store, id) = store_with_memory().await;
        let hook = MemoryHook::new(store.clone(), id.clone());
        store
            .create_event(&id, "user_123", "s1", vec![EventMessage::new("偏好科技股", "USER")])
            .await
            .expect("event");

        let preferences = hook.retrieve_user_preference("user_123").await;
        let summaries = hook.retrieve_summaries("user_123", "s1").await;
        let other_session = hook.retrieve_summaries("user_123", "s2").await;

        assert_eq!(preferences.len(), 1);
        assert_eq!(summaries[0]["content"]["text"], "偏好科技股");
        assert!(other_session.is_empty());
        assert_eq!(hook.retrieve_semantic("user_123").await.len(), 1);
    }

    #[tokio::test]
    async fn store_outages_are_swallowed_and_later_writes_still_land() {
        let store = Arc::new(OutageStore::default());
        let id = create_long_term_memory(store.as_ref(), "outage").await.expect("memory id");
        let hook = MemoryHook::new(store.clone(), id.clone());
        let state = AgentState::new("user_123", "s1");

        store.down.store(true, Ordering::SeqCst);
        let mut start = SessionStart { system_prompt: "base".to_string(), state: state.clone() };
        hook.on_session_start(&mut start).await;
        let lost = vec![Message::user("lost")];
        hook.on_message_appended(&MessageAppended { messages: &lost, state: &state }).await;

        assert_eq!(start.system_prompt, "base");

        store.down.store(false, Ordering::SeqCst);
        let kept = vec![Message::user("kept")];
        hook.on_message_appended(&MessageAppended { messages: &kept, state: &state }).await;

        let turns = store.get_last_k_turns(&id, "user_123", "s1", 5).await.expect("turns");
        assert_eq!(turns, vec![vec![TurnMessage::new("USER", "kept")]]);
    }

    #[tokio::test]
    async fn unknown_memory_id_does_not_break_the_hooks() {
        let store = Arc::new(InMemoryMemoryStore::new());
        let hook = MemoryHook::new(store, "missing-id");
        let state = AgentState::new("user_123", "s1");

        let mut start = SessionStart { system_prompt: "base".to_string(), state: state.clone() };
        hook.on_session_start(&mut start).await;
        let messages = vec![Message::user("hello")];
        hook.on_message_appended(&MessageAppended { messages: &messages, state: &state }).await;

        assert_eq!(start.system_prompt, "base");
        assert_eq!(hook.view_memories("user_123", "s1").await, "");
    }
}
