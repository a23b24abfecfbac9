//! Conversation memory store contract and adapters.
//!
//! The router persists every turn through [`MemoryStore`] and reads the most
//! recent turns back at session start. Two adapters ship with the crate:
//! [`InMemoryMemoryStore`] for local runs and tests, and [`HttpMemoryStore`]
//! for a managed store reachable over REST. Resource creation with
//! extraction strategies lives in [`provision`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use switchboard_core::{ConversationTurn, MemoryResource, StrategyBinding, StrategySpec};

pub mod http;
pub mod in_memory;
pub mod provision;

pub use http::HttpMemoryStore;
pub use in_memory::InMemoryMemoryStore;

/// Provider code the store uses for request validation failures, including
/// duplicate resource names.
pub const VALIDATION_EXCEPTION: &str = "ValidationException";

#[derive(Debug, Error)]
pub enum MemoryStoreError {
    #[error("memory provider error {code}: {message}")]
    Provider { code: String, message: String },
    #[error("memory resource not found: {0}")]
    NotFound(String),
    #[error("memory transport error: {0}")]
    Transport(String),
    #[error("memory decode error: {0}")]
    Decode(String),
}

impl MemoryStoreError {
    pub fn is_already_exists(&self) -> bool {
        matches!(
            self,
            Self::Provider { code, message }
                if code == VALIDATION_EXCEPTION && message.contains("already exists")
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateMemoryRequest {
    pub name: String,
    pub description: String,
    pub strategies: Vec<StrategySpec>,
    pub event_expiry_days: u32,
}

/// One message to record: the text and the role string it was spoken under.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMessage {
    pub text: String,
    pub role: String,
}

impl EventMessage {
    pub fn new(text: impl Into<String>, role: impl Into<String>) -> Self {
        Self { text: text.into(), role: role.into() }
    }
}

#[async_trait]
pub trait MemoryStore: Send + Sync {
    async fn create_memory(
        &self,
        request: CreateMemoryRequest,
    ) -> Result<MemoryResource, MemoryStoreError>;

    async fn list_memories(&self) -> Result<Vec<MemoryResource>, MemoryStoreError>;

    async fn delete_memory(&self, memory_id: &str) -> Result<(), MemoryStoreError>;

    /// Returns up to `k` most recent turns in chronological order.
    async fn get_last_k_turns(
        &self,
        memory_id: &str,
        actor_id: &str,
        session_id: &str,
        k: usize,
    ) -> Result<Vec<ConversationTurn>, MemoryStoreError>;

    async fn create_event(
        &self,
        memory_id: &str,
        actor_id: &str,
        session_id: &str,
        messages: Vec<EventMessage>,
    ) -> Result<(), MemoryStoreError>;

    async fn retrieve_memories(
        &self,
        memory_id: &str,
        namespace: &str,
        query: &str,
    ) -> Result<Vec<Value>, MemoryStoreError>;

    async fn list_strategies(
        &self,
        memory_id: &str,
    ) -> Result<Vec<StrategyBinding>, MemoryStoreError>;
}

#[cfg(test)]
mod tests {
    use super::{MemoryStoreError, VALIDATION_EXCEPTION};

    #[test]
    fn already_exists_requires_validation_code_and_message() {
        let duplicate = MemoryStoreError::Provider {
            code: VALIDATION_EXCEPTION.to_string(),
            message: "Memory with name demo already exists".to_string(),
        };
        let other_validation = MemoryStoreError::Provider {
            code: VALIDATION_EXCEPTION.to_string(),
            message: "name too long".to_string(),
        };
        let throttled = MemoryStoreError::Provider {
            code: "ThrottlingException".to_string(),
            message: "already exists".to_string(),
        };

        assert!(duplicate.is_already_exists());
        assert!(!other_validation.is_already_exists());
        assert!(!throttled.is_already_exists());
        assert!(!MemoryStoreError::Transport("reset".to_string()).is_already_exists());
    }
}
