use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use uuid::Uuid;

use switchboard_core::domain::memory::resolve_namespace;
use switchboard_core::{
    ConversationTurn, MemoryResource, Role, StrategyBinding, StrategySpec, TurnMessage,
};

use crate::{CreateMemoryRequest, EventMessage, MemoryStore, MemoryStoreError, VALIDATION_EXCEPTION};

#[derive(Debug)]
struct StoredMemory {
    resource: MemoryResource,
    strategies: Vec<StrategySpec>,
    sessions: HashMap<(String, String), Vec<ConversationTurn>>,
    records: HashMap<String, Vec<Value>>,
}

/// Process-local store. Turns are grouped so that each user message opens a
/// new turn and the following messages join it.
#[derive(Debug, Default)]
pub struct InMemoryMemoryStore {
    memories: RwLock<HashMap<String, StoredMemory>>,
}

impl InMemoryMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn not_found(memory_id: &str) -> MemoryStoreError {
    MemoryStoreError::NotFound(memory_id.to_string())
}

fn opens_turn(role: &str) -> bool {
    role.eq_ignore_ascii_case(Role::User.as_str())
}

#[async_trait]
impl MemoryStore for InMemoryMemoryStore {
    async fn create_memory(
        &self,
        request: CreateMemoryRequest,
    ) -> Result<MemoryResource, MemoryStoreError> {
        let mut memories = self.memories.write().await;
        if memories.values().any(|stored| stored.resource.name == request.name) {
            return Err(MemoryStoreError::Provider {
                code: VALIDATION_EXCEPTION.to_string(),
                message: format!("Memory with name {} already exists", request.name),
            });
        }

        let suffix = Uuid::new_v4().simple().to_string();
        let id = format!("{}-{}", request.name, &suffix[..10]);
        let resource = MemoryResource { id: id.clone(), name: request.name };
        memories.insert(
            id,
            StoredMemory {
                resource: resource.clone(),
                strategies: request.strategies,
                sessions: HashMap::new(),
                records: HashMap::new(),
            },
        );
        Ok(resource)
    }

    async fn list_memories(&self) -> Result<Vec<MemoryResource>, MemoryStoreError> {
        let memories = self.memories.read().await;
        let mut resources =
            memories.values().map(|stored| stored.resource.clone()).collect::<Vec<_>>();
        resources.sort_by(|left, right| left.id.cmp(&right.id));
        Ok(resources)
    }

    async fn delete_memory(&self, memory_id: &str) -> Result<(), MemoryStoreError> {
        let mut memories = self.memories.write().await;
        memories.remove(memory_id).map(|_| ()).ok_or_else(|| not_found(memory_id))
    }

    async fn get_last_k_turns(
        &self,
        memory_id: &str,
        actor_id: &str,
        session_id: &str,
        k: usize,
    ) -> Result<Vec<ConversationTurn>, MemoryStoreError> {
        let memories = self.memories.read().await;
        let stored = memories.get(memory_id).ok_or_else(|| not_found(memory_id))?;
        let key = (actor_id.to_string(), session_id.to_string());
        let turns = stored.sessions.get(&key).map(Vec::as_slice).unwrap_or_default();
        let start = turns.len().saturating_sub(k);
        Ok(turns[start..].to_vec())
    }

    async fn create_event(
        &self,
        memory_id: &str,
        actor_id: &str,
        session_id: &str,
        messages: Vec<EventMessage>,
    ) -> Result<(), MemoryStoreError> {
        let mut memories = self.memories.write().await;
        let stored = memories.get_mut(memory_id).ok_or_else(|| not_found(memory_id))?;

        let namespaces = stored
            .strategies
            .iter()
            .flat_map(|strategy| strategy.namespaces.iter())
            .map(|template| resolve_namespace(template, actor_id, session_id))
            .collect::<Vec<_>>();

        let turns =
            stored.sessions.entry((actor_id.to_string(), session_id.to_string())).or_default();
        let now = Utc::now();

        for message in messages {
            if opens_turn(&message.role) || turns.is_empty() {
                turns.push(Vec::new());
            }
            if let Some(turn) = turns.last_mut() {
                let mut entry = TurnMessage::new(message.role.clone(), message.text.clone());
                entry.timestamp = Some(now);
                turn.push(entry);
            }

            for namespace in &namespaces {
                stored.records.entry(namespace.clone()).or_default().push(json!({
                    "content": { "text": message.text },
                    "namespaces": [namespace],
                    "createdAt": now.to_rfc3339(),
                }));
            }
        }

        Ok(())
    }

    async fn retrieve_memories(
        &self,
        memory_id: &str,
        namespace: &str,
        _query: &str,
    ) -> Result<Vec<Value>, MemoryStoreError> {
        let memories = self.memories.read().await;
        let stored = memories.get(memory_id).ok_or_else(|| not_found(memory_id))?;
        Ok(stored.records.get(namespace).cloned().unwrap_or_default())
    }

    async fn list_strategies(
        &self,
        memory_id: &str,
    ) -> Result<Vec<StrategyBinding>, MemoryStoreError> {
        let memories = self.memories.read().await;
        let stored = memories.get(memory_id).ok_or_else(|| not_found(memory_id))?;
        Ok(stored
            .strategies
            .iter()
            .map(|strategy| StrategyBinding {
                strategy_type: strategy.strategy_type,
                namespaces: strategy.namespaces.clone(),
            })
            .collect())
    }
}
