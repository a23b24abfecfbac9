//! Memory resource provisioning.
//!
//! Creation is idempotent by name: when the store reports that a resource with
//! the requested name already exists, the existing id is looked up instead.

use tracing::{error, info, warn};

use switchboard_core::{StrategySpec, StrategyType};

use crate::{CreateMemoryRequest, MemoryStore, MemoryStoreError};

pub const SHORT_TERM_EXPIRY_DAYS: u32 = 7;
pub const LONG_TERM_EXPIRY_DAYS: u32 = 90;

pub const USER_PREFERENCE_NAMESPACE: &str = "users/{actorId}/preference";
pub const SEMANTIC_NAMESPACE: &str = "users/{actorId}/semantic";
pub const SUMMARY_NAMESPACE: &str = "user/{actorId}/summary/{sessionId}";

pub const SHORT_TERM_DESCRIPTION: &str = "Short-term memory for personal agent";
pub const LONG_TERM_DESCRIPTION: &str = "Long-term memory for personal agent";

/// The three extraction strategies attached to a long-term memory.
pub fn long_term_strategies() -> Vec<StrategySpec> {
    vec![
        StrategySpec {
            strategy_type: StrategyType::UserPreference,
            name: "CustomerPreferences".to_string(),
            description: "Captures customer preferences and behavior".to_string(),
            namespaces: vec![USER_PREFERENCE_NAMESPACE.to_string()],
        },
        StrategySpec {
            strategy_type: StrategyType::Semantic,
            name: "CustomerSupportSemantic".to_string(),
            description: "Stores facts from conversations".to_string(),
            namespaces: vec![SEMANTIC_NAMESPACE.to_string()],
        },
        StrategySpec {
            strategy_type: StrategyType::Summary,
            name: "SessionSummarizer".to_string(),
            description: "Stores summary from conversations".to_string(),
            namespaces: vec![SUMMARY_NAMESPACE.to_string()],
        },
    ]
}

pub async fn create_short_term_memory(store: &dyn MemoryStore, name: &str) -> Option<String> {
    provision(store, short_term_request(name)).await
}

pub fn short_term_request(name: &str) -> CreateMemoryRequest {
    CreateMemoryRequest {
        name: name.to_string(),
        description: SHORT_TERM_DESCRIPTION.to_string(),
        strategies: Vec::new(),
        event_expiry_days: SHORT_TERM_EXPIRY_DAYS,
    }
}

pub async fn create_long_term_memory(store: &dyn MemoryStore, name: &str) -> Option<String> {
    provision(store, long_term_request(name, LONG_TERM_EXPIRY_DAYS)).await
}

/// Long-term memory request with a caller-chosen event retention.
pub fn long_term_request(name: &str, event_expiry_days: u32) -> CreateMemoryRequest {
    CreateMemoryRequest {
        name: name.to_string(),
        description: LONG_TERM_DESCRIPTION.to_string(),
        strategies: long_term_strategies(),
        event_expiry_days,
    }
}

/// Creates the resource, or recovers the id of an existing one with the same
/// name. Returns `None` on any other failure.
pub async fn provision(store: &dyn MemoryStore, request: CreateMemoryRequest) -> Option<String> {
    let name = request.name.clone();
    let expected_strategies = request.strategies.len();

    let memory_id = match store.create_memory(request).await {
        Ok(resource) => {
            info!(
                event_name = "memory.provision.created",
                memory_id = %resource.id,
                "memory resource created"
            );
            resource.id
        }
        Err(error) if error.is_already_exists() => {
            return find_existing(store, &name).await;
        }
        Err(error) => {
            error!(
                event_name = "memory.provision.failed",
                memory_name = %name,
                error = %error,
                "memory resource creation failed"
            );
            return None;
        }
    };

    match verify_strategies(store, &memory_id, expected_strategies).await {
        Ok(()) => Some(memory_id),
        Err(error) => {
            error!(
                event_name = "memory.provision.verify_failed",
                memory_id = %memory_id,
                error = %error,
                "memory resource verification failed, cleaning up"
            );
            if let Err(cleanup_error) = store.delete_memory(&memory_id).await {
                warn!(
                    event_name = "memory.provision.cleanup_failed",
                    memory_id = %memory_id,
                    error = %cleanup_error,
                    "could not delete partially created memory"
                );
            }
            None
        }
    }
}

async fn verify_strategies(
    store: &dyn MemoryStore,
    memory_id: &str,
    expected: usize,
) -> Result<(), MemoryStoreError> {
    let strategies = store.list_strategies(memory_id).await?;
    if strategies.len() < expected {
        return Err(MemoryStoreError::Provider {
            code: "IncompleteResource".to_string(),
            message: format!("expected {expected} strategies, store reports {}", strategies.len()),
        });
    }
    Ok(())
}

async fn find_existing(store: &dyn MemoryStore, name: &str) -> Option<String> {
    match store.list_memories().await {
        Ok(memories) => {
            let found = memories.into_iter().find(|memory| memory.id.starts_with(name));
            match &found {
                Some(memory) => info!(
                    event_name = "memory.provision.reused",
                    memory_id = %memory.id,
                    "memory resource already exists, reusing it"
                ),
                None => warn!(
                    event_name = "memory.provision.not_listed",
                    memory_name = %name,
                    "memory reported as existing but no listed id matches its name"
                ),
            }
            found.map(|memory| memory.id)
        }
        Err(error) => {
            error!(
                event_name = "memory.provision.list_failed",
                memory_name = %name,
                error = %error,
                "could not list memories to resolve an existing resource"
            );
            None
        }
    }
}
