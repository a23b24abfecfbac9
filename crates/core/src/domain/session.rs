use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// The (actor, session) pair that scopes every memory read and write.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionIdentity {
    pub actor_id: String,
    pub session_id: String,
}

impl SessionIdentity {
    pub fn new(
        actor_id: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Result<Self, DomainError> {
        let actor_id = actor_id.into();
        let session_id = session_id.into();
        if actor_id.trim().is_empty() {
            return Err(DomainError::InvalidIdentity("actor_id is empty".to_string()));
        }
        if session_id.trim().is_empty() {
            return Err(DomainError::InvalidIdentity("session_id is empty".to_string()));
        }
        Ok(Self { actor_id, session_id })
    }

    /// Builds an identity only when both halves are present and non-blank.
    pub fn from_parts(actor_id: Option<&str>, session_id: Option<&str>) -> Option<Self> {
        match (actor_id, session_id) {
            (Some(actor_id), Some(session_id)) => Self::new(actor_id, session_id).ok(),
            _ => None,
        }
    }
}
