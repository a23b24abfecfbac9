use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StrategyType {
    #[serde(rename = "USER_PREFERENCE")]
    UserPreference,
    #[serde(rename = "SEMANTIC")]
    Semantic,
    #[serde(rename = "SUMMARY")]
    Summary,
}

impl StrategyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserPreference => "USER_PREFERENCE",
            Self::Semantic => "SEMANTIC",
            Self::Summary => "SUMMARY",
        }
    }
}

/// Extraction strategy requested when a memory resource is created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategySpec {
    #[serde(rename = "type")]
    pub strategy_type: StrategyType,
    pub name: String,
    pub description: String,
    pub namespaces: Vec<String>,
}

/// Strategy as reported back by the store for an existing resource.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyBinding {
    #[serde(rename = "type")]
    pub strategy_type: StrategyType,
    pub namespaces: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryResource {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// Substitutes `{actorId}` and `{sessionId}` in a namespace template.
pub fn resolve_namespace(template: &str, actor_id: &str, session_id: &str) -> String {
    template.replace("{actorId}", actor_id).replace("{sessionId}", session_id)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{resolve_namespace, StrategyBinding, StrategyType};

    #[test]
    fn namespace_templates_resolve_both_placeholders() {
        assert_eq!(
            resolve_namespace("user/{actorId}/summary/{sessionId}", "user_123", "s-1"),
            "user/user_123/summary/s-1"
        );
        assert_eq!(
            resolve_namespace("users/{actorId}/preference", "user_123", "s-1"),
            "users/user_123/preference"
        );
    }

    #[test]
    fn strategy_binding_uses_store_type_names() {
        let binding: StrategyBinding = serde_json::from_value(json!({
            "type": "USER_PREFERENCE",
            "namespaces": ["users/{actorId}/preference"]
        }))
        .expect("parse binding");
        assert_eq!(binding.strategy_type, StrategyType::UserPreference);
    }
}
