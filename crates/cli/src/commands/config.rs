use std::env;
use std::fs;
use std::path::Path;

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use toml::Value;

use switchboard_core::config::{resolve_config_path, AppConfig, LoadOptions};

/// One reported setting: dotted key, rendered value, and the environment
/// variables that can set it, primary name first.
struct Field {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

fn field(key: &'static str, value: impl Into<String>, env_keys: &'static [&'static str]) -> Field {
    Field { key, value: value.into(), env_keys }
}

pub fn run(options: LoadOptions) -> String {
    let config_path = resolve_config_path(options.config_path.as_deref());
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };
    let config_doc = load_config_doc(config_path.as_deref());

    let mut lines =
        vec!["effective config (source precedence: override > env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(&field, config_doc.as_ref(), config_path.as_deref());
        lines.push(format!("- {} = {} (source: {source})", field.key, field.value));
    }
    lines.join("\n")
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let llm = &config.llm;
    let memory = &config.memory;
    let kb = &config.knowledge_base;
    vec![
        field("region", &config.region, &["SWITCHBOARD_REGION", "AWS_DEFAULT_REGION"]),
        field(
            "llm.api_key",
            redact_secret(llm.api_key.as_ref()),
            &["SWITCHBOARD_LLM_API_KEY", "ANTHROPIC_API_KEY"],
        ),
        field("llm.base_url", &llm.base_url, &["SWITCHBOARD_LLM_BASE_URL"]),
        field("llm.router_model", &llm.router_model, &["SWITCHBOARD_LLM_ROUTER_MODEL"]),
        field(
            "llm.specialist_model",
            &llm.specialist_model,
            &["SWITCHBOARD_LLM_SPECIALIST_MODEL"],
        ),
        field("llm.temperature", llm.temperature.to_string(), &["SWITCHBOARD_LLM_TEMPERATURE"]),
        field("llm.max_tokens", llm.max_tokens.to_string(), &["SWITCHBOARD_LLM_MAX_TOKENS"]),
        field("llm.timeout_secs", llm.timeout_secs.to_string(), &["SWITCHBOARD_LLM_TIMEOUT_SECS"]),
        field(
            "llm.max_tool_rounds",
            llm.max_tool_rounds.to_string(),
            &["SWITCHBOARD_LLM_MAX_TOOL_ROUNDS"],
        ),
        field("memory.backend", enum_name(&memory.backend), &["SWITCHBOARD_MEMORY_BACKEND"]),
        field("memory.endpoint", or_unset(memory.endpoint.as_deref()), &[
            "SWITCHBOARD_MEMORY_ENDPOINT",
        ]),
        field("memory.api_key", redact_secret(memory.api_key.as_ref()), &[
            "SWITCHBOARD_MEMORY_API_KEY",
        ]),
        field("memory.memory_id", or_unset(memory.memory_id.as_deref()), &[
            "SWITCHBOARD_MEMORY_ID",
            "MEMORY_ID",
        ]),
        field("memory.name", &memory.name, &["SWITCHBOARD_MEMORY_NAME"]),
        field("memory.actor_id", &memory.actor_id, &["SWITCHBOARD_ACTOR_ID"]),
        field("memory.session_id", &memory.session_id, &["SWITCHBOARD_SESSION_ID"]),
        field("memory.recent_turns", memory.recent_turns.to_string(), &[
            "SWITCHBOARD_MEMORY_RECENT_TURNS",
        ]),
        field("memory.event_expiry_days", memory.event_expiry_days.to_string(), &[]),
        field("knowledge_base.id", or_unset(kb.id.as_deref()), &[
            "SWITCHBOARD_KNOWLEDGE_BASE_ID",
            "KNOWLEDGE_BASE_ID",
        ]),
        field("knowledge_base.model_arn", &kb.model_arn, &[
            "SWITCHBOARD_KNOWLEDGE_BASE_MODEL_ARN",
        ]),
        field("knowledge_base.endpoint", kb.resolved_endpoint(&config.region), &[
            "SWITCHBOARD_KNOWLEDGE_BASE_ENDPOINT",
        ]),
        field("knowledge_base.api_key", redact_secret(kb.api_key.as_ref()), &[
            "SWITCHBOARD_KNOWLEDGE_BASE_API_KEY",
        ]),
        field("search.api_key", redact_secret(config.search.api_key.as_ref()), &[
            "SWITCHBOARD_SEARCH_API_KEY",
            "TAVILY_API_KEY",
        ]),
        field("search.endpoint", &config.search.endpoint, &["SWITCHBOARD_SEARCH_ENDPOINT"]),
        field("search.max_results", config.search.max_results.to_string(), &[]),
        field("search.search_depth", &config.search.search_depth, &[]),
        field("market_data.endpoint", &config.market_data.endpoint, &[
            "SWITCHBOARD_MARKET_DATA_ENDPOINT",
        ]),
        field("profile.risk_mode", enum_name(&config.profile.risk_mode), &[
            "SWITCHBOARD_PROFILE_RISK_MODE",
        ]),
        field("profile.fixed_level", config.profile.fixed_level.to_string(), &[
            "SWITCHBOARD_PROFILE_FIXED_LEVEL",
        ]),
        field("logging.level", &config.logging.level, &[
            "SWITCHBOARD_LOGGING_LEVEL",
            "SWITCHBOARD_LOG_LEVEL",
            "LOG_LEVEL",
        ]),
        field("logging.format", enum_name(&config.logging.format), &[
            "SWITCHBOARD_LOGGING_FORMAT",
            "SWITCHBOARD_LOG_FORMAT",
        ]),
    ]
}

fn load_config_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(field: &Field, config_doc: Option<&Value>, config_path: Option<&Path>) -> String {
    let env_hit = field
        .env_keys
        .iter()
        .find(|key| env::var(key).is_ok_and(|value| !value.trim().is_empty()));
    if let Some(key) = env_hit {
        return format!("env ({key})");
    }

    if config_doc.is_some_and(|doc| contains_path(doc, field.key)) {
        let file = config_path
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "config file".to_string());
        return format!("file ({file})");
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    key_path.split('.').try_fold(root, |current, key| current.get(key)).is_some()
}

fn or_unset(value: Option<&str>) -> String {
    value.unwrap_or("<unset>").to_string()
}

fn enum_name<T: Serialize>(value: &T) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|value| value.as_str().map(str::to_string))
        .unwrap_or_else(|| "<unknown>".to_string())
}

/// Keeps the vendor prefix of a key (`sk-***`) and hides the rest.
fn redact_secret(secret: Option<&SecretString>) -> String {
    let Some(secret) = secret else {
        return "<unset>".to_string();
    };
    let trimmed = secret.expose_secret().trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}
