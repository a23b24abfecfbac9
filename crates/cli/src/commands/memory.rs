use serde_json::Value;

use switchboard_agent::MemoryHook;
use switchboard_core::config::{AppConfig, LoadOptions};

use super::{runtime, CommandResult};
use crate::bootstrap::{build_memory_hook, init_logging};

pub fn run(options: LoadOptions, actor: Option<String>, session: Option<String>) -> CommandResult {
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure("memory", "config_validation", error.to_string(), 2)
        }
    };
    init_logging(&config.logging);

    let actor_id = actor.unwrap_or_else(|| config.memory.actor_id.clone());
    let session_id = session.unwrap_or_else(|| config.memory.session_id.clone());

    let runtime = match runtime() {
        Ok(runtime) => runtime,
        Err(error) => return CommandResult::failure("memory", "runtime", error.to_string(), 1),
    };

    runtime.block_on(async {
        match build_memory_hook(&config).await {
            Ok(Some(hook)) => CommandResult {
                exit_code: 0,
                output: render_snapshot(&hook, &actor_id, &session_id).await,
            },
            Ok(None) => CommandResult::failure(
                "memory",
                "memory_unavailable",
                "no memory resource could be provisioned and memory.memory_id is not set",
                4,
            ),
            Err(error) => CommandResult::failure("memory", "bootstrap", error.to_string(), 3),
        }
    })
}

/// Recent turns followed by the preference, semantic and summary records.
pub async fn render_snapshot(hook: &MemoryHook, actor_id: &str, session_id: &str) -> String {
    let mut sections = vec![format!(
        "=== Memory Contents for actor_id: {actor_id}, session_id: {session_id} ===\n{}",
        hook.view_memories(actor_id, session_id).await
    )];

    sections.push(render_records(
        "User preferences",
        &hook.retrieve_user_preference(actor_id).await,
    ));
    sections.push(render_records("Semantic memories", &hook.retrieve_semantic(actor_id).await));
    sections.push(render_records(
        "Session summaries",
        &hook.retrieve_summaries(actor_id, session_id).await,
    ));

    sections.join("\n")
}

fn render_records(title: &str, records: &[Value]) -> String {
    let mut lines = vec![format!("{title}:")];
    if records.is_empty() {
        lines.push("  (none)".to_string());
    }
    for record in records {
        let text = record
            .pointer("/content/text")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| record.to_string());
        lines.push(format!("  - {text}"));
    }
    lines.join("\n") + "\n"
}
