use serde::Serialize;

use switchboard_core::config::{exposed, AppConfig, LoadOptions, MemoryBackend};

use super::{escape_json, runtime, CommandResult};
use crate::bootstrap::build_memory_store;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
pub struct DoctorCheck {
    pub name: &'static str,
    pub status: CheckStatus,
    pub details: String,
}

impl DoctorCheck {
    fn new(name: &'static str, status: CheckStatus, details: impl Into<String>) -> Self {
        Self { name, status, details: details.into() }
    }
}

#[derive(Debug, Serialize)]
pub struct DoctorReport {
    pub overall_status: CheckStatus,
    pub summary: String,
    pub checks: Vec<DoctorCheck>,
}

const NOT_LOADED: &str = "skipped because configuration did not load";

pub fn run(options: LoadOptions, json_output: bool) -> CommandResult {
    let report = build_report(options);
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 1 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\
                 \"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

/// Skipped checks mark optional integrations; only failures fail the report.
pub fn build_report(options: LoadOptions) -> DoctorReport {
    let checks = match AppConfig::load(options) {
        Ok(config) => vec![
            DoctorCheck::new(
                "config_validation",
                CheckStatus::Pass,
                "configuration loaded and validated",
            ),
            check_llm_key(&config),
            check_memory_backend(&config),
            check_knowledge_base(&config),
            check_search_key(&config),
        ],
        Err(error) => {
            let mut checks =
                vec![DoctorCheck::new("config_validation", CheckStatus::Fail, error.to_string())];
            for name in ["llm_api_key", "memory_backend", "knowledge_base_id", "search_api_key"] {
                checks.push(DoctorCheck::new(name, CheckStatus::Skipped, NOT_LOADED));
            }
            checks
        }
    };

    let failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let (overall_status, summary) = if failed {
        (CheckStatus::Fail, "doctor: one or more readiness checks failed")
    } else {
        (CheckStatus::Pass, "doctor: all readiness checks passed")
    };

    DoctorReport { overall_status, summary: summary.to_string(), checks }
}

fn check_llm_key(config: &AppConfig) -> DoctorCheck {
    if exposed(config.llm.api_key.as_ref()).is_some() {
        DoctorCheck::new("llm_api_key", CheckStatus::Pass, "llm api key is set")
    } else {
        DoctorCheck::new(
            "llm_api_key",
            CheckStatus::Fail,
            "set SWITCHBOARD_LLM_API_KEY or ANTHROPIC_API_KEY to chat",
        )
    }
}

fn check_memory_backend(config: &AppConfig) -> DoctorCheck {
    const NAME: &str = "memory_backend";

    if config.memory.backend == MemoryBackend::InMemory {
        return DoctorCheck::new(
            NAME,
            CheckStatus::Pass,
            "in-process store, history is kept only while the process runs",
        );
    }

    let store = match build_memory_store(config) {
        Ok(store) => store,
        Err(error) => return DoctorCheck::new(NAME, CheckStatus::Fail, error.to_string()),
    };
    let runtime = match runtime() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck::new(
                NAME,
                CheckStatus::Fail,
                format!("failed to initialize async runtime: {error}"),
            );
        }
    };

    match runtime.block_on(store.list_memories()) {
        Ok(memories) => DoctorCheck::new(
            NAME,
            CheckStatus::Pass,
            format!("http store reachable, {} memory resources listed", memories.len()),
        ),
        Err(error) => DoctorCheck::new(
            NAME,
            CheckStatus::Fail,
            format!("http store unreachable: {error}"),
        ),
    }
}

fn check_knowledge_base(config: &AppConfig) -> DoctorCheck {
    let endpoint = config.knowledge_base.resolved_endpoint(&config.region);
    match config.knowledge_base.id.as_deref() {
        Some(id) => DoctorCheck::new(
            "knowledge_base_id",
            CheckStatus::Pass,
            format!("knowledge base `{id}` at {endpoint}"),
        ),
        None => DoctorCheck::new(
            "knowledge_base_id",
            CheckStatus::Skipped,
            "KNOWLEDGE_BASE_ID is not set, HR questions will get empty answers",
        ),
    }
}

fn check_search_key(config: &AppConfig) -> DoctorCheck {
    if exposed(config.search.api_key.as_ref()).is_some() {
        DoctorCheck::new("search_api_key", CheckStatus::Pass, "web search api key is set")
    } else {
        DoctorCheck::new(
            "search_api_key",
            CheckStatus::Skipped,
            "TAVILY_API_KEY is not set, web_search will return empty results",
        )
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = vec![report.summary.clone()];

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}
