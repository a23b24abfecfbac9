//! Builds every client once from the loaded config and wires the router.

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use switchboard_agent::llm::{AnthropicClient, LlmClient, LlmError};
use switchboard_agent::tools::{
    profile_source, HttpKnowledgeBase, KnowledgeBaseError, MarketDataError, WebSearchTool,
    YahooChartClient,
};
use switchboard_agent::{Agent, AgentState, MemoryHook, Router, RouterServices};
use switchboard_core::config::{
    exposed, AppConfig, ConfigError, LogFormat, LoggingConfig, MemoryBackend, MemoryConfig,
};
use switchboard_memory::provision::{long_term_request, provision};
use switchboard_memory::{HttpMemoryStore, InMemoryMemoryStore, MemoryStore, MemoryStoreError};

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("llm client setup failed: {0}")]
    Llm(#[from] LlmError),
    #[error("memory store setup failed: {0}")]
    Memory(#[from] MemoryStoreError),
    #[error("market data client setup failed: {0}")]
    MarketData(#[from] MarketDataError),
    #[error("knowledge base client setup failed: {0}")]
    KnowledgeBase(#[from] KnowledgeBaseError),
    #[error("web search client setup failed: {0}")]
    WebSearch(String),
}

pub struct Application {
    pub config: AppConfig,
    pub memory_hook: Option<Arc<MemoryHook>>,
    services: RouterServices,
}

impl Application {
    /// Router agent bound to the configured actor and session.
    pub fn into_router(self) -> Agent {
        let state = AgentState::new(&self.config.memory.actor_id, &self.config.memory.session_id);
        Router::build(self.services, &self.config.llm, state)
    }
}

/// Installs the global subscriber. `RUST_LOG` wins over `logging.level`.
/// Output goes to stderr so it never interleaves with chat replies.
pub fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let installed = match config.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    if installed.is_err() {
        warn!(event_name = "system.logging.already_installed", "tracing subscriber already set");
    }
}

fn timeout(config: &AppConfig) -> Duration {
    Duration::from_secs(config.llm.timeout_secs)
}

pub fn build_memory_store(config: &AppConfig) -> Result<Arc<dyn MemoryStore>, BootstrapError> {
    match config.memory.backend {
        MemoryBackend::InMemory => Ok(Arc::new(InMemoryMemoryStore::new())),
        MemoryBackend::Http => {
            let endpoint = config.memory.endpoint.clone().ok_or_else(|| {
                ConfigError::Validation(
                    "memory.endpoint is required when memory.backend is `http`".to_string(),
                )
            })?;
            let store =
                HttpMemoryStore::new(endpoint, config.memory.api_key.clone(), timeout(config))?;
            Ok(Arc::new(store))
        }
    }
}

/// Provisions the long-term memory resource, falling back to the configured
/// `memory.memory_id`. `None` means the session runs without memory.
pub async fn resolve_memory_id(store: &dyn MemoryStore, config: &MemoryConfig) -> Option<String> {
    let request = long_term_request(&config.name, config.event_expiry_days);
    if let Some(memory_id) = provision(store, request).await {
        info!(
            event_name = "system.bootstrap.memory_ready",
            memory_id = %memory_id,
            "memory resource ready"
        );
        return Some(memory_id);
    }

    match &config.memory_id {
        Some(memory_id) => {
            warn!(
                event_name = "system.bootstrap.memory_fallback",
                memory_id = %memory_id,
                "provisioning failed, using configured memory id"
            );
            Some(memory_id.clone())
        }
        None => {
            warn!(
                event_name = "system.bootstrap.memory_disabled",
                "no memory resource available, conversation history will not be kept"
            );
            None
        }
    }
}

pub async fn build_memory_hook(
    config: &AppConfig,
) -> Result<Option<Arc<MemoryHook>>, BootstrapError> {
    let store = build_memory_store(config)?;
    let Some(memory_id) = resolve_memory_id(store.as_ref(), &config.memory).await else {
        return Ok(None);
    };
    let hook = MemoryHook::new(store, memory_id)
        .with_recent_turns(config.memory.recent_turns as usize);
    Ok(Some(Arc::new(hook)))
}

pub fn build_llm(config: &AppConfig) -> Result<Arc<dyn LlmClient>, BootstrapError> {
    let api_key = exposed(config.llm.api_key.as_ref()).ok_or(LlmError::MissingApiKey)?;
    let client = AnthropicClient::new(
        SecretString::from(api_key.to_string()),
        config.llm.base_url.clone(),
        timeout(config),
    )?;
    Ok(Arc::new(client))
}

pub async fn bootstrap(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        actor_id = %config.memory.actor_id,
        session_id = %config.memory.session_id,
        "starting application bootstrap"
    );

    let llm = build_llm(&config)?;
    let web_search = WebSearchTool::new(&config.search, timeout(&config))
        .map_err(|error| BootstrapError::WebSearch(error.to_string()))?;
    let market_data = YahooChartClient::new(config.market_data.endpoint.clone(), timeout(&config))?;
    let knowledge_base =
        HttpKnowledgeBase::new(&config.knowledge_base, &config.region, timeout(&config))?;
    let memory_hook = build_memory_hook(&config).await?;

    if config.knowledge_base.id.is_none() {
        warn!(
            event_name = "system.bootstrap.knowledge_base_unset",
            "knowledge_base.id is not set, HR questions will get empty answers"
        );
    }

    let services = RouterServices {
        llm,
        web_search: Arc::new(web_search),
        market_data: Arc::new(market_data),
        knowledge_base: Arc::new(knowledge_base),
        risk_profile: profile_source(&config.profile),
        memory_hook: memory_hook.clone(),
    };

    info!(
        event_name = "system.bootstrap.ready",
        memory_enabled = memory_hook.is_some(),
        "router services ready"
    );
    Ok(Application { config, memory_hook, services })
}
