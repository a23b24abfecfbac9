use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub region: String,
    pub llm: LlmConfig,
    pub memory: MemoryConfig,
    pub knowledge_base: KnowledgeBaseConfig,
    pub search: SearchConfig,
    pub market_data: MarketDataConfig,
    pub profile: ProfileConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub router_model: String,
    pub specialist_model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    pub max_tool_rounds: u32,
}

#[derive(Clone, Debug)]
pub struct MemoryConfig {
    pub backend: MemoryBackend,
    pub endpoint: Option<String>,
    pub api_key: Option<SecretString>,
    pub memory_id: Option<String>,
    pub name: String,
    pub actor_id: String,
    pub session_id: String,
    pub recent_turns: u32,
    pub event_expiry_days: u32,
}

#[derive(Clone, Debug)]
pub struct KnowledgeBaseConfig {
    pub id: Option<String>,
    pub model_arn: String,
    pub endpoint: Option<String>,
    pub api_key: Option<SecretString>,
}

#[derive(Clone, Debug)]
pub struct SearchConfig {
    pub api_key: Option<SecretString>,
    pub endpoint: String,
    pub max_results: u32,
    pub search_depth: String,
}

#[derive(Clone, Debug)]
pub struct MarketDataConfig {
    pub endpoint: String,
}

#[derive(Clone, Debug)]
pub struct ProfileConfig {
    pub risk_mode: RiskMode,
    pub fixed_level: u8,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryBackend {
    InMemory,
    Http,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskMode {
    Fixed,
    Random,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub region: Option<String>,
    pub log_level: Option<String>,
    pub llm_api_key: Option<String>,
    pub llm_base_url: Option<String>,
    pub router_model: Option<String>,
    pub memory_backend: Option<MemoryBackend>,
    pub memory_endpoint: Option<String>,
    pub memory_id: Option<String>,
    pub actor_id: Option<String>,
    pub session_id: Option<String>,
    pub knowledge_base_id: Option<String>,
    pub search_api_key: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

pub const DEFAULT_REGION: &str = "us-west-2";
pub const DEFAULT_KNOWLEDGE_BASE_MODEL_ARN: &str =
    "arn:aws:bedrock:us-west-2::foundation-model/anthropic.claude-haiku-4-5-20251001-v1:0";

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            llm: LlmConfig {
                api_key: None,
                base_url: "https://api.anthropic.com".to_string(),
                router_model: "claude-haiku-4-5-20251001".to_string(),
                specialist_model: "claude-sonnet-4-5-20250929".to_string(),
                temperature: 0.3,
                max_tokens: 4096,
                timeout_secs: 60,
                max_tool_rounds: 8,
            },
            memory: MemoryConfig {
                backend: MemoryBackend::InMemory,
                endpoint: None,
                api_key: None,
                memory_id: None,
                name: "long_term_memory_demo1".to_string(),
                actor_id: "user_123".to_string(),
                session_id: "personal_session_001".to_string(),
                recent_turns: 5,
                event_expiry_days: 90,
            },
            knowledge_base: KnowledgeBaseConfig {
                id: None,
                model_arn: DEFAULT_KNOWLEDGE_BASE_MODEL_ARN.to_string(),
                endpoint: None,
                api_key: None,
            },
            search: SearchConfig {
                api_key: None,
                endpoint: "https://api.tavily.com/search".to_string(),
                max_results: 4,
                search_depth: "advanced".to_string(),
            },
            market_data: MarketDataConfig {
                endpoint: "https://query1.finance.yahoo.com".to_string(),
            },
            profile: ProfileConfig { risk_mode: RiskMode::Fixed, fixed_level: 5 },
            logging: LoggingConfig { level: "error".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for MemoryBackend {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "in_memory" | "memory" => Ok(Self::InMemory),
            "http" => Ok(Self::Http),
            other => Err(ConfigError::Validation(format!(
                "unsupported memory backend `{other}` (expected in_memory|http)"
            ))),
        }
    }
}

impl std::str::FromStr for RiskMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fixed" => Ok(Self::Fixed),
            "random" => Ok(Self::Random),
            other => Err(ConfigError::Validation(format!(
                "unsupported risk mode `{other}` (expected fixed|random)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl KnowledgeBaseConfig {
    /// Endpoint to call, falling back to the regional agent-runtime host.
    pub fn resolved_endpoint(&self, region: &str) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| format!("https://bedrock-agent-runtime.{region}.amazonaws.com"))
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from("switchboard.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(region) = patch.region {
            self.region = region;
        }

        if let Some(llm) = patch.llm {
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(router_model) = llm.router_model {
                self.llm.router_model = router_model;
            }
            if let Some(specialist_model) = llm.specialist_model {
                self.llm.specialist_model = specialist_model;
            }
            if let Some(temperature) = llm.temperature {
                self.llm.temperature = temperature;
            }
            if let Some(max_tokens) = llm.max_tokens {
                self.llm.max_tokens = max_tokens;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_tool_rounds) = llm.max_tool_rounds {
                self.llm.max_tool_rounds = max_tool_rounds;
            }
        }

        if let Some(memory) = patch.memory {
            if let Some(backend) = memory.backend {
                self.memory.backend = backend;
            }
            if let Some(endpoint) = memory.endpoint {
                self.memory.endpoint = Some(endpoint);
            }
            if let Some(memory_api_key_value) = memory.api_key {
                self.memory.api_key = Some(secret_value(memory_api_key_value));
            }
            if let Some(memory_id) = memory.memory_id {
                self.memory.memory_id = Some(memory_id);
            }
            if let Some(name) = memory.name {
                self.memory.name = name;
            }
            if let Some(actor_id) = memory.actor_id {
                self.memory.actor_id = actor_id;
            }
            if let Some(session_id) = memory.session_id {
                self.memory.session_id = session_id;
            }
            if let Some(recent_turns) = memory.recent_turns {
                self.memory.recent_turns = recent_turns;
            }
            if let Some(event_expiry_days) = memory.event_expiry_days {
                self.memory.event_expiry_days = event_expiry_days;
            }
        }

        if let Some(knowledge_base) = patch.knowledge_base {
            if let Some(id) = knowledge_base.id {
                self.knowledge_base.id = Some(id);
            }
            if let Some(model_arn) = knowledge_base.model_arn {
                self.knowledge_base.model_arn = model_arn;
            }
            if let Some(endpoint) = knowledge_base.endpoint {
                self.knowledge_base.endpoint = Some(endpoint);
            }
            if let Some(kb_api_key_value) = knowledge_base.api_key {
                self.knowledge_base.api_key = Some(secret_value(kb_api_key_value));
            }
        }

        if let Some(search) = patch.search {
            if let Some(search_api_key_value) = search.api_key {
                self.search.api_key = Some(secret_value(search_api_key_value));
            }
            if let Some(endpoint) = search.endpoint {
                self.search.endpoint = endpoint;
            }
            if let Some(max_results) = search.max_results {
                self.search.max_results = max_results;
            }
            if let Some(search_depth) = search.search_depth {
                self.search.search_depth = search_depth;
            }
        }

        if let Some(market_data) = patch.market_data {
            if let Some(endpoint) = market_data.endpoint {
                self.market_data.endpoint = endpoint;
            }
        }

        if let Some(profile) = patch.profile {
            if let Some(risk_mode) = profile.risk_mode {
                self.profile.risk_mode = risk_mode;
            }
            if let Some(fixed_level) = profile.fixed_level {
                self.profile.fixed_level = fixed_level;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        let region = read_env("SWITCHBOARD_REGION").or_else(|| read_env("AWS_DEFAULT_REGION"));
        if let Some(value) = region {
            self.region = value;
        }

        let llm_api_key =
            read_env("SWITCHBOARD_LLM_API_KEY").or_else(|| read_env("ANTHROPIC_API_KEY"));
        if let Some(value) = llm_api_key {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("SWITCHBOARD_LLM_BASE_URL") {
            self.llm.base_url = value;
        }
        if let Some(value) = read_env("SWITCHBOARD_LLM_ROUTER_MODEL") {
            self.llm.router_model = value;
        }
        if let Some(value) = read_env("SWITCHBOARD_LLM_SPECIALIST_MODEL") {
            self.llm.specialist_model = value;
        }
        if let Some(value) = read_env("SWITCHBOARD_LLM_TEMPERATURE") {
            self.llm.temperature = parse_f32("SWITCHBOARD_LLM_TEMPERATURE", &value)?;
        }
        if let Some(value) = read_env("SWITCHBOARD_LLM_MAX_TOKENS") {
            self.llm.max_tokens = parse_u32("SWITCHBOARD_LLM_MAX_TOKENS", &value)?;
        }
        if let Some(value) = read_env("SWITCHBOARD_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("SWITCHBOARD_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("SWITCHBOARD_LLM_MAX_TOOL_ROUNDS") {
            self.llm.max_tool_rounds = parse_u32("SWITCHBOARD_LLM_MAX_TOOL_ROUNDS", &value)?;
        }

        if let Some(value) = read_env("SWITCHBOARD_MEMORY_BACKEND") {
            self.memory.backend = value.parse()?;
        }
        if let Some(value) = read_env("SWITCHBOARD_MEMORY_ENDPOINT") {
            self.memory.endpoint = Some(value);
        }
        if let Some(value) = read_env("SWITCHBOARD_MEMORY_API_KEY") {
            self.memory.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("SWITCHBOARD_MEMORY_ID").or_else(|| read_env("MEMORY_ID")) {
            self.memory.memory_id = Some(value);
        }
        if let Some(value) = read_env("SWITCHBOARD_MEMORY_NAME") {
            self.memory.name = value;
        }
        if let Some(value) = read_env("SWITCHBOARD_ACTOR_ID") {
            self.memory.actor_id = value;
        }
        if let Some(value) = read_env("SWITCHBOARD_SESSION_ID") {
            self.memory.session_id = value;
        }
        if let Some(value) = read_env("SWITCHBOARD_MEMORY_RECENT_TURNS") {
            self.memory.recent_turns = parse_u32("SWITCHBOARD_MEMORY_RECENT_TURNS", &value)?;
        }

        let knowledge_base_id =
            read_env("SWITCHBOARD_KNOWLEDGE_BASE_ID").or_else(|| read_env("KNOWLEDGE_BASE_ID"));
        if let Some(value) = knowledge_base_id {
            self.knowledge_base.id = Some(value);
        }
        if let Some(value) = read_env("SWITCHBOARD_KNOWLEDGE_BASE_MODEL_ARN") {
            self.knowledge_base.model_arn = value;
        }
        if let Some(value) = read_env("SWITCHBOARD_KNOWLEDGE_BASE_ENDPOINT") {
            self.knowledge_base.endpoint = Some(value);
        }
        if let Some(value) = read_env("SWITCHBOARD_KNOWLEDGE_BASE_API_KEY") {
            self.knowledge_base.api_key = Some(secret_value(value));
        }

        let search_api_key =
            read_env("SWITCHBOARD_SEARCH_API_KEY").or_else(|| read_env("TAVILY_API_KEY"));
        if let Some(value) = search_api_key {
            self.search.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("SWITCHBOARD_SEARCH_ENDPOINT") {
            self.search.endpoint = value;
        }

        if let Some(value) = read_env("SWITCHBOARD_MARKET_DATA_ENDPOINT") {
            self.market_data.endpoint = value;
        }

        if let Some(value) = read_env("SWITCHBOARD_PROFILE_RISK_MODE") {
            self.profile.risk_mode = value.parse()?;
        }
        if let Some(value) = read_env("SWITCHBOARD_PROFILE_FIXED_LEVEL") {
            self.profile.fixed_level = parse_u8("SWITCHBOARD_PROFILE_FIXED_LEVEL", &value)?;
        }

        let log_level = read_env("SWITCHBOARD_LOGGING_LEVEL")
            .or_else(|| read_env("SWITCHBOARD_LOG_LEVEL"))
            .or_else(|| read_env("LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value.trim().to_ascii_lowercase();
        }
        let log_format = read_env("SWITCHBOARD_LOGGING_FORMAT")
            .or_else(|| read_env("SWITCHBOARD_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(region) = overrides.region {
            self.region = region;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(llm_api_key));
        }
        if let Some(llm_base_url) = overrides.llm_base_url {
            self.llm.base_url = llm_base_url;
        }
        if let Some(router_model) = overrides.router_model {
            self.llm.router_model = router_model;
        }
        if let Some(memory_backend) = overrides.memory_backend {
            self.memory.backend = memory_backend;
        }
        if let Some(memory_endpoint) = overrides.memory_endpoint {
            self.memory.endpoint = Some(memory_endpoint);
        }
        if let Some(memory_id) = overrides.memory_id {
            self.memory.memory_id = Some(memory_id);
        }
        if let Some(actor_id) = overrides.actor_id {
            self.memory.actor_id = actor_id;
        }
        if let Some(session_id) = overrides.session_id {
            self.memory.session_id = session_id;
        }
        if let Some(knowledge_base_id) = overrides.knowledge_base_id {
            self.knowledge_base.id = Some(knowledge_base_id);
        }
        if let Some(search_api_key) = overrides.search_api_key {
            self.search.api_key = Some(secret_value(search_api_key));
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_region(&self.region)?;
        validate_llm(&self.llm)?;
        validate_memory(&self.memory)?;
        validate_knowledge_base(&self.knowledge_base)?;
        validate_search(&self.search)?;
        validate_url("market_data.endpoint", &self.market_data.endpoint)?;
        validate_profile(&self.profile)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("switchboard.toml"), PathBuf::from("config/switchboard.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_region(region: &str) -> Result<(), ConfigError> {
    if region.trim().is_empty() {
        return Err(ConfigError::Validation("region must not be empty".to_string()));
    }
    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    validate_url("llm.base_url", &llm.base_url)?;

    if llm.router_model.trim().is_empty() || llm.specialist_model.trim().is_empty() {
        return Err(ConfigError::Validation(
            "llm.router_model and llm.specialist_model must not be empty".to_string(),
        ));
    }

    if !(0.0..=1.0).contains(&llm.temperature) {
        return Err(ConfigError::Validation(
            "llm.temperature must be in range 0.0..=1.0".to_string(),
        ));
    }

    if llm.max_tokens == 0 {
        return Err(ConfigError::Validation(
            "llm.max_tokens must be greater than zero".to_string(),
        ));
    }

    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if llm.max_tool_rounds == 0 {
        return Err(ConfigError::Validation(
            "llm.max_tool_rounds must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_memory(memory: &MemoryConfig) -> Result<(), ConfigError> {
    match (&memory.backend, &memory.endpoint) {
        (MemoryBackend::Http, None) => {
            return Err(ConfigError::Validation(
                "memory.endpoint is required when memory.backend is `http`".to_string(),
            ));
        }
        (_, Some(endpoint)) => validate_url("memory.endpoint", endpoint)?,
        (MemoryBackend::InMemory, None) => {}
    }

    if memory.name.trim().is_empty() {
        return Err(ConfigError::Validation("memory.name must not be empty".to_string()));
    }

    if memory.recent_turns == 0 || memory.recent_turns > 100 {
        return Err(ConfigError::Validation(
            "memory.recent_turns must be in range 1..=100".to_string(),
        ));
    }

    if memory.event_expiry_days == 0 || memory.event_expiry_days > 365 {
        return Err(ConfigError::Validation(
            "memory.event_expiry_days must be in range 1..=365".to_string(),
        ));
    }

    Ok(())
}

fn validate_knowledge_base(knowledge_base: &KnowledgeBaseConfig) -> Result<(), ConfigError> {
    if let Some(endpoint) = &knowledge_base.endpoint {
        validate_url("knowledge_base.endpoint", endpoint)?;
    }
    Ok(())
}

fn validate_search(search: &SearchConfig) -> Result<(), ConfigError> {
    validate_url("search.endpoint", &search.endpoint)?;

    if search.max_results == 0 || search.max_results > 20 {
        return Err(ConfigError::Validation(
            "search.max_results must be in range 1..=20".to_string(),
        ));
    }

    match search.search_depth.as_str() {
        "basic" | "advanced" => Ok(()),
        _ => Err(ConfigError::Validation(
            "search.search_depth must be one of basic|advanced".to_string(),
        )),
    }
}

fn validate_profile(profile: &ProfileConfig) -> Result<(), ConfigError> {
    if !(1..=5).contains(&profile.fixed_level) {
        return Err(ConfigError::Validation(
            "profile.fixed_level must be in range 1..=5".to_string(),
        ));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn validate_url(key: &str, value: &str) -> Result<(), ConfigError> {
    if !value.starts_with("http://") && !value.starts_with("https://") {
        return Err(ConfigError::Validation(format!(
            "{key} must start with http:// or https://"
        )));
    }
    Ok(())
}

/// Exposes an optional secret for request headers; empty secrets count as unset.
pub fn exposed(secret: Option<&SecretString>) -> Option<&str> {
    secret.map(|value| value.expose_secret()).filter(|value| !value.trim().is_empty())
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u8(key: &str, value: &str) -> Result<u8, ConfigError> {
    value.parse::<u8>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_f32(key: &str, value: &str) -> Result<f32, ConfigError> {
    value.parse::<f32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    region: Option<String>,
    llm: Option<LlmPatch>,
    memory: Option<MemoryPatch>,
    knowledge_base: Option<KnowledgeBasePatch>,
    search: Option<SearchPatch>,
    market_data: Option<MarketDataPatch>,
    profile: Option<ProfilePatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    router_model: Option<String>,
    specialist_model: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    timeout_secs: Option<u64>,
    max_tool_rounds: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct MemoryPatch {
    backend: Option<MemoryBackend>,
    endpoint: Option<String>,
    api_key: Option<String>,
    memory_id: Option<String>,
    name: Option<String>,
    actor_id: Option<String>,
    session_id: Option<String>,
    recent_turns: Option<u32>,
    event_expiry_days: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct KnowledgeBasePatch {
    id: Option<String>,
    model_arn: Option<String>,
    endpoint: Option<String>,
    api_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchPatch {
    api_key: Option<String>,
    endpoint: Option<String>,
    max_results: Option<u32>,
    search_depth: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct MarketDataPatch {
    endpoint: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ProfilePatch {
    risk_mode: Option<RiskMode>,
    fixed_level: Option<u8>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{
        AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat, MemoryBackend, RiskMode,
    };

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    const ALL_VARS: &[&str] = &[
        "AWS_DEFAULT_REGION",
        "LOG_LEVEL",
        "KNOWLEDGE_BASE_ID",
        "MEMORY_ID",
        "ANTHROPIC_API_KEY",
        "TAVILY_API_KEY",
        "SWITCHBOARD_REGION",
        "SWITCHBOARD_LLM_API_KEY",
        "SWITCHBOARD_LLM_TEMPERATURE",
        "SWITCHBOARD_MEMORY_BACKEND",
        "SWITCHBOARD_MEMORY_ENDPOINT",
        "SWITCHBOARD_MEMORY_ID",
        "SWITCHBOARD_KNOWLEDGE_BASE_ID",
        "SWITCHBOARD_PROFILE_RISK_MODE",
        "SWITCHBOARD_LOGGING_LEVEL",
        "SWITCHBOARD_LOG_LEVEL",
        "SWITCHBOARD_LOG_FORMAT",
        "TEST_SWITCHBOARD_LLM_KEY",
    ];

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_load_without_any_configuration() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(ALL_VARS);

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.region == "us-west-2", "default region should be us-west-2")?;
        ensure(config.memory.recent_turns == 5, "default recent turn window should be 5")?;
        ensure(config.memory.backend == MemoryBackend::InMemory, "default backend is in-memory")?;
        ensure(config.logging.level == "error", "default log level should be error")?;
        ensure(config.profile.fixed_level == 5, "default fixed risk level should be 5")?;
        ensure(config.llm.api_key.is_none(), "llm api key should be unset by default")
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(ALL_VARS);
        env::set_var("TEST_SWITCHBOARD_LLM_KEY", "sk-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("switchboard.toml");
            fs::write(
                &path,
                r#"
[llm]
api_key = "${TEST_SWITCHBOARD_LLM_KEY}"
router_model = "claude-from-file"

[profile]
risk_mode = "random"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            let key = config.llm.api_key.as_ref().map(|key| key.expose_secret().to_string());
            ensure(key.as_deref() == Some("sk-from-env"), "api key should be interpolated")?;
            ensure(config.llm.router_model == "claude-from-file", "router model from file")?;
            ensure(config.profile.risk_mode == RiskMode::Random, "risk mode from file")?;
            Ok(())
        })();

        clear_vars(ALL_VARS);
        result
    }

    #[test]
    fn legacy_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(ALL_VARS);

        env::set_var("AWS_DEFAULT_REGION", "eu-central-1");
        env::set_var("LOG_LEVEL", "INFO");
        env::set_var("KNOWLEDGE_BASE_ID", "KB12345");
        env::set_var("MEMORY_ID", "long_term_memory_demo1-abc123");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.region == "eu-central-1", "region should come from AWS_DEFAULT_REGION")?;
            ensure(config.logging.level == "info", "LOG_LEVEL should be normalized")?;
            ensure(
                config.knowledge_base.id.as_deref() == Some("KB12345"),
                "knowledge base id should come from KNOWLEDGE_BASE_ID",
            )?;
            ensure(
                config.memory.memory_id.as_deref() == Some("long_term_memory_demo1-abc123"),
                "memory id should come from MEMORY_ID",
            )?;
            ensure(
                config.knowledge_base.resolved_endpoint(&config.region)
                    == "https://bedrock-agent-runtime.eu-central-1.amazonaws.com",
                "knowledge base endpoint should follow the region",
            )?;
            Ok(())
        })();

        clear_vars(ALL_VARS);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(ALL_VARS);

        env::set_var("SWITCHBOARD_REGION", "ap-northeast-1");
        env::set_var("SWITCHBOARD_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("switchboard.toml");
            fs::write(
                &path,
                r#"
region = "us-east-1"

[memory]
actor_id = "actor-from-file"
session_id = "session-from-file"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    session_id: Some("session-from-override".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.region == "ap-northeast-1", "env region should win over file")?;
            ensure(config.memory.actor_id == "actor-from-file", "file actor should win")?;
            ensure(
                config.memory.session_id == "session-from-override",
                "override session should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(ALL_VARS);
        result
    }

    #[test]
    fn http_backend_without_endpoint_fails_fast() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(ALL_VARS);
        env::set_var("SWITCHBOARD_MEMORY_BACKEND", "http");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("memory.endpoint")
            );
            ensure(has_message, "validation failure should mention memory.endpoint")
        })();

        clear_vars(ALL_VARS);
        result
    }

    #[test]
    fn invalid_numeric_env_override_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(ALL_VARS);
        env::set_var("SWITCHBOARD_LLM_TEMPERATURE", "warm");

        let result = match AppConfig::load(LoadOptions::default()) {
            Err(ConfigError::InvalidEnvOverride { key, .. }) => {
                ensure(key == "SWITCHBOARD_LLM_TEMPERATURE", "error should name the variable")
            }
            _ => Err("expected invalid env override error".to_string()),
        };

        clear_vars(ALL_VARS);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(ALL_VARS);

        env::set_var("ANTHROPIC_API_KEY", "sk-ant-secret-value");
        env::set_var("TAVILY_API_KEY", "tvly-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("sk-ant-secret-value"), "debug output leaked the llm key")?;
            ensure(!debug.contains("tvly-secret-value"), "debug output leaked the search key")?;
            ensure(config.llm.api_key.is_some(), "llm key should be loaded from alias")?;
            Ok(())
        })();

        clear_vars(ALL_VARS);
        result
    }
}
