use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::llm::ToolSpec;

pub mod knowledge_base;
pub mod stock_data;
pub mod user_profile;
pub mod web_search;

pub use knowledge_base::{
    HrRegulationSearchTool, HttpKnowledgeBase, KnowledgeBase, KnowledgeBaseError,
};
pub use stock_data::{
    MarketData, MarketDataError, PriceTable, StockDataLookupTool, YahooChartClient,
};
pub use user_profile::{
    profile_source, FixedRiskProfile, RandomRiskProfile, RiskProfileSource, RiskToleranceTool,
};
pub use web_search::{SearchRequest, WebSearchTool};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ToolError {
    #[error("invalid input for `{tool}`: {message}")]
    InvalidInput { tool: String, message: String },
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn spec(&self) -> ToolSpec;

    async fn execute(&self, input: Value) -> Result<String, ToolError>;
}

/// Deserializes tool input, reporting failures against the tool's name.
pub fn parse_input<T: DeserializeOwned>(tool: &str, input: Value) -> Result<T, ToolError> {
    serde_json::from_value(input).map_err(|error| ToolError::InvalidInput {
        tool: tool.to_string(),
        message: error.to_string(),
    })
}

/// Named tools in registration order.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    order: Vec<String>,
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        self.register_shared(Arc::new(tool));
    }

    pub fn register_shared(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.spec().name;
        if self.tools.insert(name.clone(), tool).is_none() {
            self.order.push(name);
        }
    }

    pub fn with<T>(mut self, tool: T) -> Self
    where
        T: Tool + 'static,
    {
        self.register(tool);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.order.iter().filter_map(|name| self.tools.get(name)).map(|tool| tool.spec()).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
