use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};

use switchboard_core::config::SearchConfig;

use super::{parse_input, Tool, ToolError};
use crate::llm::ToolSpec;

pub const TOOL_NAME: &str = "web_search";
pub const DEFAULT_TOPIC: &str = "general";
pub const DEFAULT_DAYS: u32 = 30;

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct SearchRequest {
    pub search_query: String,
    #[serde(default)]
    pub target_website: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub days: Option<u32>,
}

/// `web_search`: Tavily search, returning the raw response body.
pub struct WebSearchTool {
    client: Client,
    endpoint: String,
    api_key: Option<SecretString>,
    max_results: u32,
    search_depth: String,
}

impl WebSearchTool {
    pub fn new(config: &SearchConfig, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            max_results: config.max_results,
            search_depth: config.search_depth.clone(),
        })
    }

    pub fn payload(&self, request: &SearchRequest) -> Value {
        let include_domains = request
            .target_website
            .as_deref()
            .filter(|site| !site.is_empty())
            .map(|site| vec![site.to_string()])
            .unwrap_or_default();

        json!({
            "api_key": self.api_key.as_ref().map(|key| key.expose_secret()).unwrap_or_default(),
            "query": request.search_query,
            "search_depth": self.search_depth,
            "include_images": false,
            "include_answer": false,
            "include_raw_content": false,
            "max_results": self.max_results,
            "topic": request.topic.as_deref().unwrap_or(DEFAULT_TOPIC),
            "days": request.days.unwrap_or(DEFAULT_DAYS),
            "include_domains": include_domains,
            "exclude_domains": [],
        })
    }

    async fn search(&self, request: &SearchRequest) -> Result<String, String> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Accept", "application/json")
            .json(&self.payload(request))
            .send()
            .await
            .map_err(|error| error.to_string())?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("status {}", status.as_u16()));
        }
        response.text().await.map_err(|error| error.to_string())
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: TOOL_NAME.to_string(),
            description: "Searches the web for information.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "search_query": {
                        "type": "string",
                        "description": "The query to search the web with."
                    },
                    "target_website": {
                        "type": "string",
                        "description": "The specific website to search including its domain \
                                        name. If not provided, the most relevant website will \
                                        be used."
                    },
                    "topic": {
                        "type": "string",
                        "enum": ["news", "general"],
                        "description": "The topic being searched. Helps narrow the search when \
                                        news is the focus."
                    },
                    "days": {
                        "type": "integer",
                        "description": "The number of days of history to search. Helps when \
                                        looking for recent events or news."
                    }
                },
                "required": ["search_query"]
            }),
        }
    }

    async fn execute(&self, input: Value) -> Result<String, ToolError> {
        let request: SearchRequest = parse_input(TOOL_NAME, input)?;
        info!(
            event_name = "tool.web_search.request",
            query = %request.search_query,
            "executing web search"
        );

        match self.search(&request).await {
            Ok(body) => Ok(body),
            Err(reason) => {
                error!(
                    event_name = "tool.web_search.failed",
                    reason = %reason,
                    "failed to retrieve search results"
                );
                Ok(String::new())
            }
        }
    }
}
