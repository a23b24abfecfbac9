use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{error, info};

use switchboard_core::config::KnowledgeBaseConfig;

use super::{parse_input, Tool, ToolError};
use crate::llm::ToolSpec;

pub const TOOL_NAME: &str = "hr_employee_regulation_search";

#[derive(Debug, Error)]
pub enum KnowledgeBaseError {
    #[error("knowledge base id is not configured")]
    MissingKnowledgeBaseId,
    #[error("knowledge base transport error: {0}")]
    Transport(String),
    #[error("knowledge base returned status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("knowledge base decode error: {0}")]
    Decode(String),
}

/// Retrieve-and-generate over a managed knowledge base.
#[async_trait]
pub trait KnowledgeBase: Send + Sync {
    /// Generated answer text, or `None` when the response carries no
    /// `output.text`.
    async fn retrieve_and_generate(&self, text: &str)
        -> Result<Option<String>, KnowledgeBaseError>;
}

#[async_trait]
impl<K: KnowledgeBase + ?Sized> KnowledgeBase for std::sync::Arc<K> {
    async fn retrieve_and_generate(
        &self,
        text: &str,
    ) -> Result<Option<String>, KnowledgeBaseError> {
        (**self).retrieve_and_generate(text).await
    }
}

pub struct HttpKnowledgeBase {
    client: Client,
    endpoint: String,
    knowledge_base_id: Option<String>,
    model_arn: String,
    api_key: Option<SecretString>,
}

impl HttpKnowledgeBase {
    pub fn new(
        config: &KnowledgeBaseConfig,
        region: &str,
        timeout: Duration,
    ) -> Result<Self, KnowledgeBaseError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| KnowledgeBaseError::Transport(error.to_string()))?;
        Ok(Self {
            client,
            endpoint: config.resolved_endpoint(region).trim_end_matches('/').to_string(),
            knowledge_base_id: config.id.clone(),
            model_arn: config.model_arn.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    output: Option<GenerateOutput>,
}

#[derive(Deserialize)]
struct GenerateOutput {
    #[serde(default)]
    text: Option<String>,
}

#[async_trait]
impl KnowledgeBase for HttpKnowledgeBase {
    async fn retrieve_and_generate(
        &self,
        text: &str,
    ) -> Result<Option<String>, KnowledgeBaseError> {
        let knowledge_base_id =
            self.knowledge_base_id.as_deref().ok_or(KnowledgeBaseError::MissingKnowledgeBaseId)?;

        let body = json!({
            "input": {"text": text},
            "retrieveAndGenerateConfiguration": {
                "type": "KNOWLEDGE_BASE",
                "knowledgeBaseConfiguration": {
                    "knowledgeBaseId": knowledge_base_id,
                    "modelArn": self.model_arn,
                }
            }
        });

        let mut request = self.client.post(format!("{}/retrieveAndGenerate", self.endpoint));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }
        let response = request
            .json(&body)
            .send()
            .await
            .map_err(|error| KnowledgeBaseError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(KnowledgeBaseError::Status { status: status.as_u16(), message });
        }

        let parsed: GenerateResponse =
            response.json().await.map_err(|error| KnowledgeBaseError::Decode(error.to_string()))?;
        Ok(parsed.output.and_then(|output| output.text))
    }
}

#[derive(Deserialize)]
struct RegulationQuery {
    query: String,
}

/// `hr_employee_regulation_search`: answers company HR and employee
/// regulation questions from the knowledge base.
pub struct HrRegulationSearchTool<K> {
    knowledge_base: K,
}

impl<K: KnowledgeBase> HrRegulationSearchTool<K> {
    pub fn new(knowledge_base: K) -> Self {
        Self { knowledge_base }
    }
}

pub fn format_query(query: &str) -> String {
    format!("Use Chinese as output language, answer this knowledge question concisely: {query}")
}

#[async_trait]
impl<K: KnowledgeBase + 'static> Tool for HrRegulationSearchTool<K> {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: TOOL_NAME.to_string(),
            description: "Handle internal company HR and Employee regulation questions. \
                          Provides concise, accurate responses from the relevant knowledge base."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "The user's question"}
                },
                "required": ["query"]
            }),
        }
    }

    async fn execute(&self, input: Value) -> Result<String, ToolError> {
        let input: RegulationQuery = parse_input(TOOL_NAME, input)?;
        let formatted = format_query(&input.query);
        info!(
            event_name = "tool.hr_regulation.routed",
            formatted_query = %formatted,
            "routed to HR employee regulation search"
        );

        match self.knowledge_base.retrieve_and_generate(&formatted).await {
            Ok(text) => Ok(text.unwrap_or_default()),
            Err(error) => {
                error!(
                    event_name = "tool.hr_regulation.failed",
                    error = %error,
                    "knowledge base query failed"
                );
                Ok(String::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use switchboard_core::config::AppConfig;

    use super::{format_query, HrRegulationSearchTool, HttpKnowledgeBase};
    use crate::tools::Tool;

    fn knowledge_base(endpoint: String, id: Option<&str>) -> HttpKnowledgeBase {
        let mut config = AppConfig::default().knowledge_base;
        config.endpoint = Some(endpoint);
        config.id = id.map(str::to_string);
        HttpKnowledgeBase::new(&config, "us-west-2", Duration::from_secs(5)).expect("client")
    }

    #[tokio::test]
    async fn answers_come_from_output_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/retrieveAndGenerate"))
            .and(body_partial_json(json!({
                "input": {"text": format_query("年假有几天")},
                "retrieveAndGenerateConfiguration": {
                    "type": "KNOWLEDGE_BASE",
                    "knowledgeBaseConfiguration": {"knowledgeBaseId": "KB123"}
                }
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"output": {"text": "15天"}})),
            )
            .mount(&server)
            .await;

        let tool = HrRegulationSearchTool::new(knowledge_base(server.uri(), Some("KB123")));
        assert_eq!(tool.execute(json!({"query": "年假有几天"})).await, Ok("15天".to_string()));
    }

    #[tokio::test]
    async fn missing_output_text_yields_empty_string() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/retrieveAndGenerate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"citations": []})))
            .mount(&server)
            .await;

        let tool = HrRegulationSearchTool::new(knowledge_base(server.uri(), Some("KB123")));
        assert_eq!(tool.execute(json!({"query": "q"})).await, Ok(String::new()));
    }

    #[tokio::test]
    async fn unconfigured_or_failing_knowledge_base_yields_empty_string() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let failing = HrRegulationSearchTool::new(knowledge_base(server.uri(), Some("KB123")));
        assert_eq!(failing.execute(json!({"query": "q"})).await, Ok(String::new()));

        let unconfigured = HrRegulationSearchTool::new(knowledge_base(server.uri(), None));
        assert_eq!(unconfigured.execute(json!({"query": "q"})).await, Ok(String::new()));
    }

    #[test]
    fn query_is_prefixed_with_language_instruction() {
        assert_eq!(
            format_query("加班规定"),
            "Use Chinese as output language, answer this knowledge question concisely: 加班规定"
        );
    }
}
