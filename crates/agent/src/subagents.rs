//! Specialist agents exposed to the router as tools.
//!
//! Every call builds a fresh [`Agent`] with the specialist persona, so no
//! history leaks between invocations.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, info};

use switchboard_core::RiskToleranceLevel;

use crate::llm::{LlmClient, ToolSpec};
use crate::prompts::{GENERAL_ASSISTANT_SYSTEM_PROMPT, STOCK_ANALYSIS_SYSTEM_PROMPT};
use crate::runtime::{Agent, AgentSettings};
use crate::tools::{parse_input, Tool, ToolError, ToolRegistry};

pub const STOCK_ANALYSIS: &str = "stock_analysis";
pub const GENERAL_ASSISTANT: &str = "general_assistant";

pub const STOCK_ANALYSIS_FALLBACK: &str = "抱歉，我无法对这只股票进行分析。\n";
pub const GENERAL_ASSISTANT_FALLBACK: &str = "抱歉，我无法回答你的问题。\n";

#[derive(Deserialize)]
struct StockAnalysisInput {
    stock: String,
    #[serde(default)]
    user_risk_tolerance_level: RiskToleranceLevel,
}

pub fn stock_analysis_query(stock: &str, level: RiskToleranceLevel) -> String {
    format!("Analyze this stock: {stock} for user risk tolerance level: {level}.")
}

pub fn general_assistant_query(query: &str) -> String {
    format!("Answer this general knowledge question concisely: {query}")
}

fn finish(reply: String, fallback: &str) -> String {
    if reply.is_empty() {
        fallback.to_string()
    } else {
        reply + "\n"
    }
}

/// `stock_analysis`: price history plus news, weighed against the user's
/// risk tolerance.
pub struct StockAnalysisTool {
    llm: Arc<dyn LlmClient>,
    settings: AgentSettings,
    tools: ToolRegistry,
}

impl StockAnalysisTool {
    /// `tools` should carry `web_search` and `stock_data_lookup` only.
    pub fn new(llm: Arc<dyn LlmClient>, settings: AgentSettings, tools: ToolRegistry) -> Self {
        Self { llm, settings, tools }
    }
}

#[async_trait]
impl Tool for StockAnalysisTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: STOCK_ANALYSIS.to_string(),
            description: "Conduct a comprehensive analysis of a single stock matched to the \
                          user's risk tolerance level, delivering actionable insights that help \
                          investors make informed decisions. user_risk_tolerance_level ranges \
                          from 1 (most conservative) to 5 (most aggressive)."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "stock": {
                        "type": "string",
                        "description": "The stock name or code to be analyzed"
                    },
                    "user_risk_tolerance_level": {
                        "type": "integer",
                        "minimum": 1,
                        "maximum": 5,
                        "default": 3,
                        "description": "Int level of risk tolerance."
                    }
                },
                "required": ["stock"]
            }),
        }
    }

    async fn execute(&self, input: Value) -> Result<String, ToolError> {
        let input: StockAnalysisInput = parse_input(STOCK_ANALYSIS, input)?;
        let query = stock_analysis_query(&input.stock, input.user_risk_tolerance_level);
        info!(
            event_name = "subagent.stock_analysis.routed",
            formatted_query = %query,
            "routed to stock analysis agent"
        );

        let mut agent = Agent::new(
            STOCK_ANALYSIS,
            self.llm.clone(),
            self.settings.clone(),
            STOCK_ANALYSIS_SYSTEM_PROMPT,
        )
        .with_tools(self.tools.clone());

        match agent.invoke(&query).await {
            Ok(reply) => {
                debug!(event_name = "subagent.stock_analysis.reply", reply = %reply);
                Ok(finish(reply, STOCK_ANALYSIS_FALLBACK))
            }
            Err(error) => {
                error!(
                    event_name = "subagent.stock_analysis.failed",
                    error = %error,
                    "error processing stock analysis"
                );
                Ok(format!("Error processing stock analysis: {error}"))
            }
        }
    }
}

#[derive(Deserialize)]
struct GeneralQuestion {
    query: String,
}

/// `general_assistant`: fallback for questions outside every specialist
/// domain. Runs without tools.
pub struct GeneralAssistantTool {
    llm: Arc<dyn LlmClient>,
    settings: AgentSettings,
}

impl GeneralAssistantTool {
    pub fn new(llm: Arc<dyn LlmClient>, settings: AgentSettings) -> Self {
        Self { llm, settings }
    }
}

#[async_trait]
impl Tool for GeneralAssistantTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: GENERAL_ASSISTANT.to_string(),
            description: "Handle general knowledge queries that fall outside specialized \
                          domains. Provides concise, accurate responses to non-specialized \
                          questions."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The user's general knowledge question"
                    }
                },
                "required": ["query"]
            }),
        }
    }

    async fn execute(&self, input: Value) -> Result<String, ToolError> {
        let input: GeneralQuestion = parse_input(GENERAL_ASSISTANT, input)?;
        let query = general_assistant_query(&input.query);
        info!(
            event_name = "subagent.general_assistant.routed",
            formatted_query = %query,
            "routed to general assistant agent"
        );

        let mut agent = Agent::new(
            GENERAL_ASSISTANT,
            self.llm.clone(),
            self.settings.clone(),
            GENERAL_ASSISTANT_SYSTEM_PROMPT,
        );

        match agent.invoke(&query).await {
            Ok(reply) => Ok(finish(reply, GENERAL_ASSISTANT_FALLBACK)),
            Err(error) => {
                error!(
                    event_name = "subagent.general_assistant.failed",
                    error = %error,
                    "error processing question"
                );
                Ok(format!("Error processing your question: {error}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::{
        GeneralAssistantTool, StockAnalysisTool, GENERAL_ASSISTANT_FALLBACK,
        STOCK_ANALYSIS_FALLBACK,
    };
    use crate::llm::{ScriptedLlmClient, ScriptedStep};
    use crate::runtime::AgentSettings;
    use crate::tools::{Tool, ToolRegistry};

    fn settings() -> AgentSettings {
        AgentSettings {
            model: "specialist".to_string(),
            temperature: 0.3,
            max_tokens: 1024,
            max_tool_rounds: 4,
        }
    }

    #[tokio::test]
    async fn stock_analysis_formats_query_with_default_risk_level() {
        let llm = ScriptedLlmClient::new(vec![ScriptedStep::text("报告")]);
        let tool = StockAnalysisTool::new(Arc::new(llm.clone()), settings(), ToolRegistry::new());

        let reply = tool.execute(json!({"stock": "AAPL"})).await.expect("reply");

        assert_eq!(reply, "报告\n");
        let requests = llm.requests().await;
        assert_eq!(requests[0].model, "specialist");
        assert_eq!(
            requests[0].messages[0].text(),
            "Analyze this stock: AAPL for user risk tolerance level: 3."
        );
        assert!(requests[0].system.contains("<myapp://pages/stock/detail?stock_code>"));
    }

    #[tokio::test]
    async fn empty_replies_fall_back_and_failures_are_reported_inline() {
        let llm = ScriptedLlmClient::new(vec![
            ScriptedStep::text(""),
            ScriptedStep::error("model unavailable"),
            ScriptedStep::text(""),
        ]);
        let shared = Arc::new(llm.clone());
        let stock = StockAnalysisTool::new(shared.clone(), settings(), ToolRegistry::new());
        let general = GeneralAssistantTool::new(shared, settings());

        let fallback =
            stock.execute(json!({"stock": "TSLA", "user_risk_tolerance_level": 5})).await;
        assert_eq!(fallback, Ok(STOCK_ANALYSIS_FALLBACK.to_string()));

        let failed =
            general.execute(json!({"query": "天空为什么是蓝色的"})).await.expect("reply");
        assert!(failed.starts_with("Error processing your question: "));
        assert!(failed.contains("model unavailable"));

        let empty = general.execute(json!({"query": "?"})).await;
        assert_eq!(empty, Ok(GENERAL_ASSISTANT_FALLBACK.to_string()));
    }

    #[tokio::test]
    async fn each_call_starts_from_a_fresh_history() {
        let llm =
            ScriptedLlmClient::new(vec![ScriptedStep::text("one"), ScriptedStep::text("two")]);
        let tool = GeneralAssistantTool::new(Arc::new(llm.clone()), settings());

        tool.execute(json!({"query": "first"})).await.expect("first");
        tool.execute(json!({"query": "second"})).await.expect("second");

        let requests = llm.requests().await;
        assert_eq!(requests[1].messages.len(), 1);
        assert!(requests[1].tools.is_empty());
        assert_eq!(
            requests[1].messages[0].text(),
            "Answer this general knowledge question concisely: second"
        );
    }

    #[tokio::test]
    async fn out_of_range_risk_levels_are_rejected() {
        let llm = ScriptedLlmClient::new(Vec::new());
        let tool = StockAnalysisTool::new(Arc::new(llm.clone()), settings(), ToolRegistry::new());

        let rejected = tool.execute(json!({"stock": "AAPL", "user_risk_tolerance_level": 9})).await;
        assert!(rejected.is_err());
        assert_eq!(llm.call_count().await, 0);
    }
}
