use std::sync::Arc;

use switchboard_core::config::LlmConfig;

use crate::hooks::AgentState;
use crate::llm::LlmClient;
use crate::memory_hook::MemoryHook;
use crate::prompts::ROUTER_SYSTEM_PROMPT;
use crate::runtime::{Agent, AgentSettings};
use crate::subagents::{GeneralAssistantTool, StockAnalysisTool};
use crate::tools::{
    HrRegulationSearchTool, KnowledgeBase, MarketData, RiskProfileSource, RiskToleranceTool,
    StockDataLookupTool, Tool, ToolRegistry,
};

pub const ROUTER_NAME: &str = "router";

/// Clients the router and its specialists are built from. Constructed once
/// at startup and shared.
pub struct RouterServices {
    pub llm: Arc<dyn LlmClient>,
    pub web_search: Arc<dyn Tool>,
    pub market_data: Arc<dyn MarketData>,
    pub knowledge_base: Arc<dyn KnowledgeBase>,
    pub risk_profile: Box<dyn RiskProfileSource>,
    pub memory_hook: Option<Arc<MemoryHook>>,
}

pub struct Router;

impl Router {
    /// Tools the stock analyst may call.
    pub fn stock_analysis_tools(services: &RouterServices) -> ToolRegistry {
        let mut tools = ToolRegistry::new();
        tools.register_shared(services.web_search.clone());
        tools.register(StockDataLookupTool::new(services.market_data.clone()));
        tools
    }

    pub fn build(services: RouterServices, llm_config: &LlmConfig, state: AgentState) -> Agent {
        let specialist = AgentSettings::specialist(llm_config);

        let mut tools = ToolRegistry::new();
        tools.register(StockAnalysisTool::new(
            services.llm.clone(),
            specialist.clone(),
            Self::stock_analysis_tools(&services),
        ));
        tools.register(HrRegulationSearchTool::new(services.knowledge_base.clone()));
        tools.register(RiskToleranceTool::new(services.risk_profile));
        tools.register(GeneralAssistantTool::new(services.llm.clone(), specialist));

        let mut agent = Agent::new(
            ROUTER_NAME,
            services.llm,
            AgentSettings::router(llm_config),
            ROUTER_SYSTEM_PROMPT,
        )
        .with_tools(tools)
        .with_state(state);

        if let Some(hook) = services.memory_hook {
            agent = agent.with_hook(hook);
        }
        agent
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::Value;

    use switchboard_core::config::AppConfig;

    use super::{Router, RouterServices};
    use crate::hooks::AgentState;
    use crate::llm::{ScriptedLlmClient, ToolSpec};
    use crate::tools::{
        FixedRiskProfile, KnowledgeBase, KnowledgeBaseError, MarketData, MarketDataError,
        PriceTable, Tool, ToolError,
    };

    struct NoSearch;

    #[async_trait]
    impl Tool for NoSearch {
        fn spec(&self) -> ToolSpec {
            ToolSpec {
                name: "web_search".to_string(),
                description: "search".to_string(),
                input_schema: serde_json::json!({"type": "object"}),
            }
        }

        async fn execute(&self, _input: Value) -> Result<String, ToolError> {
            Ok(String::new())
        }
    }

    struct NoMarket;

    #[async_trait]
    impl MarketData for NoMarket {
        async fn monthly_history(&self, ticker: &str) -> Result<PriceTable, MarketDataError> {
            Err(MarketDataError::NoData(ticker.to_string()))
        }
    }

    struct NoKnowledge;

    #[async_trait]
    impl KnowledgeBase for NoKnowledge {
        async fn retrieve_and_generate(
            &self,
            _text: &str,
        ) -> Result<Option<String>, KnowledgeBaseError> {
            Ok(None)
        }
    }

    #[test]
    fn router_exposes_the_four_routing_tools_in_order() {
        let config = AppConfig::default();
        let services = RouterServices {
            llm: Arc::new(ScriptedLlmClient::default()),
            web_search: Arc::new(NoSearch),
            market_data: Arc::new(NoMarket),
            knowledge_base: Arc::new(NoKnowledge),
            risk_profile: Box::new(FixedRiskProfile::default()),
            memory_hook: None,
        };

        assert_eq!(
            Router::stock_analysis_tools(&services).names(),
            vec!["web_search", "stock_data_lookup"]
        );

        let agent = Router::build(services, &config.llm, AgentState::new("user_123", "s1"));
        assert_eq!(
            agent.tools().names(),
            vec![
                "stock_analysis",
                "hr_employee_regulation_search",
                "get_user_risk_tolerance_level",
                "general_assistant",
            ]
        );
        assert!(agent.system_prompt().contains("Decision Protocol"));
        assert_eq!(agent.state().actor_id.as_deref(), Some("user_123"));
    }
}
