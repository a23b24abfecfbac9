use async_trait::async_trait;
use rand::Rng;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use switchboard_core::config::{ProfileConfig, RiskMode};
use switchboard_core::RiskToleranceLevel;

use super::{parse_input, Tool, ToolError};
use crate::llm::ToolSpec;

pub const TOOL_NAME: &str = "get_user_risk_tolerance_level";

/// Where a user's risk tolerance comes from.
pub trait RiskProfileSource: Send + Sync {
    fn risk_tolerance(&self, user_id: &str) -> RiskToleranceLevel;
}

/// Same level for every user.
#[derive(Clone, Copy, Debug)]
pub struct FixedRiskProfile(pub RiskToleranceLevel);

impl Default for FixedRiskProfile {
    fn default() -> Self {
        Self(RiskToleranceLevel::new(5).unwrap_or_default())
    }
}

impl RiskProfileSource for FixedRiskProfile {
    fn risk_tolerance(&self, _user_id: &str) -> RiskToleranceLevel {
        self.0
    }
}

/// Uniformly random level per lookup.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomRiskProfile;

impl RiskProfileSource for RandomRiskProfile {
    fn risk_tolerance(&self, _user_id: &str) -> RiskToleranceLevel {
        let level = rand::thread_rng()
            .gen_range(i64::from(RiskToleranceLevel::MIN)..=i64::from(RiskToleranceLevel::MAX));
        RiskToleranceLevel::new(level).unwrap_or_default()
    }
}

pub fn profile_source(config: &ProfileConfig) -> Box<dyn RiskProfileSource> {
    match config.risk_mode {
        RiskMode::Fixed => Box::new(FixedRiskProfile(
            RiskToleranceLevel::new(i64::from(config.fixed_level)).unwrap_or_default(),
        )),
        RiskMode::Random => Box::new(RandomRiskProfile),
    }
}

#[derive(Deserialize)]
struct RiskToleranceQuery {
    #[serde(deserialize_with = "user_id_from_any")]
    user_id: String,
}

fn user_id_from_any<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(text) => Ok(text),
        Value::Number(number) => Ok(number.to_string()),
        other => Err(serde::de::Error::custom(format!("user_id must be a string, got {other}"))),
    }
}

/// `get_user_risk_tolerance_level`: risk tolerance 1..=5 for a user id.
pub struct RiskToleranceTool {
    source: Box<dyn RiskProfileSource>,
}

impl RiskToleranceTool {
    pub fn new(source: Box<dyn RiskProfileSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl Tool for RiskToleranceTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: TOOL_NAME.to_string(),
            description: "Finding user risk tolerance for specific user_id. Ranging from 1 to 5, \
                          where 1 represents the most conservative and 5 represents the most \
                          aggressive."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "user_id": {"type": "string", "description": "The user_id of user."}
                },
                "required": ["user_id"]
            }),
        }
    }

    async fn execute(&self, input: Value) -> Result<String, ToolError> {
        let query: RiskToleranceQuery = parse_input(TOOL_NAME, input)?;
        let level = self.source.risk_tolerance(&query.user_id);
        info!(
            event_name = "tool.risk_profile.lookup",
            user_id = %query.user_id,
            level = level.value(),
            "resolved user risk tolerance"
        );
        Ok(level.to_string())
    }
}
