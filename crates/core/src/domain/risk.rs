use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Investor risk tolerance, 1 (most conservative) through 5 (most aggressive).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct RiskToleranceLevel(u8);

impl RiskToleranceLevel {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(level: i64) -> Result<Self, DomainError> {
        if (i64::from(Self::MIN)..=i64::from(Self::MAX)).contains(&level) {
            Ok(Self(level as u8))
        } else {
            Err(DomainError::InvalidRiskLevel(level))
        }
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl Default for RiskToleranceLevel {
    fn default() -> Self {
        Self(3)
    }
}

impl TryFrom<i64> for RiskToleranceLevel {
    type Error = DomainError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RiskToleranceLevel> for u8 {
    fn from(value: RiskToleranceLevel) -> Self {
        value.0
    }
}

impl std::fmt::Display for RiskToleranceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
