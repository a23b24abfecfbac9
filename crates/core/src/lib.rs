pub mod config;
pub mod domain;
pub mod errors;

pub use domain::conversation::{ContentBlock, ConversationTurn, Message, Role, TurnMessage};
pub use domain::memory::{MemoryResource, StrategyBinding, StrategySpec, StrategyType};
pub use domain::risk::RiskToleranceLevel;
pub use domain::session::SessionIdentity;
pub use errors::{ApplicationError, DomainError, InterfaceError};
