//! Agent runtime for the switchboard router.
//!
//! A single router agent receives each user query and lets the model pick a
//! specialist tool:
//! - `stock_analysis` runs a sub-agent with market data and web search
//! - `hr_employee_regulation_search` asks the HR knowledge base
//! - `get_user_risk_tolerance_level` looks up a user's risk profile
//! - `general_assistant` answers everything else
//!
//! Routing is a model decision steered by the router prompt. There is no
//! routing table in code.
//!
//! # Key Types
//!
//! - [`runtime::Agent`] drives the tool-use loop
//! - [`llm::LlmClient`] is the inference seam
//! - [`hooks::AgentHook`] observes session start and appended messages
//! - [`memory_hook::MemoryHook`] persists turns and replays recent history

pub mod hooks;
pub mod llm;
pub mod memory_hook;
pub mod prompts;
pub mod router;
pub mod runtime;
pub mod subagents;
pub mod tools;

pub use hooks::{AgentHook, AgentState};
pub use memory_hook::MemoryHook;
pub use router::{Router, RouterServices};
pub use runtime::{Agent, AgentError, AgentSettings};
