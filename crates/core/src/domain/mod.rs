pub mod conversation;
pub mod memory;
pub mod risk;
pub mod session;
