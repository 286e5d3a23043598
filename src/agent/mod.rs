//! Agent system: tool registry and the tool-calling dispatch loop.

pub mod runner;
pub mod tools;

pub use runner::{Agent, AgentResponse, ToolCallRecord};
pub use tools::{build_registry, Tool, ToolRegistry};
