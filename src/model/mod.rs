//! Chat model abstraction over the LLM API boundary.
//!
//! The dispatch loop only ever sees this interface: a request carrying the
//! ordered context plus tool descriptors, and a reply that is either a final
//! answer or a batch of tool-call requests.

mod openai;

pub use openai::OpenAiChatModel;

use crate::error::Result;
use async_trait::async_trait;

/// One message in the working context sent to the model.
#[derive(Debug, Clone)]
pub enum ContextMessage {
    /// System instructions.
    System(String),
    /// A user turn.
    User(String),
    /// An assistant text turn.
    Assistant(String),
    /// An assistant turn that requested tool calls.
    ToolCalls(Vec<ToolRequest>),
    /// The result of one tool call, fed back to the model.
    ToolResult { call_id: String, content: String },
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone)]
pub struct ToolRequest {
    /// Provider-assigned call id, echoed back with the result.
    pub id: String,
    /// Tool name, matched against the registry.
    pub name: String,
    /// Raw JSON arguments as emitted by the model.
    pub arguments: String,
}

/// Model output for one completion: either a final answer or tool requests.
#[derive(Debug, Clone)]
pub enum ModelTurn {
    Answer(String),
    ToolCalls(Vec<ToolRequest>),
}

/// Descriptor for a tool exposed to the model.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON schema for the accepted arguments.
    pub parameters: serde_json::Value,
}

/// Trait for chat models with function-calling support.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Run one completion over the given context and tool descriptors.
    async fn complete(
        &self,
        messages: &[ContextMessage],
        tools: &[ToolSpec],
    ) -> Result<ModelTurn>;
}
