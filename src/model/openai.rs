//! OpenAI implementation of the chat model boundary.

use super::{ChatModel, ContextMessage, ModelTurn, ToolRequest, ToolSpec};
use crate::error::{ReseptError, Result};
use crate::openai::create_client;
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
    ChatCompletionTool, ChatCompletionToolType, CreateChatCompletionRequestArgs, FunctionCall,
    FunctionObject,
};
use async_trait::async_trait;
use tracing::debug;

/// Chat model backed by the OpenAI chat completions API.
pub struct OpenAiChatModel {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    temperature: f32,
}

impl OpenAiChatModel {
    /// Create a model handle for the given model name.
    ///
    /// Temperature defaults to 0 for reproducible, factual answers.
    pub fn new(model: &str) -> Self {
        Self {
            client: create_client(),
            model: model.to_string(),
            temperature: 0.0,
        }
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn complete(
        &self,
        messages: &[ContextMessage],
        tools: &[ToolSpec],
    ) -> Result<ModelTurn> {
        let messages = convert_messages(messages)?;

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder
            .model(&self.model)
            .messages(messages)
            .temperature(self.temperature);
        if !tools.is_empty() {
            builder.tools(convert_tools(tools));
        }
        let request = builder
            .build()
            .map_err(|e| ReseptError::Agent(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| ReseptError::OpenAI(format!("Chat API error: {}", e)))?;

        let choice = response
            .choices
            .first()
            .ok_or_else(|| ReseptError::Agent("No response from model".to_string()))?;

        if let Some(ref tool_calls) = choice.message.tool_calls {
            if !tool_calls.is_empty() {
                debug!("Model requested {} tool call(s)", tool_calls.len());
                let requests = tool_calls
                    .iter()
                    .map(|call| ToolRequest {
                        id: call.id.clone(),
                        name: call.function.name.clone(),
                        arguments: call.function.arguments.clone(),
                    })
                    .collect();
                return Ok(ModelTurn::ToolCalls(requests));
            }
        }

        Ok(ModelTurn::Answer(
            choice.message.content.clone().unwrap_or_default(),
        ))
    }
}

/// Convert boundary messages into OpenAI request messages.
fn convert_messages(messages: &[ContextMessage]) -> Result<Vec<ChatCompletionRequestMessage>> {
    let mut out = Vec::with_capacity(messages.len());

    for message in messages {
        let converted: ChatCompletionRequestMessage = match message {
            ContextMessage::System(content) => ChatCompletionRequestSystemMessageArgs::default()
                .content(content.clone())
                .build()
                .map_err(|e| ReseptError::Agent(e.to_string()))?
                .into(),
            ContextMessage::User(content) => ChatCompletionRequestUserMessageArgs::default()
                .content(content.clone())
                .build()
                .map_err(|e| ReseptError::Agent(e.to_string()))?
                .into(),
            ContextMessage::Assistant(content) => {
                ChatCompletionRequestAssistantMessageArgs::default()
                    .content(content.clone())
                    .build()
                    .map_err(|e| ReseptError::Agent(e.to_string()))?
                    .into()
            }
            ContextMessage::ToolCalls(requests) => {
                let calls: Vec<ChatCompletionMessageToolCall> = requests
                    .iter()
                    .map(|r| ChatCompletionMessageToolCall {
                        id: r.id.clone(),
                        r#type: ChatCompletionToolType::Function,
                        function: FunctionCall {
                            name: r.name.clone(),
                            arguments: r.arguments.clone(),
                        },
                    })
                    .collect();
                ChatCompletionRequestAssistantMessageArgs::default()
                    .tool_calls(calls)
                    .build()
                    .map_err(|e| ReseptError::Agent(e.to_string()))?
                    .into()
            }
            ContextMessage::ToolResult { call_id, content } => {
                ChatCompletionRequestToolMessageArgs::default()
                    .tool_call_id(call_id.clone())
                    .content(content.clone())
                    .build()
                    .map_err(|e| ReseptError::Agent(e.to_string()))?
                    .into()
            }
        };
        out.push(converted);
    }

    Ok(out)
}

/// Convert tool descriptors into OpenAI function definitions.
fn convert_tools(tools: &[ToolSpec]) -> Vec<ChatCompletionTool> {
    tools
        .iter()
        .map(|spec| ChatCompletionTool {
            r#type: ChatCompletionToolType::Function,
            function: FunctionObject {
                name: spec.name.clone(),
                description: Some(spec.description.clone()),
                parameters: Some(spec.parameters.clone()),
                strict: None,
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_messages_covers_all_variants() {
        let messages = vec![
            ContextMessage::System("sys".to_string()),
            ContextMessage::User("question".to_string()),
            ContextMessage::Assistant("answer".to_string()),
            ContextMessage::ToolCalls(vec![ToolRequest {
                id: "call_1".to_string(),
                name: "web_search".to_string(),
                arguments: r#"{"query": "aspirin"}"#.to_string(),
            }]),
            ContextMessage::ToolResult {
                call_id: "call_1".to_string(),
                content: "results".to_string(),
            },
        ];

        let converted = convert_messages(&messages).unwrap();
        assert_eq!(converted.len(), 5);
    }

    #[test]
    fn test_convert_tools_keeps_schema() {
        let specs = vec![ToolSpec {
            name: "web_search".to_string(),
            description: "Search the web".to_string(),
            parameters: serde_json::json!({"type": "object", "properties": {}}),
        }];

        let tools = convert_tools(&specs);
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].function.name, "web_search");
        assert!(tools[0].function.parameters.is_some());
    }
}
