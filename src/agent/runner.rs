//! Agent dispatch loop with tool calling.
//!
//! One `respond` call runs the loop for one user submission: ask the model,
//! execute any requested tools strictly one at a time, feed results back, and
//! repeat until the model produces a final answer or a limit is hit. The loop
//! is bounded by `max_iterations` model turns and every external call carries
//! a timeout.

use super::tools::ToolRegistry;
use crate::config::{Prompts, Settings};
use crate::error::{ReseptError, Result};
use crate::model::{ChatModel, ContextMessage, ModelTurn};
use crate::session::{Role, Session};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Agent that answers one user submission, calling tools as needed.
pub struct Agent {
    model: Arc<dyn ChatModel>,
    registry: Arc<ToolRegistry>,
    system_prompt: String,
    max_iterations: usize,
    recovery_attempts: usize,
    call_timeout: Duration,
}

impl Agent {
    /// Create an agent from settings.
    pub fn new(model: Arc<dyn ChatModel>, registry: Arc<ToolRegistry>, settings: &Settings) -> Self {
        let prompts = Prompts::from_settings(settings);
        Self {
            model,
            registry,
            system_prompt: prompts.system,
            max_iterations: settings.agent.max_iterations,
            recovery_attempts: settings.agent.recovery_attempts,
            call_timeout: Duration::from_secs(settings.agent.call_timeout_secs),
        }
    }

    /// Set a custom system prompt.
    pub fn with_system_prompt(mut self, prompt: &str) -> Self {
        self.system_prompt = prompt.to_string();
        self
    }

    /// Set maximum model turns per user submission.
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    /// Set how many invalid tool calls are fed back before the loop fails.
    pub fn with_recovery_attempts(mut self, attempts: usize) -> Self {
        self.recovery_attempts = attempts;
        self
    }

    /// Set the timeout applied to each model call and tool invocation.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Run the dispatch loop for the conversation's latest user turn.
    pub async fn respond(&self, session: &Session) -> Result<AgentResponse> {
        let mut messages: Vec<ContextMessage> =
            vec![ContextMessage::System(self.system_prompt.clone())];
        for turn in session.turns() {
            messages.push(match turn.role {
                Role::User => ContextMessage::User(turn.content.clone()),
                Role::Assistant => ContextMessage::Assistant(turn.content.clone()),
            });
        }

        let specs = self.registry.specs();
        let mut trace = Vec::new();
        let mut iterations = 0;
        let mut recoveries = 0;

        loop {
            iterations += 1;
            if iterations > self.max_iterations {
                return Err(ReseptError::Agent(format!(
                    "Agent exceeded maximum iterations ({})",
                    self.max_iterations
                )));
            }

            debug!("Agent iteration {}, {} messages", iterations, messages.len());

            let turn = timeout(self.call_timeout, self.model.complete(&messages, &specs))
                .await
                .map_err(|_| {
                    ReseptError::Timeout(format!(
                        "Model call exceeded {}s",
                        self.call_timeout.as_secs()
                    ))
                })??;

            let requests = match turn {
                ModelTurn::Answer(answer) => {
                    debug!("Final answer after {} iteration(s)", iterations);
                    return Ok(AgentResponse {
                        answer,
                        trace,
                        iterations,
                    });
                }
                ModelTurn::ToolCalls(requests) => requests,
            };

            messages.push(ContextMessage::ToolCalls(requests.clone()));

            // One active tool call at a time, in the order requested.
            for request in requests {
                info!("Agent calling tool: {} with args: {}", request.name, request.arguments);

                let outcome = timeout(
                    self.call_timeout,
                    self.registry.dispatch(&request.name, &request.arguments),
                )
                .await
                .map_err(|_| {
                    ReseptError::Timeout(format!(
                        "Tool '{}' exceeded {}s",
                        request.name,
                        self.call_timeout.as_secs()
                    ))
                })?;

                let content = match outcome {
                    Ok(output) => {
                        trace.push(ToolCallRecord {
                            name: request.name.clone(),
                            arguments: request.arguments.clone(),
                            result: output.clone(),
                        });
                        output
                    }
                    Err(ReseptError::Parsing(msg)) => {
                        recoveries += 1;
                        if recoveries > self.recovery_attempts {
                            return Err(ReseptError::Parsing(msg));
                        }
                        warn!("Invalid tool call ({}), feeding error back to model", msg);
                        format!(
                            "Invalid tool call: {}. Correct the call or answer directly.",
                            msg
                        )
                    }
                    Err(err @ ReseptError::Timeout(_)) => return Err(err),
                    Err(err @ ReseptError::Tool { .. }) => {
                        warn!("{}", err);
                        let description = format!("Tool error: {}", err);
                        trace.push(ToolCallRecord {
                            name: request.name.clone(),
                            arguments: request.arguments.clone(),
                            result: description.clone(),
                        });
                        description
                    }
                    Err(other) => return Err(other),
                };

                messages.push(ContextMessage::ToolResult {
                    call_id: request.id.clone(),
                    content,
                });
            }
        }
    }
}

/// Response from one dispatch loop run.
#[derive(Debug)]
pub struct AgentResponse {
    /// The final answer text from the model.
    pub answer: String,
    /// Record of executed tool calls, in invocation order.
    pub trace: Vec<ToolCallRecord>,
    /// Number of model turns used.
    pub iterations: usize,
}

/// Record of one executed tool call.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ToolCallRecord {
    /// Name of the tool called.
    pub name: String,
    /// JSON arguments passed to the tool.
    pub arguments: String,
    /// Result (or failure description) returned by the tool.
    pub result: String,
}

impl std::fmt::Display for ToolCallRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name, self.arguments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::tools::Tool;
    use crate::model::{ToolRequest, ToolSpec};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Model that replays a fixed script of turns.
    struct ScriptedModel {
        turns: Mutex<VecDeque<ModelTurn>>,
    }

    impl ScriptedModel {
        fn new(turns: Vec<ModelTurn>) -> Arc<Self> {
            Arc::new(Self {
                turns: Mutex::new(turns.into()),
            })
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn complete(
            &self,
            _messages: &[ContextMessage],
            _tools: &[ToolSpec],
        ) -> Result<ModelTurn> {
            self.turns
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| ReseptError::Agent("Script exhausted".to_string()))
        }
    }

    /// Model that never answers in time.
    struct StalledModel;

    #[async_trait]
    impl ChatModel for StalledModel {
        async fn complete(
            &self,
            _messages: &[ContextMessage],
            _tools: &[ToolSpec],
        ) -> Result<ModelTurn> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(ModelTurn::Answer("too late".to_string()))
        }
    }

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo the input back"
        }

        fn parameters(&self) -> Value {
            serde_json::json!({
                "type": "object",
                "properties": {"text": {"type": "string"}},
                "required": ["text"]
            })
        }

        async fn invoke(&self, args: Value) -> Result<String> {
            Ok(format!("echo: {}", args["text"].as_str().unwrap_or("")))
        }
    }

    struct BrokenTool;

    #[async_trait]
    impl Tool for BrokenTool {
        fn name(&self) -> &str {
            "broken"
        }

        fn description(&self) -> &str {
            "Always fails"
        }

        fn parameters(&self) -> Value {
            serde_json::json!({"type": "object", "properties": {}})
        }

        async fn invoke(&self, _args: Value) -> Result<String> {
            Err(ReseptError::Search("upstream down".to_string()))
        }
    }

    fn registry() -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool)).unwrap();
        registry.register(Arc::new(BrokenTool)).unwrap();
        Arc::new(registry)
    }

    fn agent(model: Arc<dyn ChatModel>) -> Agent {
        Agent::new(model, registry(), &Settings::default())
    }

    fn call(id: &str, name: &str, arguments: &str) -> ToolRequest {
        ToolRequest {
            id: id.to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }
    }

    fn session() -> Session {
        let mut session = Session::new("How can I help you?");
        session.push_user("aspirin");
        session
    }

    #[tokio::test]
    async fn test_direct_answer_completes_in_one_iteration() {
        let model = ScriptedModel::new(vec![ModelTurn::Answer("Aspirin is an NSAID.".to_string())]);
        let response = agent(model).respond(&session()).await.unwrap();

        assert_eq!(response.answer, "Aspirin is an NSAID.");
        assert_eq!(response.iterations, 1);
        assert!(response.trace.is_empty());
    }

    #[tokio::test]
    async fn test_trace_records_tool_calls_in_order() {
        let model = ScriptedModel::new(vec![
            ModelTurn::ToolCalls(vec![
                call("c1", "echo", r#"{"text": "first"}"#),
                call("c2", "echo", r#"{"text": "second"}"#),
            ]),
            ModelTurn::ToolCalls(vec![call("c3", "echo", r#"{"text": "third"}"#)]),
            ModelTurn::Answer("done".to_string()),
        ]);

        let response = agent(model).respond(&session()).await.unwrap();

        assert_eq!(response.answer, "done");
        assert_eq!(response.iterations, 3);
        let results: Vec<&str> = response.trace.iter().map(|r| r.result.as_str()).collect();
        assert_eq!(results, vec!["echo: first", "echo: second", "echo: third"]);
    }

    #[tokio::test]
    async fn test_unknown_tool_recovers_when_budget_allows() {
        let model = ScriptedModel::new(vec![
            ModelTurn::ToolCalls(vec![call("c1", "imaginary", "{}")]),
            ModelTurn::Answer("recovered".to_string()),
        ]);

        let response = agent(model).respond(&session()).await.unwrap();

        assert_eq!(response.answer, "recovered");
        // Rejected calls never reach an adapter and are not traced.
        assert!(response.trace.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_tool_fails_without_recovery_budget() {
        let model = ScriptedModel::new(vec![ModelTurn::ToolCalls(vec![call(
            "c1",
            "imaginary",
            "{}",
        )])]);

        let result = agent(model).with_recovery_attempts(0).respond(&session()).await;
        assert!(matches!(result, Err(ReseptError::Parsing(_))));
    }

    #[tokio::test]
    async fn test_invalid_arguments_exhaust_recovery_budget() {
        let bad_call = || ModelTurn::ToolCalls(vec![call("c", "echo", r#"{"count": 1}"#)]);
        let model = ScriptedModel::new(vec![bad_call(), bad_call(), bad_call()]);

        let result = agent(model).with_recovery_attempts(2).respond(&session()).await;
        assert!(matches!(result, Err(ReseptError::Parsing(_))));
    }

    #[tokio::test]
    async fn test_iteration_cap_always_terminates() {
        let looping: Vec<ModelTurn> = (0..10)
            .map(|i| ModelTurn::ToolCalls(vec![call(&format!("c{}", i), "echo", r#"{"text": "x"}"#)]))
            .collect();
        let model = ScriptedModel::new(looping);

        let result = agent(model).with_max_iterations(3).respond(&session()).await;
        assert!(matches!(result, Err(ReseptError::Agent(_))));
    }

    #[tokio::test]
    async fn test_adapter_failure_is_fed_back_not_fatal() {
        let model = ScriptedModel::new(vec![
            ModelTurn::ToolCalls(vec![call("c1", "broken", "{}")]),
            ModelTurn::Answer("answered anyway".to_string()),
        ]);

        let response = agent(model).respond(&session()).await.unwrap();

        assert_eq!(response.answer, "answered anyway");
        assert_eq!(response.trace.len(), 1);
        assert!(response.trace[0].result.contains("Tool error"));
    }

    #[tokio::test]
    async fn test_stalled_model_times_out() {
        let result = agent(Arc::new(StalledModel))
            .with_call_timeout(Duration::from_millis(20))
            .respond(&session())
            .await;
        assert!(matches!(result, Err(ReseptError::Timeout(_))));
    }

    #[test]
    fn test_tool_call_record_display() {
        let record = ToolCallRecord {
            name: "web_search".to_string(),
            arguments: r#"{"query": "aspirin"}"#.to_string(),
            result: "Found results".to_string(),
        };
        assert_eq!(format!("{}", record), r#"web_search({"query": "aspirin"})"#);
    }
}
