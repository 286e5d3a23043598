//! Tool adapters and the registry that dispatches model tool calls.
//!
//! Each adapter wraps one external capability behind a name, a description the
//! model uses to decide applicability, and a JSON schema for its arguments.
//! The registry validates a requested call against the schema before the
//! adapter ever runs.

use crate::config::Settings;
use crate::error::{ReseptError, Result};
use crate::model::ToolSpec;
use crate::search::{DuckDuckGo, MetaphorClient};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// A capability exposed to the model.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique tool name.
    fn name(&self) -> &str;

    /// Natural-language description shown to the model.
    fn description(&self) -> &str;

    /// JSON schema for the accepted arguments.
    fn parameters(&self) -> Value;

    /// Invoke the tool with validated arguments.
    async fn invoke(&self, args: Value) -> Result<String>;
}

/// Registry of tools available to one agent, keyed by unique name.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Names must be unique within a registry.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        if self.tools.iter().any(|t| t.name() == tool.name()) {
            return Err(ReseptError::InvalidInput(format!(
                "Duplicate tool name: {}",
                tool.name()
            )));
        }
        self.tools.push(tool);
        Ok(())
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Descriptors for every registered tool, in registration order.
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools
            .iter()
            .map(|t| ToolSpec {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters(),
            })
            .collect()
    }

    /// Validate and execute one tool call.
    ///
    /// Unknown names and malformed arguments fail with a parsing error
    /// without invoking any adapter; adapter failures are reported as
    /// tool errors carrying the tool name.
    pub async fn dispatch(&self, name: &str, raw_args: &str) -> Result<String> {
        let tool = self
            .tools
            .iter()
            .find(|t| t.name() == name)
            .ok_or_else(|| ReseptError::Parsing(format!("Unknown tool: {}", name)))?;

        let raw_args = if raw_args.trim().is_empty() {
            "{}"
        } else {
            raw_args
        };
        let args: Value = serde_json::from_str(raw_args)
            .map_err(|e| ReseptError::Parsing(format!("Invalid tool arguments: {}", e)))?;

        validate_arguments(&tool.parameters(), &args)?;

        debug!("Dispatching tool '{}'", name);
        tool.invoke(args).await.map_err(|e| match e {
            err @ ReseptError::Tool { .. } => err,
            other => ReseptError::tool(name, other),
        })
    }
}

/// Check arguments against a tool's JSON schema: required keys must be
/// present, and declared property types must match.
fn validate_arguments(schema: &Value, args: &Value) -> Result<()> {
    let object = args
        .as_object()
        .ok_or_else(|| ReseptError::Parsing("Tool arguments must be a JSON object".to_string()))?;

    if let Some(required) = schema["required"].as_array() {
        for key in required.iter().filter_map(|k| k.as_str()) {
            if !object.contains_key(key) {
                return Err(ReseptError::Parsing(format!(
                    "Missing required argument: {}",
                    key
                )));
            }
        }
    }

    if let Some(properties) = schema["properties"].as_object() {
        for (key, value) in object {
            let Some(expected) = properties.get(key).and_then(|p| p["type"].as_str()) else {
                continue;
            };
            let matches = match expected {
                "string" => value.is_string(),
                "integer" => value.is_i64() || value.is_u64(),
                "number" => value.is_number(),
                "boolean" => value.is_boolean(),
                "array" => value.is_array(),
                "object" => value.is_object(),
                _ => true,
            };
            if !matches {
                return Err(ReseptError::Parsing(format!(
                    "Argument '{}' should be of type {}",
                    key, expected
                )));
            }
        }
    }

    Ok(())
}

/// Build the tool registry described by the settings.
///
/// The tool set is configurable: generic web search and the Metaphor tool
/// family can be toggled independently. With everything disabled the agent
/// runs tool-less and answers from the model alone.
pub fn build_registry(settings: &Settings) -> Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    let num_results = settings.search.num_results;

    if settings.search.web_search {
        registry.register(Arc::new(WebSearchTool {
            client: DuckDuckGo::new()?,
            num_results,
        }))?;
    }

    if settings.search.metaphor {
        let api_key = std::env::var("METAPHOR_API_KEY").map_err(|_| {
            ReseptError::Config(
                "METAPHOR_API_KEY not set but Metaphor tools are enabled. \
                 Set it or disable [search].metaphor in the config."
                    .to_string(),
            )
        })?;
        let client = Arc::new(MetaphorClient::with_base_url(
            &api_key,
            &settings.search.metaphor_base_url,
        )?);

        registry.register(Arc::new(SemanticSearchTool {
            client: client.clone(),
            num_results,
        }))?;
        registry.register(Arc::new(FetchContentsTool {
            client: client.clone(),
        }))?;
        registry.register(Arc::new(FindSimilarTool {
            client,
            num_results,
        }))?;
    }

    Ok(registry)
}

// === Adapters ===

/// Generic web search over DuckDuckGo.
struct WebSearchTool {
    client: DuckDuckGo,
    num_results: usize,
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web with a query about medicines and medication. \
         Returns ranked result titles, URLs, and snippets."
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                }
            },
            "required": ["query"]
        })
    }

    async fn invoke(&self, args: Value) -> Result<String> {
        let query = required_str(&args, "query")?;
        let results = self.client.search(query, self.num_results).await?;

        if results.is_empty() {
            return Ok("No results found.".to_string());
        }

        let formatted = results
            .iter()
            .enumerate()
            .map(|(i, r)| format!("{}. {}\n   {}\n   {}", i + 1, r.title, r.url, r.snippet))
            .collect::<Vec<_>>()
            .join("\n\n");

        Ok(format!("Found {} results:\n\n{}", results.len(), formatted))
    }
}

/// Semantic document search via Metaphor.
struct SemanticSearchTool {
    client: Arc<MetaphorClient>,
    num_results: usize,
}

#[async_trait]
impl Tool for SemanticSearchTool {
    fn name(&self) -> &str {
        "semantic_search"
    }

    fn description(&self) -> &str {
        "Call the semantic search engine with a query on medicines and medication. \
         Returns ranked documents with ids, titles, and URLs. Use fetch_contents \
         with the returned ids to read the documents."
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                }
            },
            "required": ["query"]
        })
    }

    async fn invoke(&self, args: Value) -> Result<String> {
        let query = required_str(&args, "query")?;
        let results = self.client.search(query, self.num_results).await?;

        if results.is_empty() {
            return Ok("No documents found.".to_string());
        }

        Ok(format_documents(&results))
    }
}

/// Full-text fetch for documents found by semantic_search.
struct FetchContentsTool {
    client: Arc<MetaphorClient>,
}

/// Cap per-document extract length fed back to the model.
const MAX_EXTRACT_CHARS: usize = 2000;

#[async_trait]
impl Tool for FetchContentsTool {
    fn name(&self) -> &str {
        "fetch_contents"
    }

    fn description(&self) -> &str {
        "Get the full text contents of webpages. The ids passed in should be a \
         list of ids as returned from semantic_search."
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "ids": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Document ids from semantic_search"
                }
            },
            "required": ["ids"]
        })
    }

    async fn invoke(&self, args: Value) -> Result<String> {
        let ids: Vec<String> = args["ids"]
            .as_array()
            .map(|a| {
                a.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        if ids.is_empty() {
            return Err(ReseptError::InvalidInput(
                "'ids' must be a non-empty list of document ids".to_string(),
            ));
        }

        let documents = self.client.contents(&ids).await?;

        if documents.is_empty() {
            return Ok("No contents found for the given ids.".to_string());
        }

        let formatted = documents
            .iter()
            .map(|d| {
                format!(
                    "## {} ({})\n{}\n{}",
                    d.title.as_deref().unwrap_or("Untitled"),
                    d.id,
                    d.url,
                    d.extract.chars().take(MAX_EXTRACT_CHARS).collect::<String>()
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        Ok(formatted)
    }
}

/// Similar-document lookup by URL.
struct FindSimilarTool {
    client: Arc<MetaphorClient>,
    num_results: usize,
}

#[async_trait]
impl Tool for FindSimilarTool {
    fn name(&self) -> &str {
        "find_similar"
    }

    fn description(&self) -> &str {
        "Get search results similar to a given URL. The url should be one \
         returned from semantic_search or web_search."
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "A URL from earlier search results"
                }
            },
            "required": ["url"]
        })
    }

    async fn invoke(&self, args: Value) -> Result<String> {
        let raw_url = required_str(&args, "url")?;
        let parsed = url::Url::parse(raw_url)
            .map_err(|e| ReseptError::InvalidInput(format!("Invalid URL '{}': {}", raw_url, e)))?;

        let results = self.client.find_similar(parsed.as_str(), self.num_results).await?;

        if results.is_empty() {
            return Ok("No similar documents found.".to_string());
        }

        Ok(format_documents(&results))
    }
}

/// Format ranked documents for the model context.
fn format_documents(results: &[crate::search::metaphor::SearchResult]) -> String {
    let formatted = results
        .iter()
        .enumerate()
        .map(|(i, r)| {
            format!(
                "{}. {} (id: {})\n   {}",
                i + 1,
                r.title.as_deref().unwrap_or("Untitled"),
                r.id,
                r.url
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!("Found {} documents:\n\n{}", results.len(), formatted)
}

fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str> {
    args[key]
        .as_str()
        .ok_or_else(|| ReseptError::Parsing(format!("Missing '{}' argument", key)))
}

#[cfg(test)]
mod tests {
    use super::*;

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
                "properties": {
                    "text": {"type": "string"},
                    "count": {"type": "integer"}
                },
                "required": ["text"]
            })
        }

        async fn invoke(&self, args: Value) -> Result<String> {
            Ok(format!("echo: {}", args["text"].as_str().unwrap_or("")))
        }
    }

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn name(&self) -> &str {
            "failing"
        }

        fn description(&self) -> &str {
            "Always fails"
        }

        fn parameters(&self) -> Value {
            serde_json::json!({"type": "object", "properties": {}})
        }

        async fn invoke(&self, _args: Value) -> Result<String> {
            Err(ReseptError::Search("service unavailable".to_string()))
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool)).unwrap();
        registry.register(Arc::new(FailingTool)).unwrap();
        registry
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut registry = registry();
        let result = registry.register(Arc::new(EchoTool));
        assert!(matches!(result, Err(ReseptError::InvalidInput(_))));
    }

    #[test]
    fn test_specs_preserve_registration_order() {
        let specs = registry().specs();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].name, "echo");
        assert_eq!(specs[1].name, "failing");
    }

    #[tokio::test]
    async fn test_dispatch_executes_valid_call() {
        let result = registry()
            .dispatch("echo", r#"{"text": "hello"}"#)
            .await
            .unwrap();
        assert_eq!(result, "echo: hello");
    }

    #[tokio::test]
    async fn test_dispatch_unknown_tool_is_parsing_error() {
        let result = registry().dispatch("nope", "{}").await;
        assert!(matches!(result, Err(ReseptError::Parsing(_))));
    }

    #[tokio::test]
    async fn test_dispatch_missing_required_argument() {
        let result = registry().dispatch("echo", r#"{"count": 3}"#).await;
        assert!(matches!(result, Err(ReseptError::Parsing(_))));
    }

    #[tokio::test]
    async fn test_dispatch_wrong_argument_type() {
        let result = registry()
            .dispatch("echo", r#"{"text": "hi", "count": "three"}"#)
            .await;
        assert!(matches!(result, Err(ReseptError::Parsing(_))));
    }

    #[tokio::test]
    async fn test_dispatch_invalid_json_arguments() {
        let result = registry().dispatch("echo", "{not json").await;
        assert!(matches!(result, Err(ReseptError::Parsing(_))));
    }

    #[tokio::test]
    async fn test_dispatch_empty_arguments_treated_as_empty_object() {
        let result = registry().dispatch("failing", "").await;
        // Reaches the adapter (schema has no required keys), which fails.
        assert!(matches!(result, Err(ReseptError::Tool { .. })));
    }

    #[tokio::test]
    async fn test_adapter_failure_carries_tool_name() {
        let result = registry().dispatch("failing", "{}").await;
        match result {
            Err(ReseptError::Tool { name, .. }) => assert_eq!(name, "failing"),
            other => panic!("Expected tool error, got {:?}", other),
        }
    }
}
