//! Error types for Resept.

use thiserror::Error;

/// Library-level error type for Resept operations.
#[derive(Error, Debug)]
pub enum ReseptError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Agent error: {0}")]
    Agent(String),

    #[error("Invalid tool call: {0}")]
    Parsing(String),

    #[error("Tool '{name}' failed: {message}")]
    Tool { name: String, message: String },

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Speech synthesis failed: {0}")]
    Synthesis(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("OpenAI API error: {0}")]
    OpenAI(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl ReseptError {
    /// Build a tool failure from any displayable cause.
    pub fn tool(name: &str, cause: impl std::fmt::Display) -> Self {
        ReseptError::Tool {
            name: name.to_string(),
            message: cause.to_string(),
        }
    }
}

/// Result type alias for Resept operations.
pub type Result<T> = std::result::Result<T, ReseptError>;
