//! Resept - Medication Q&A Assistant
//!
//! An LLM-backed assistant that answers questions about medications, with
//! optional web-search tools, speech output, and downloadable transcripts.
//!
//! The name "Resept" comes from the Norwegian word for "prescription."
//!
//! # Overview
//!
//! Resept allows you to:
//! - Ask about a medication and get a sourced, structured answer
//! - Chat interactively in the terminal or through a small web UI
//! - Listen to answers as synthesized speech
//! - Download the full conversation as a text transcript
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Configuration and prompt management
//! - `session` - In-memory conversation state and transcript export
//! - `model` - Chat model abstraction over the OpenAI API
//! - `search` - Web and semantic search clients
//! - `agent` - Tool registry and the tool-calling dispatch loop
//! - `speech` - Text-to-speech synthesis
//!
//! # Example
//!
//! ```rust,no_run
//! use resept::agent::{build_registry, Agent};
//! use resept::config::Settings;
//! use resept::model::OpenAiChatModel;
//! use resept::session::Session;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let model = Arc::new(OpenAiChatModel::new(&settings.agent.model));
//!     let registry = Arc::new(build_registry(&settings)?);
//!     let agent = Agent::new(model, registry, &settings);
//!
//!     let mut session = Session::new("How can I help you?");
//!     session.push_user("Tell me about aspirin.");
//!     let response = agent.respond(&session).await?;
//!     println!("{}", response.answer);
//!
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod cli;
pub mod config;
pub mod error;
pub mod model;
pub mod openai;
pub mod search;
pub mod session;
pub mod speech;

pub use error::{ReseptError, Result};
