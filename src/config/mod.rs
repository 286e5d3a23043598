//! Configuration management for Resept.

mod prompts;
mod settings;

pub use prompts::Prompts;
pub use settings::{
    AgentSettings, GeneralSettings, PromptSettings, SearchSettings, Settings, SpeechSettings,
};
