//! Configuration settings for Resept.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub agent: AgentSettings,
    pub search: SearchSettings,
    pub speech: SpeechSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
    /// Directory for temporary files (synthesized audio clips).
    pub temp_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.resept".to_string(),
            temp_dir: "/tmp/resept".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Agent dispatch loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// LLM model for the agent.
    pub model: String,
    /// Maximum model turns per user submission.
    pub max_iterations: usize,
    /// How many invalid tool calls are fed back to the model before failing.
    pub recovery_attempts: usize,
    /// Timeout in seconds applied to each model call and tool invocation.
    pub call_timeout_secs: u64,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            max_iterations: 10,
            recovery_attempts: 3,
            call_timeout_secs: 120,
        }
    }
}

/// Search tool settings. Both tool families can be toggled independently.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Enable the generic web_search tool (no API key needed).
    pub web_search: bool,
    /// Enable the Metaphor tool family (requires METAPHOR_API_KEY).
    pub metaphor: bool,
    /// Number of results per search call.
    pub num_results: usize,
    /// Metaphor API base URL.
    pub metaphor_base_url: String,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            web_search: true,
            metaphor: true,
            num_results: 5,
            metaphor_base_url: crate::search::metaphor::DEFAULT_BASE_URL.to_string(),
        }
    }
}

/// Speech synthesis settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechSettings {
    /// Synthesize speech for answers.
    pub enabled: bool,
    /// Language code for the synthesized voice (e.g. "en").
    pub language: String,
    /// Speak slowly.
    pub slow: bool,
    /// Output filename for the `ask` and `chat` commands.
    pub output_filename: String,
}

impl Default for SpeechSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            language: "en".to_string(),
            slow: false,
            output_filename: "answer.mp3".to_string(),
        }
    }
}

/// Prompt overrides; defaults live in `config::Prompts`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Override the system prompt.
    pub system: Option<String>,
    /// Override the greeting shown as the first assistant turn.
    pub greeting: Option<String>,
    /// Override the medication detail-question template.
    pub question: Option<String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> crate::error::Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::ReseptError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("resept")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded temp directory path.
    pub fn temp_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.temp_dir)
    }

    /// Directory for synthesized audio clips served by the web UI.
    pub fn audio_dir(&self) -> PathBuf {
        self.temp_dir().join("audio")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let settings = Settings::default();
        assert_eq!(settings.agent.max_iterations, 10);
        assert!(settings.agent.max_iterations > 0);
        assert!(settings.search.web_search);
        assert_eq!(settings.speech.language, "en");
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [agent]
            model = "gpt-4o"
            max_iterations = 5
            "#,
        )
        .unwrap();

        assert_eq!(settings.agent.model, "gpt-4o");
        assert_eq!(settings.agent.max_iterations, 5);
        assert_eq!(settings.agent.recovery_attempts, 3);
        assert!(settings.speech.enabled);
    }
}
