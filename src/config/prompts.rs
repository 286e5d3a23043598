//! Prompt templates for Resept.
//!
//! Defaults can be overridden per-field via the `[prompts]` config section.

use super::Settings;
use std::collections::HashMap;

/// Default system prompt for the medication assistant.
const DEFAULT_SYSTEM_PROMPT: &str = r#"You are a helpful pharmaceutical and medical assistant that provides accurate and reliable information about medicines from trusted sources. You clearly explain up-to-date information about the medicines the user asks about. Give detailed answers with clear titles and section divisions.

Prefer these sources for details on medications: Centers for Disease Control and Prevention, ClinicalTrials.gov, Food and Drug Administration, National Cancer Institute, National Institutes of Health, National Library of Medicine, World Health Organization, https://www.drugs.com/fda-consumer, https://www.webmd.com/drugs/2/index, https://medlineplus.gov/

When search tools are available, use them to ground your answer and cite the sources you used. When you have gathered enough information, provide your final answer."#;

/// Default first assistant turn for a new session.
const DEFAULT_GREETING: &str = "How can I help you?";

/// Default template wrapping a bare medication name into a detail question.
const DEFAULT_QUESTION: &str = "Give a detailed description about the name, brand names, active ingredients, uses, side-effects, adverse reactions, potential drug interactions with other medications, foods, or substances, precautions and dosage forms of the medicine: {{medication}}";

/// Resolved prompt set for one run.
#[derive(Debug, Clone)]
pub struct Prompts {
    /// System instructions for the agent.
    pub system: String,
    /// First assistant turn for a new session.
    pub greeting: String,
    /// Detail-question template with a `{{medication}}` variable.
    pub question: String,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            system: DEFAULT_SYSTEM_PROMPT.to_string(),
            greeting: DEFAULT_GREETING.to_string(),
            question: DEFAULT_QUESTION.to_string(),
        }
    }
}

impl Prompts {
    /// Merge defaults with any overrides from the settings.
    pub fn from_settings(settings: &Settings) -> Self {
        let defaults = Prompts::default();
        Self {
            system: settings.prompts.system.clone().unwrap_or(defaults.system),
            greeting: settings
                .prompts
                .greeting
                .clone()
                .unwrap_or(defaults.greeting),
            question: settings
                .prompts
                .question
                .clone()
                .unwrap_or(defaults.question),
        }
    }

    /// Render the detail question for a medication name.
    pub fn question_for(&self, medication: &str) -> String {
        let mut vars = HashMap::new();
        vars.insert("medication".to_string(), medication.to_string());
        Self::render(&self.question, &vars)
    }

    /// Render a prompt template with the given variables.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prompts_non_empty() {
        let prompts = Prompts::default();
        assert!(!prompts.system.is_empty());
        assert!(!prompts.greeting.is_empty());
        assert!(prompts.question.contains("{{medication}}"));
    }

    #[test]
    fn test_question_for_substitutes_name() {
        let prompts = Prompts::default();
        let question = prompts.question_for("aspirin");
        assert!(question.ends_with("aspirin"));
        assert!(!question.contains("{{medication}}"));
    }

    #[test]
    fn test_settings_overrides_win() {
        let mut settings = Settings::default();
        settings.prompts.greeting = Some("Hei!".to_string());

        let prompts = Prompts::from_settings(&settings);
        assert_eq!(prompts.greeting, "Hei!");
        assert_eq!(prompts.system, Prompts::default().system);
    }
}
