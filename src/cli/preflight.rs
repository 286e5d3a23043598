//! Pre-flight checks before talking to paid APIs.
//!
//! API keys are only ever read from the environment; a missing key fails at
//! startup with a configuration error instead of midway through a chat.

use crate::config::Settings;
use crate::error::{ReseptError, Result};

/// Verify that the keys required by the configured tool set are present.
pub fn check(settings: &Settings) -> Result<()> {
    check_env(
        "OPENAI_API_KEY",
        "Set it with: export OPENAI_API_KEY='sk-...'",
    )?;

    if settings.search.metaphor {
        check_env(
            "METAPHOR_API_KEY",
            "Set it, or disable [search].metaphor in the config.",
        )?;
    }

    Ok(())
}

/// Check that an environment variable is set and non-empty.
fn check_env(name: &str, hint: &str) -> Result<()> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => Ok(()),
        Ok(_) => Err(ReseptError::Config(format!("{} is empty. {}", name, hint))),
        Err(_) => Err(ReseptError::Config(format!("{} not set. {}", name, hint))),
    }
}
