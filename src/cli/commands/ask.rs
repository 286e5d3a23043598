//! Ask command implementation.

use crate::agent::{build_registry, Agent};
use crate::cli::{preflight, Output};
use crate::config::{Prompts, Settings};
use crate::model::OpenAiChatModel;
use crate::session::Session;
use crate::speech::Synthesizer;
use anyhow::Result;
use std::sync::Arc;

/// Run the ask command.
pub async fn run_ask(
    question: &str,
    model: Option<String>,
    speak: bool,
    settings: Settings,
) -> Result<()> {
    if let Err(e) = preflight::check(&settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let prompts = Prompts::from_settings(&settings);
    let model_name = model.unwrap_or_else(|| settings.agent.model.clone());

    let registry = Arc::new(build_registry(&settings)?);
    let agent = Agent::new(
        Arc::new(OpenAiChatModel::new(&model_name)),
        registry,
        &settings,
    );

    // A bare medication name gets the full detail-question treatment;
    // anything longer is passed through as asked.
    let message = if is_bare_name(question) {
        prompts.question_for(question)
    } else {
        question.to_string()
    };

    let mut session = Session::new(&prompts.greeting);
    session.push_user(&message);

    let spinner = Output::spinner("Consulting medication sources...");

    let response = match agent.respond(&session).await {
        Ok(response) => {
            spinner.finish_and_clear();
            response
        }
        Err(e) => {
            spinner.finish_and_clear();
            Output::error(&format!("Failed to generate answer: {}", e));
            return Err(e.into());
        }
    };

    session.push_assistant(&response.answer);
    println!("\n{}\n", response.answer);

    if !response.trace.is_empty() {
        Output::header("Tools used");
        for record in &response.trace {
            Output::tool_call(&record.name, &record.arguments);
        }
        println!();
    }

    if speak {
        let spinner = Output::spinner("Generating voice output...");
        let output = settings.data_dir().join(&settings.speech.output_filename);
        match Synthesizer::new(&settings.speech) {
            Ok(synth) => match synth.synthesize_to_file(&response.answer, &output).await {
                Ok(()) => {
                    spinner.finish_and_clear();
                    Output::success(&format!("Audio written to {}", output.display()));
                }
                Err(e) => {
                    spinner.finish_and_clear();
                    Output::warning(&format!("Speech synthesis failed: {}", e));
                }
            },
            Err(e) => {
                spinner.finish_and_clear();
                Output::warning(&format!("Speech synthesis unavailable: {}", e));
            }
        }
    }

    Ok(())
}

/// Heuristic: treat short, non-question inputs as bare medication names.
fn is_bare_name(input: &str) -> bool {
    input.split_whitespace().count() <= 3 && !input.contains('?')
}
