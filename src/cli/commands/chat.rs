//! Interactive chat command.

use crate::agent::{build_registry, Agent};
use crate::cli::{preflight, Output};
use crate::config::{Prompts, Settings};
use crate::error::Result;
use crate::model::OpenAiChatModel;
use crate::session::Session;
use crate::speech::Synthesizer;
use console::style;
use std::io::{self, BufRead, Write};
use std::sync::Arc;

/// Run the interactive chat command.
pub async fn run_chat(model: Option<String>, speak: bool, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(&settings) {
        Output::error(&format!("{}", e));
        return Err(e);
    }

    let prompts = Prompts::from_settings(&settings);
    let model_name = model.unwrap_or_else(|| settings.agent.model.clone());

    let registry = Arc::new(build_registry(&settings)?);
    let agent = Agent::new(
        Arc::new(OpenAiChatModel::new(&model_name)),
        registry,
        &settings,
    );

    let synthesizer = if speak {
        Some(Synthesizer::new(&settings.speech)?)
    } else {
        None
    };

    let mut session = Session::new(&prompts.greeting);

    println!("\n{}", style("Resept Chat").bold().cyan());
    println!(
        "{}\n",
        style("Ask about a medication. 'save' writes the transcript, 'clear' resets, 'exit' quits.")
            .dim()
    );
    println!("{} {}\n", style("Resept:").cyan().bold(), prompts.greeting);

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("{} ", style("You:").green().bold());
        stdout.flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            break;
        }

        let input = input.trim();

        if input.is_empty() {
            continue;
        }

        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            Output::info("Goodbye!");
            break;
        }

        if input.eq_ignore_ascii_case("clear") {
            session = Session::new(&prompts.greeting);
            Output::info("Conversation cleared.");
            continue;
        }

        if input.eq_ignore_ascii_case("save") {
            let path = format!("resept-transcript-{}.txt", session.id());
            std::fs::write(&path, session.transcript())?;
            Output::success(&format!("Transcript written to {}", path));
            continue;
        }

        session.push_user(input);

        match agent.respond(&session).await {
            Ok(response) => {
                session.push_assistant(&response.answer);

                for record in &response.trace {
                    Output::tool_call(&record.name, &record.arguments);
                }
                println!("\n{} {}\n", style("Resept:").cyan().bold(), response.answer);

                if let Some(synth) = &synthesizer {
                    let output = settings.data_dir().join(&settings.speech.output_filename);
                    match synth.synthesize_to_file(&response.answer, &output).await {
                        Ok(()) => Output::info(&format!("Audio: {}", output.display())),
                        Err(e) => Output::warning(&format!("Speech synthesis failed: {}", e)),
                    }
                }
            }
            Err(e) => {
                // Shown inline; the session keeps the user turn so a retry
                // has full context.
                Output::error(&format!("Error: {}", e));
            }
        }
    }

    Ok(())
}
