//! CLI module for Resept.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Resept - Medication Q&A Assistant
///
/// Ask about medications and get sourced answers, with optional speech output
/// and downloadable transcripts. The name "Resept" comes from the Norwegian
/// word for "prescription."
#[derive(Parser, Debug)]
#[command(name = "resept")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ask a one-shot question about a medication
    Ask {
        /// Medication name or free-form question
        question: String,

        /// LLM model to use
        #[arg(short, long)]
        model: Option<String>,

        /// Also synthesize the answer as speech audio
        #[arg(short, long)]
        speak: bool,
    },

    /// Start an interactive chat session
    Chat {
        /// LLM model to use
        #[arg(short, long)]
        model: Option<String>,

        /// Synthesize each answer as speech audio
        #[arg(short, long)]
        speak: bool,
    },

    /// Start the web chat server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}
