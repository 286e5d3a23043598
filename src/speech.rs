//! Text-to-speech synthesis for answer audio.
//!
//! Uses the public Google Translate TTS endpoint (the service gTTS wraps).
//! The endpoint only accepts short inputs, so text is split into chunks at
//! sentence and word boundaries and the returned MP3 segments are
//! concatenated. All failures surface as `Synthesis` errors so callers can
//! isolate them from the text answer.

use crate::config::SpeechSettings;
use crate::error::{ReseptError, Result};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Public TTS endpoint.
const DEFAULT_ENDPOINT: &str = "https://translate.google.com/translate_tts";

/// Maximum characters the endpoint accepts per request.
const MAX_CHUNK_CHARS: usize = 200;

/// Request timeout per chunk.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Speech synthesizer with a fixed language/voice configuration.
pub struct Synthesizer {
    client: reqwest::Client,
    endpoint: String,
    language: String,
    slow: bool,
}

impl Synthesizer {
    /// Create a synthesizer from speech settings.
    pub fn new(settings: &SpeechSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| ReseptError::Synthesis(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            language: settings.language.clone(),
            slow: settings.slow,
        })
    }

    /// Override the endpoint (used in tests against a local server).
    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }

    /// Synthesize text to MP3 bytes.
    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ReseptError::Synthesis("Nothing to synthesize".to_string()));
        }

        let chunks = split_text(text, MAX_CHUNK_CHARS);
        debug!("Synthesizing {} chunk(s)", chunks.len());

        let speed = if self.slow { "0.3" } else { "1" };
        let mut audio = Vec::new();

        for chunk in &chunks {
            let response = self
                .client
                .get(&self.endpoint)
                .query(&[
                    ("ie", "UTF-8"),
                    ("client", "tw-ob"),
                    ("tl", self.language.as_str()),
                    ("ttsspeed", speed),
                    ("q", chunk.as_str()),
                ])
                .send()
                .await
                .map_err(|e| ReseptError::Synthesis(e.to_string()))?;

            if !response.status().is_success() {
                return Err(ReseptError::Synthesis(format!(
                    "TTS endpoint returned HTTP {}",
                    response.status()
                )));
            }

            let bytes = response
                .bytes()
                .await
                .map_err(|e| ReseptError::Synthesis(e.to_string()))?;
            audio.extend_from_slice(&bytes);
        }

        Ok(audio)
    }

    /// Synthesize text and write the MP3 to a file.
    pub async fn synthesize_to_file(&self, text: &str, path: &Path) -> Result<()> {
        let audio = self.synthesize(text).await?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ReseptError::Synthesis(e.to_string()))?;
        }
        std::fs::write(path, audio).map_err(|e| ReseptError::Synthesis(e.to_string()))?;
        Ok(())
    }
}

/// Split text into chunks of at most `max_chars` characters, breaking at
/// sentence boundaries where possible, then at word boundaries, then hard.
fn split_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for sentence in split_sentences(text) {
        let candidate_len = current.chars().count() + 1 + sentence.chars().count();
        if !current.is_empty() && candidate_len > max_chars {
            chunks.push(std::mem::take(&mut current));
        }

        if sentence.chars().count() > max_chars {
            // Oversized sentence: pack word by word.
            for word in sentence.split_whitespace() {
                let candidate_len = current.chars().count() + 1 + word.chars().count();
                if !current.is_empty() && candidate_len > max_chars {
                    chunks.push(std::mem::take(&mut current));
                }
                if word.chars().count() > max_chars {
                    // Pathological single token: hard split.
                    let chars: Vec<char> = word.chars().collect();
                    for piece in chars.chunks(max_chars) {
                        chunks.push(piece.iter().collect());
                    }
                } else {
                    if !current.is_empty() {
                        current.push(' ');
                    }
                    current.push_str(word);
                }
            }
        } else {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(&sentence);
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Split text into sentences, keeping terminal punctuation attached.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();

    for ch in text.chars() {
        current.push(ch);
        if matches!(ch, '.' | '!' | '?' | '\n') {
            let trimmed = current.trim();
            if !trimmed.is_empty() {
                sentences.push(trimmed.to_string());
            }
            current.clear();
        }
    }

    let trimmed = current.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }

    sentences
}
