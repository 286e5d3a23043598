//! Web chat server.
//!
//! Serves a small single-page chat UI plus the JSON endpoints behind it:
//! message submission, transcript download, and synthesized audio clips.
//! Sessions live in memory only and are keyed by UUID.

use crate::agent::{build_registry, Agent};
use crate::cli::{preflight, Output};
use crate::config::{Prompts, Settings};
use crate::model::OpenAiChatModel;
use crate::session::Session;
use crate::speech::Synthesizer;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;
use uuid::Uuid;

/// Sessions kept in memory before the least recently used one is dropped.
const MAX_SESSIONS: usize = 256;

/// Age at which synthesized clips are deleted from the audio directory.
const CLIP_TTL: Duration = Duration::from_secs(60 * 60);

/// One conversation behind its own lock, so an in-flight agent run only
/// blocks submissions against the same session.
struct SessionSlot {
    session: Arc<Mutex<Session>>,
    last_used: Instant,
}

impl SessionSlot {
    fn new(session: Session) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
            last_used: Instant::now(),
        }
    }
}

/// Shared application state.
struct AppState {
    agent: Agent,
    synthesizer: Option<Synthesizer>,
    greeting: String,
    /// Session map. The outer mutex is held only for lookup and insertion;
    /// each slot carries the per-session lock.
    sessions: Mutex<HashMap<Uuid, SessionSlot>>,
    audio_dir: PathBuf,
}

/// Run the web chat server.
pub async fn run_serve(host: &str, port: u16, settings: Settings) -> anyhow::Result<()> {
    preflight::check(&settings)?;

    let prompts = Prompts::from_settings(&settings);
    let registry = Arc::new(build_registry(&settings)?);
    let agent = Agent::new(
        Arc::new(OpenAiChatModel::new(&settings.agent.model)),
        registry,
        &settings,
    );

    let synthesizer = if settings.speech.enabled {
        Some(Synthesizer::new(&settings.speech)?)
    } else {
        None
    };

    let audio_dir = settings.audio_dir();
    std::fs::create_dir_all(&audio_dir)?;

    let state = Arc::new(AppState {
        agent,
        synthesizer,
        greeting: prompts.greeting,
        sessions: Mutex::new(HashMap::new()),
        audio_dir,
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/chat", post(chat))
        .route("/transcript/{session_id}", get(transcript))
        .route("/audio/{clip_id}", get(audio))
        .layer(cors)
        .with_state(state);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Resept Web Chat");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Chat UI", "GET  /");
    Output::kv("Health", "GET  /health");
    Output::kv("Chat", "POST /chat");
    Output::kv("Transcript", "GET  /transcript/:session_id");
    Output::kv("Audio", "GET  /audio/:clip_id");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app).await?;

    Ok(())
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct ChatRequest {
    /// Omit to start a new session.
    session_id: Option<Uuid>,
    message: String,
}

#[derive(Serialize)]
struct ChatResponse {
    session_id: Uuid,
    reply: String,
    /// True when the reply is an inline error turn rather than an answer.
    error: bool,
    trace: Vec<TraceEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    audio_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    synthesis_error: Option<String>,
}

#[derive(Serialize)]
struct TraceEntry {
    name: String,
    arguments: String,
    summary: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// === Handlers ===

async fn index() -> impl IntoResponse {
    Html(CHAT_PAGE)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> impl IntoResponse {
    if req.message.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "Message must not be empty".to_string(),
            }),
        )
            .into_response();
    }

    let session_id = req.session_id.unwrap_or_else(Uuid::new_v4);

    // Hold the map lock only for lookup; the agent run below happens under
    // the session's own lock, so other sessions stay responsive.
    let session = {
        let mut sessions = state.sessions.lock().await;
        let slot = sessions
            .entry(session_id)
            .or_insert_with(|| SessionSlot::new(Session::with_id(session_id, &state.greeting)));
        slot.last_used = Instant::now();
        let session = Arc::clone(&slot.session);
        evict_stale(&mut sessions, MAX_SESSIONS);
        session
    };

    // Per-session lock: submissions against one conversation are serialized.
    let mut session = session.lock().await;
    session.push_user(&req.message);

    match state.agent.respond(&session).await {
        Ok(response) => {
            session.push_assistant(&response.answer);

            let (audio_url, synthesis_error) = match &state.synthesizer {
                Some(synth) => write_clip(synth, &state.audio_dir, &response.answer).await,
                None => (None, None),
            };

            let trace = response
                .trace
                .iter()
                .map(|r| TraceEntry {
                    name: r.name.clone(),
                    arguments: r.arguments.clone(),
                    summary: summarize(&r.result, 200),
                })
                .collect();

            Json(ChatResponse {
                session_id,
                reply: response.answer,
                error: false,
                trace,
                audio_url,
                synthesis_error,
            })
            .into_response()
        }
        Err(e) => {
            // Errors are shown inline as a chat turn, not as a dead request.
            warn!("Agent failed for session {}: {}", session_id, e);
            let reply = format!("Sorry, I could not answer that: {}", e);
            session.push_assistant(&reply);

            Json(ChatResponse {
                session_id,
                reply,
                error: true,
                trace: Vec::new(),
                audio_url: None,
                synthesis_error: None,
            })
            .into_response()
        }
    }
}

async fn transcript(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> impl IntoResponse {
    let session = {
        let sessions = state.sessions.lock().await;
        sessions
            .get(&session_id)
            .map(|slot| Arc::clone(&slot.session))
    };

    match session {
        Some(session) => {
            let session = session.lock().await;
            (
                [
                    (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"resept-transcript-{}.txt\"", session_id),
                    ),
                ],
                session.transcript(),
            )
                .into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Unknown session: {}", session_id),
            }),
        )
            .into_response(),
    }
}

async fn audio(
    State(state): State<Arc<AppState>>,
    Path(clip_id): Path<Uuid>,
) -> impl IntoResponse {
    // The UUID path parameter doubles as traversal protection.
    let path = state.audio_dir.join(format!("{}.mp3", clip_id));

    match tokio::fs::read(&path).await {
        Ok(bytes) => ([(header::CONTENT_TYPE, "audio/mpeg")], bytes).into_response(),
        Err(_) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Unknown audio clip: {}", clip_id),
            }),
        )
            .into_response(),
    }
}

/// Drop least recently used sessions until the map fits the cap.
fn evict_stale(sessions: &mut HashMap<Uuid, SessionSlot>, max: usize) {
    while sessions.len() > max {
        let oldest = sessions
            .iter()
            .min_by_key(|(_, slot)| slot.last_used)
            .map(|(id, _)| *id);
        match oldest {
            Some(id) => {
                sessions.remove(&id);
            }
            None => break,
        }
    }
}

/// Synthesize a clip and persist it under the audio directory.
///
/// Synthesis failures are reported alongside the answer, never instead of it.
async fn write_clip(
    synth: &Synthesizer,
    audio_dir: &std::path::Path,
    text: &str,
) -> (Option<String>, Option<String>) {
    prune_clips(audio_dir, CLIP_TTL).await;

    match synth.synthesize(text).await {
        Ok(bytes) => {
            let clip_id = Uuid::new_v4();
            let path = audio_dir.join(format!("{}.mp3", clip_id));
            match tokio::fs::write(&path, &bytes).await {
                Ok(()) => (Some(format!("/audio/{}", clip_id)), None),
                Err(e) => {
                    warn!("Failed to write audio clip: {}", e);
                    (None, Some(e.to_string()))
                }
            }
        }
        Err(e) => {
            warn!("Speech synthesis failed: {}", e);
            (None, Some(e.to_string()))
        }
    }
}

/// Delete clips older than `ttl` so the audio directory stays bounded.
async fn prune_clips(audio_dir: &std::path::Path, ttl: Duration) {
    let Ok(mut entries) = tokio::fs::read_dir(audio_dir).await else {
        return;
    };

    while let Ok(Some(entry)) = entries.next_entry().await {
        let Ok(meta) = entry.metadata().await else {
            continue;
        };
        let Ok(modified) = meta.modified() else {
            continue;
        };
        if modified.elapsed().map(|age| age > ttl).unwrap_or(false) {
            let _ = tokio::fs::remove_file(entry.path()).await;
        }
    }
}

/// Truncate a tool result for trace display.
fn summarize(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        format!("{}...", text.chars().take(max_chars).collect::<String>())
    }
}

/// Inline single-page chat UI.
const CHAT_PAGE: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Resept : Medicines made simple</title>
<style>
  body { font-family: system-ui, sans-serif; max-width: 720px; margin: 2rem auto; padding: 0 1rem; }
  #history { min-height: 300px; }
  .turn { margin: 0.75rem 0; padding: 0.6rem 0.9rem; border-radius: 10px; white-space: pre-wrap; }
  .assistant { background: #eef4ff; }
  .user { background: #e9f7ef; text-align: right; }
  .error { background: #fdecea; }
  .trace { color: #777; font-size: 0.8rem; margin: 0.2rem 0 0 0.5rem; }
  form { display: flex; gap: 0.5rem; margin-top: 1rem; }
  input[type=text] { flex: 1; padding: 0.6rem; }
  audio { width: 100%; margin-top: 0.5rem; }
</style>
</head>
<body>
<h2>&#129302; Resept : Medicines made simple</h2>
<div id="history"></div>
<audio id="player" controls hidden></audio>
<form id="form">
  <input id="input" type="text" placeholder="Type the name of a medication" autocomplete="off">
  <button type="submit">Send</button>
</form>
<p><a id="download" href="#" hidden>Download conversation transcript</a></p>
<script>
let sessionId = null;
const history = document.getElementById('history');
const player = document.getElementById('player');
const download = document.getElementById('download');

function addTurn(text, cls) {
  const div = document.createElement('div');
  div.className = 'turn ' + cls;
  div.textContent = text;
  history.appendChild(div);
  div.scrollIntoView();
  return div;
}

addTurn('How can I help you?', 'assistant');

document.getElementById('form').addEventListener('submit', async (e) => {
  e.preventDefault();
  const input = document.getElementById('input');
  const message = input.value.trim();
  if (!message) return;
  input.value = '';
  addTurn(message, 'user');
  const pending = addTurn('Thinking...', 'assistant');
  try {
    const res = await fetch('/chat', {
      method: 'POST',
      headers: {'Content-Type': 'application/json'},
      body: JSON.stringify({session_id: sessionId, message})
    });
    const data = await res.json();
    if (!res.ok) { pending.textContent = data.error; pending.className = 'turn error'; return; }
    sessionId = data.session_id;
    pending.textContent = data.reply;
    if (data.error) pending.className = 'turn error';
    for (const t of data.trace || []) {
      const div = document.createElement('div');
      div.className = 'trace';
      div.textContent = t.name + '(' + t.arguments + ')';
      history.insertBefore(div, pending);
    }
    if (data.audio_url) { player.src = data.audio_url; player.hidden = false; }
    download.href = '/transcript/' + sessionId;
    download.hidden = false;
  } catch (err) {
    pending.textContent = 'Request failed: ' + err;
    pending.className = 'turn error';
  }
});
</script>
</body>
</html>
"##;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::ToolRegistry;
    use crate::config::SpeechSettings;
    use crate::error::{ReseptError, Result};
    use crate::model::{ChatModel, ContextMessage, ModelTurn, ToolSpec};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    /// Model that replays a fixed script of turns.
    struct ScriptedModel {
        turns: StdMutex<VecDeque<ModelTurn>>,
    }

    impl ScriptedModel {
        fn new(turns: Vec<ModelTurn>) -> Arc<Self> {
            Arc::new(Self {
                turns: StdMutex::new(turns.into()),
            })
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn complete(
            &self,
            _messages: &[ContextMessage],
            _tools: &[ToolSpec],
        ) -> Result<ModelTurn> {
            self.turns
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| ReseptError::Agent("Script exhausted".to_string()))
        }
    }

    fn test_state(turns: Vec<ModelTurn>, synthesizer: Option<Synthesizer>) -> Arc<AppState> {
        let agent = Agent::new(
            ScriptedModel::new(turns),
            Arc::new(ToolRegistry::new()),
            &Settings::default(),
        );

        Arc::new(AppState {
            agent,
            synthesizer,
            greeting: "How can I help you?".to_string(),
            sessions: Mutex::new(HashMap::new()),
            audio_dir: std::env::temp_dir(),
        })
    }

    async fn response_json(response: impl IntoResponse) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_response().into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_chat_submission_adds_exactly_two_turns() {
        let state = test_state(
            vec![
                ModelTurn::Answer("Aspirin is an NSAID.".to_string()),
                ModelTurn::Answer("Typical adult dose is 300-600 mg.".to_string()),
            ],
            None,
        );

        let req = ChatRequest {
            session_id: None,
            message: "aspirin".to_string(),
        };
        let body = response_json(chat(State(Arc::clone(&state)), Json(req)).await).await;
        let session_id: Uuid = serde_json::from_value(body["session_id"].clone()).unwrap();

        {
            let sessions = state.sessions.lock().await;
            let session = sessions[&session_id].session.lock().await;
            // Greeting plus one user/assistant pair.
            assert_eq!(session.len(), 3);
        }

        let req = ChatRequest {
            session_id: Some(session_id),
            message: "what is the dosage?".to_string(),
        };
        let _ = chat(State(Arc::clone(&state)), Json(req)).await;

        let sessions = state.sessions.lock().await;
        let session = sessions[&session_id].session.lock().await;
        assert_eq!(session.len(), 5);
    }

    #[tokio::test]
    async fn test_agent_failure_adds_inline_error_turn() {
        // Empty script: the first model call fails.
        let state = test_state(Vec::new(), None);

        let req = ChatRequest {
            session_id: None,
            message: "aspirin".to_string(),
        };
        let body = response_json(chat(State(Arc::clone(&state)), Json(req)).await).await;
        assert_eq!(body["error"], true);

        let sessions = state.sessions.lock().await;
        let session = sessions.values().next().unwrap().session.lock().await;
        assert_eq!(session.len(), 3);
        assert!(session.turns()[2]
            .content
            .starts_with("Sorry, I could not answer"));
    }

    #[tokio::test]
    async fn test_synthesis_failure_keeps_assistant_turn() {
        // Port 9 refuses connections, so every synthesis attempt fails.
        let synth = Synthesizer::new(&SpeechSettings::default())
            .unwrap()
            .with_endpoint("http://127.0.0.1:9/translate_tts");
        let state = test_state(
            vec![ModelTurn::Answer("Aspirin is an NSAID.".to_string())],
            Some(synth),
        );

        let req = ChatRequest {
            session_id: None,
            message: "aspirin".to_string(),
        };
        let body = response_json(chat(State(Arc::clone(&state)), Json(req)).await).await;

        assert_eq!(body["reply"], "Aspirin is an NSAID.");
        assert!(body["synthesis_error"].is_string());
        assert!(body.get("audio_url").is_none());

        let sessions = state.sessions.lock().await;
        let session = sessions.values().next().unwrap().session.lock().await;
        assert_eq!(session.len(), 3);
        assert_eq!(session.turns()[2].content, "Aspirin is an NSAID.");
    }

    #[test]
    fn test_evict_stale_drops_least_recently_used() {
        let mut sessions = HashMap::new();
        let mut ids = Vec::new();
        for age in 0..4u64 {
            let id = Uuid::new_v4();
            let mut slot = SessionSlot::new(Session::with_id(id, "Hi"));
            slot.last_used = Instant::now() - Duration::from_secs(age + 1);
            sessions.insert(id, slot);
            ids.push(id);
        }

        evict_stale(&mut sessions, 2);

        assert_eq!(sessions.len(), 2);
        // The two most recently used survive.
        assert!(sessions.contains_key(&ids[0]));
        assert!(sessions.contains_key(&ids[1]));
    }

    #[test]
    fn test_summarize_truncates_long_results() {
        let long = "r".repeat(500);
        let summary = summarize(&long, 200);
        assert_eq!(summary.chars().count(), 203);
        assert!(summary.ends_with("..."));
    }

    #[test]
    fn test_chat_request_session_id_optional() {
        let req: ChatRequest = serde_json::from_str(r#"{"message": "aspirin"}"#).unwrap();
        assert!(req.session_id.is_none());
        assert_eq!(req.message, "aspirin");
    }
}
