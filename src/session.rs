//! In-memory conversation state and transcript export.
//!
//! A [`Session`] is an append-only sequence of turns for one chat. Nothing is
//! persisted: state lives for the lifetime of the CLI process or web session.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Speaker role for a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "User"),
            Role::Assistant => write!(f, "Assistant"),
        }
    }
}

/// One message in a conversation. Immutable once appended.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

/// Conversation state for one chat session.
///
/// Turns are append-only and ordered by insertion; the first turn is always
/// the assistant greeting.
#[derive(Debug, Clone)]
pub struct Session {
    id: Uuid,
    started_at: DateTime<Utc>,
    turns: Vec<Turn>,
}

impl Session {
    /// Start a fresh session seeded with the assistant greeting.
    pub fn new(greeting: &str) -> Self {
        Self::with_id(Uuid::new_v4(), greeting)
    }

    /// Start a fresh session under a caller-chosen identifier.
    pub fn with_id(id: Uuid, greeting: &str) -> Self {
        Self {
            id,
            started_at: Utc::now(),
            turns: vec![Turn {
                role: Role::Assistant,
                content: greeting.to_string(),
            }],
        }
    }

    /// Session identifier.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// All turns in chat order.
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Number of turns so far.
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Append a user turn.
    pub fn push_user(&mut self, content: &str) {
        self.turns.push(Turn {
            role: Role::User,
            content: content.to_string(),
        });
    }

    /// Append an assistant turn.
    pub fn push_assistant(&mut self, content: &str) {
        self.turns.push(Turn {
            role: Role::Assistant,
            content: content.to_string(),
        });
    }

    /// Serialize the full conversation to a flat text transcript.
    ///
    /// Pure and deterministic: exporting twice with no new turns yields
    /// identical output.
    pub fn transcript(&self) -> String {
        let mut out = format!(
            "Resept conversation ({})\nStarted: {}\n",
            self.id,
            self.started_at.format("%Y-%m-%d %H:%M:%S UTC")
        );

        for turn in &self.turns {
            out.push_str(&format!("\n{}: {}\n", turn.role, turn.content));
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_starts_with_greeting() {
        let session = Session::new("How can I help you?");
        assert_eq!(session.len(), 1);
        assert_eq!(session.turns()[0].role, Role::Assistant);
        assert_eq!(session.turns()[0].content, "How can I help you?");
    }

    #[test]
    fn test_turns_preserve_insertion_order() {
        let mut session = Session::new("Hi");
        session.push_user("aspirin");
        session.push_assistant("Aspirin is...");
        session.push_user("dosage?");

        let roles: Vec<Role> = session.turns().iter().map(|t| t.role).collect();
        assert_eq!(
            roles,
            vec![Role::Assistant, Role::User, Role::Assistant, Role::User]
        );
    }

    #[test]
    fn test_transcript_is_idempotent() {
        let mut session = Session::new("Hi");
        session.push_user("ibuprofen");
        session.push_assistant("Ibuprofen is an NSAID.");

        assert_eq!(session.transcript(), session.transcript());
    }

    #[test]
    fn test_transcript_includes_new_turn_once_after_prior_turns() {
        let mut session = Session::new("Hi");
        session.push_user("ibuprofen");
        let before = session.transcript();

        session.push_assistant("Ibuprofen is an NSAID.");
        let after = session.transcript();

        assert!(after.starts_with(&before));
        assert_eq!(after.matches("Ibuprofen is an NSAID.").count(), 1);
    }
}
