// Chat session storage
//
// The orchestrator only appends to a session it did not create; ordering
// and retention are the store's concern. InMemorySessionStore is the
// default store for tests and embedders without persistence.

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::chat::types::ChatMessage;

/// One conversation: an id plus its ordered transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub messages: Vec<ChatMessage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    fn new(system_prompt: Option<&str>) -> Self {
        let now = Utc::now();
        let messages = match system_prompt {
            Some(prompt) => vec![ChatMessage::system(prompt)],
            None => Vec::new(),
        };
        Self {
            id: Uuid::new_v4().to_string(),
            messages,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Storage interface consumed by the orchestrator. The core appends
/// messages; it never deletes or reorders history it did not produce.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Create a session, optionally seeded with a system prompt. Returns
    /// the new session id.
    async fn create_session(&self, system_prompt: Option<&str>) -> Result<String>;

    async fn get_session(&self, session_id: &str) -> Result<Session>;

    /// Append one message to the transcript.
    async fn add_message(&self, session_id: &str, message: ChatMessage) -> Result<()>;

    /// The ordered transcript.
    async fn get_history(&self, session_id: &str) -> Result<Vec<ChatMessage>>;
}

/// Process-local session store.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: DashMap<String, Session>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create_session(&self, system_prompt: Option<&str>) -> Result<String> {
        let session = Session::new(system_prompt);
        let id = session.id.clone();
        self.sessions.insert(id.clone(), session);
        Ok(id)
    }

    async fn get_session(&self, session_id: &str) -> Result<Session> {
        match self.sessions.get(session_id) {
            Some(session) => Ok(session.clone()),
            None => bail!("session '{}' not found", session_id),
        }
    }

    async fn add_message(&self, session_id: &str, message: ChatMessage) -> Result<()> {
        match self.sessions.get_mut(session_id) {
            Some(mut session) => {
                session.messages.push(message);
                session.updated_at = Utc::now();
                Ok(())
            }
            None => bail!("session '{}' not found", session_id),
        }
    }

    async fn get_history(&self, session_id: &str) -> Result<Vec<ChatMessage>> {
        Ok(self.get_session(session_id).await?.messages)
    }
}
