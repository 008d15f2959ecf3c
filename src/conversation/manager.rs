//! In-memory conversational AI sessions
//!
//! Each session is a plain record keyed by conversation id with a status of
//! `idle`, `processing` or `error`. Route handlers and WebSocket sessions
//! mutate it directly; the only guard is that one turn runs at a time.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::llm::ChatMessage;

/// Turns kept per session (user + assistant messages)
pub const MAX_SESSION_HISTORY: usize = 50;
/// Sessions not updated for this long are swept
pub const IDLE_TIMEOUT_MINUTES: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    Idle,
    Processing,
    Error,
}

#[derive(Debug, Clone)]
struct ConversationState {
    user_id: Uuid,
    avatar_id: Uuid,
    status: ConversationStatus,
    history: Vec<ChatMessage>,
    last_reply: Option<String>,
    last_audio_base64: Option<String>,
    last_error: Option<String>,
    turns: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Client-facing view of a session
#[derive(Debug, Clone, Serialize)]
pub struct ConversationSnapshot {
    pub conversation_id: Uuid,
    pub avatar_id: Uuid,
    pub status: ConversationStatus,
    pub last_reply: Option<String>,
    pub last_audio_base64: Option<String>,
    pub last_error: Option<String>,
    pub turns: u64,
    pub history_len: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Everything a turn needs once it has been accepted
#[derive(Debug, Clone)]
pub struct AcceptedTurn {
    pub conversation_id: Uuid,
    pub avatar_id: Uuid,
    pub history: Vec<ChatMessage>,
}

#[derive(Default)]
pub struct ConversationManager {
    sessions: DashMap<Uuid, ConversationState>,
}

impl ConversationManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&self, user_id: Uuid, avatar_id: Uuid) -> ConversationSnapshot {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let state = ConversationState {
            user_id,
            avatar_id,
            status: ConversationStatus::Idle,
            history: Vec::new(),
            last_reply: None,
            last_audio_base64: None,
            last_error: None,
            turns: 0,
            created_at: now,
            updated_at: now,
        };
        let snapshot = snapshot(id, &state);
        self.sessions.insert(id, state);

        info!(conversation_id = %id, user_id = %user_id, avatar_id = %avatar_id, "Conversation started");
        snapshot
    }

    /// Read a session; other users' sessions look absent
    pub fn get(&self, id: Uuid, user_id: Uuid) -> Option<ConversationSnapshot> {
        self.sessions
            .get(&id)
            .filter(|s| s.user_id == user_id)
            .map(|s| snapshot(id, &s))
    }

    /// Move to `processing`, rejecting concurrent turns
    pub fn begin_turn(&self, id: Uuid, user_id: Uuid) -> Result<AcceptedTurn, ConversationError> {
        let mut state = self
            .sessions
            .get_mut(&id)
            .filter(|s| s.user_id == user_id)
            .ok_or(ConversationError::NotFound)?;

        if state.status == ConversationStatus::Processing {
            return Err(ConversationError::Busy);
        }

        state.status = ConversationStatus::Processing;
        state.last_error = None;
        state.updated_at = Utc::now();

        Ok(AcceptedTurn {
            conversation_id: id,
            avatar_id: state.avatar_id,
            history: state.history.clone(),
        })
    }

    /// `processing -> idle`, appending the exchange to history
    pub fn complete_turn(
        &self,
        id: Uuid,
        user_text: &str,
        reply: &str,
        audio_base64: Option<String>,
    ) {
        let Some(mut state) = self.sessions.get_mut(&id) else {
            debug!(conversation_id = %id, "Turn completed for ended conversation");
            return;
        };

        state.history.push(ChatMessage::user(user_text));
        state.history.push(ChatMessage::assistant(reply));
        let overflow = state.history.len().saturating_sub(MAX_SESSION_HISTORY);
        state.history.drain(..overflow);

        state.status = ConversationStatus::Idle;
        state.last_reply = Some(reply.to_string());
        state.last_audio_base64 = audio_base64;
        state.turns += 1;
        state.updated_at = Utc::now();
    }

    /// `processing -> error`
    pub fn fail_turn(&self, id: Uuid, error: &str) {
        if let Some(mut state) = self.sessions.get_mut(&id) {
            state.status = ConversationStatus::Error;
            state.last_error = Some(error.to_string());
            state.updated_at = Utc::now();
        }
    }

    pub fn end(&self, id: Uuid, user_id: Uuid) -> bool {
        let removed = self
            .sessions
            .remove_if(&id, |_, s| s.user_id == user_id)
            .is_some();
        if removed {
            info!(conversation_id = %id, "Conversation ended");
        }
        removed
    }

    /// Drop sessions untouched since `now - max_age` that are not mid-turn
    pub fn sweep(&self, now: DateTime<Utc>, max_age: Duration) -> usize {
        let cutoff = now - max_age;
        let mut removed = 0;
        self.sessions.retain(|_, s| {
            let keep = s.status == ConversationStatus::Processing || s.updated_at > cutoff;
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    pub fn active_conversations(&self) -> usize {
        self.sessions.len()
    }

    /// Periodic idle-session sweep
    pub async fn run_sweeper(&self) {
        let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(60));

        loop {
            interval.tick().await;
            let swept = self.sweep(Utc::now(), Duration::minutes(IDLE_TIMEOUT_MINUTES));
            if swept > 0 {
                info!(swept, remaining = self.active_conversations(), "Swept idle conversations");
            }
        }
    }
}

fn snapshot(id: Uuid, state: &ConversationState) -> ConversationSnapshot {
    ConversationSnapshot {
        conversation_id: id,
        avatar_id: state.avatar_id,
        status: state.status,
        last_reply: state.last_reply.clone(),
        last_audio_base64: state.last_audio_base64.clone(),
        last_error: state.last_error.clone(),
        turns: state.turns,
        history_len: state.history.len(),
        created_at: state.created_at,
        updated_at: state.updated_at,
    }
}

/// Conversation errors
#[derive(Debug, thiserror::Error)]
pub enum ConversationError {
    #[error("Conversation not found")]
    NotFound,

    #[error("Conversation is already processing a message")]
    Busy,
}
