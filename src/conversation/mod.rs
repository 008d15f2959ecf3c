//! Conversational AI sessions (REST polling and WebSocket)

pub mod manager;
pub mod protocol;
pub mod socket;

pub use manager::{ConversationError, ConversationManager, ConversationSnapshot, ConversationStatus};

use base64::{engine::general_purpose::STANDARD, Engine};
use tracing::{error, info};
use uuid::Uuid;

use crate::chat::{ChatError, ChatService, ChatTurn};
use crate::store::{AvatarStore, SupabaseError};
use crate::util::rate_limit::UserRateLimiter;

/// Result of a finished turn
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub reply: String,
    pub audio_base64: Option<String>,
    pub memories_used: usize,
}

/// Everything a turn touches, cloned cheaply into spawned tasks
#[derive(Clone)]
pub struct TurnContext {
    pub conversations: std::sync::Arc<ConversationManager>,
    pub avatars: AvatarStore,
    pub chat: ChatService,
    /// Same per-user quota as the REST chat endpoints
    pub chat_limiter: UserRateLimiter,
}

/// Run a turn that [`ConversationManager::begin_turn`] already accepted,
/// leaving the session `idle` on success and `error` on failure.
pub async fn run_accepted_turn(
    ctx: &TurnContext,
    user_id: Uuid,
    turn: manager::AcceptedTurn,
    text: &str,
    voice: bool,
) -> Result<TurnOutcome, TurnError> {
    let conversation_id = turn.conversation_id;
    let result = generate(ctx, user_id, &turn, text, voice).await;

    match &result {
        Ok(outcome) => {
            ctx.conversations.complete_turn(
                conversation_id,
                text,
                &outcome.reply,
                outcome.audio_base64.clone(),
            );
            info!(conversation_id = %conversation_id, memories_used = outcome.memories_used, "Conversation turn complete");
        }
        Err(e) => {
            error!(conversation_id = %conversation_id, error = %e, "Conversation turn failed");
            ctx.conversations.fail_turn(conversation_id, &e.to_string());
        }
    }

    result
}

async fn generate(
    ctx: &TurnContext,
    user_id: Uuid,
    turn: &manager::AcceptedTurn,
    text: &str,
    voice: bool,
) -> Result<TurnOutcome, TurnError> {
    let avatar = ctx
        .avatars
        .get_owned(turn.avatar_id, user_id)
        .await?
        .ok_or(TurnError::AvatarNotFound)?;

    let reply = ctx
        .chat
        .reply(
            &avatar,
            ChatTurn {
                message: text,
                history: &turn.history,
                with_voice: voice,
                remember: false,
            },
        )
        .await?;

    Ok(TurnOutcome {
        reply: reply.reply,
        audio_base64: reply.audio.map(|a| STANDARD.encode(a)),
        memories_used: reply.memories_used,
    })
}

/// Turn execution errors
#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    #[error(transparent)]
    Conversation(#[from] ConversationError),

    #[error("Avatar not found")]
    AvatarNotFound,

    #[error(transparent)]
    Chat(#[from] ChatError),

    #[error("Database error: {0}")]
    Database(#[from] SupabaseError),
}
