//! Persona chat endpoints for avatar owners

use axum::{
    extract::{Extension, Path, State},
    response::Json,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::avatars::owned_avatar;
use super::error::AppError;
use super::middleware::AuthenticatedUser;
use crate::app::AppState;
use crate::chat::{ChatReply, ChatTurn};
use crate::llm::ChatMessage;

#[derive(Deserialize)]
pub(super) struct ChatRequest {
    pub(super) message: String,
    #[serde(default)]
    pub(super) history: Vec<ChatMessage>,
    /// Persist the message as a chat memory
    #[serde(default)]
    pub(super) remember: bool,
}

#[derive(Serialize)]
pub(super) struct ChatResponse {
    reply: String,
    memories_used: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    audio_base64: Option<String>,
}

impl From<ChatReply> for ChatResponse {
    fn from(reply: ChatReply) -> Self {
        Self {
            reply: reply.reply,
            memories_used: reply.memories_used,
            audio_base64: reply.audio.map(|audio| STANDARD.encode(audio)),
        }
    }
}

pub(super) fn check_rate_limit(state: &AppState, key: Uuid) -> Result<(), AppError> {
    if state.chat_limiter.check(key) {
        Ok(())
    } else {
        Err(AppError::RateLimited)
    }
}

async fn chat(
    state: AppState,
    auth: AuthenticatedUser,
    avatar_id: Uuid,
    req: ChatRequest,
    with_voice: bool,
) -> Result<Json<ChatResponse>, AppError> {
    check_rate_limit(&state, auth.user_id)?;

    let avatar = owned_avatar(&state, avatar_id, auth.user_id).await?;
    let reply = state
        .chat
        .reply(
            &avatar,
            ChatTurn {
                message: &req.message,
                history: &req.history,
                with_voice,
                remember: req.remember,
            },
        )
        .await?;

    Ok(Json(reply.into()))
}

pub(super) async fn chat_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(avatar_id): Path<Uuid>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    chat(state, auth, avatar_id, req, false).await
}

pub(super) async fn voice_chat_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(avatar_id): Path<Uuid>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    chat(state, auth, avatar_id, req, true).await
}
