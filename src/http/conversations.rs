//! Conversation sessions over REST polling

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::avatars::owned_avatar;
use super::chat::check_rate_limit;
use super::error::AppError;
use super::middleware::AuthenticatedUser;
use crate::app::AppState;
use crate::chat::MAX_MESSAGE_CHARS;
use crate::conversation::{run_accepted_turn, ConversationSnapshot, ConversationStatus};

#[derive(Deserialize)]
pub(super) struct StartConversationRequest {
    avatar_id: Uuid,
}

#[derive(Serialize)]
pub(super) struct StartConversationResponse {
    #[serde(flatten)]
    conversation: ConversationSnapshot,
    ws_url: String,
}

pub(super) async fn start_conversation_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Json(req): Json<StartConversationRequest>,
) -> Result<(StatusCode, Json<StartConversationResponse>), AppError> {
    owned_avatar(&state, req.avatar_id, auth.user_id).await?;

    let conversation = state.conversations.start(auth.user_id, req.avatar_id);
    let ws_url = format!(
        "{}/ws/conversations/{}",
        state
            .config
            .public_base_url
            .replacen("https://", "wss://", 1)
            .replacen("http://", "ws://", 1),
        conversation.conversation_id
    );

    Ok((
        StatusCode::CREATED,
        Json(StartConversationResponse {
            conversation,
            ws_url,
        }),
    ))
}

pub(super) async fn get_conversation_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(conversation_id): Path<Uuid>,
) -> Result<Json<ConversationSnapshot>, AppError> {
    state
        .conversations
        .get(conversation_id, auth.user_id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Conversation not found".to_string()))
}

#[derive(Deserialize)]
pub(super) struct SendMessageRequest {
    text: String,
    #[serde(default)]
    voice: bool,
}

#[derive(Serialize)]
pub(super) struct SendMessageResponse {
    conversation_id: Uuid,
    status: ConversationStatus,
}

pub(super) async fn send_message_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(conversation_id): Path<Uuid>,
    Json(req): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<SendMessageResponse>), AppError> {
    let text = req.text.trim().to_string();
    if text.is_empty() {
        return Err(AppError::BadRequest("Message cannot be empty".to_string()));
    }
    if text.chars().count() > MAX_MESSAGE_CHARS {
        return Err(AppError::BadRequest(format!(
            "Message exceeds {MAX_MESSAGE_CHARS} characters"
        )));
    }
    check_rate_limit(&state, auth.user_id)?;

    let turn = state.conversations.begin_turn(conversation_id, auth.user_id)?;

    // Reply lands in the session; clients poll GET /conversations/:id
    let ctx = state.turn_context();
    let user_id = auth.user_id;
    tokio::spawn(async move {
        let _ = run_accepted_turn(&ctx, user_id, turn, &text, req.voice).await;
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(SendMessageResponse {
            conversation_id,
            status: ConversationStatus::Processing,
        }),
    ))
}

pub(super) async fn end_conversation_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(conversation_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if !state.conversations.end(conversation_id, auth.user_id) {
        return Err(AppError::NotFound("Conversation not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}
