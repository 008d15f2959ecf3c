//! Share link management and the public, token-authenticated routes

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use super::avatars::owned_avatar;
use super::chat::{check_rate_limit, ChatResponse};
use super::error::AppError;
use super::middleware::AuthenticatedUser;
use crate::app::AppState;
use crate::chat::ChatTurn;
use crate::llm::ChatMessage;
use crate::sharing::{expiry_from_days, generate_share_token, resolve_token, share_url};
use crate::store::avatars::Avatar;
use crate::store::legacy::{LegacyMemory, LegacyStatus, NewLegacyMemory};
use crate::store::shares::{AvatarShare, NewAvatarShare, SharePermission, ShareStatus};

const MAX_CONTRIBUTOR_CHARS: usize = 100;
const MAX_LEGACY_CHARS: usize = 5000;

// ============================================================================
// Owner endpoints
// ============================================================================

#[derive(Deserialize)]
pub(super) struct CreateShareRequest {
    email: Option<String>,
    #[serde(default)]
    permissions: SharePermission,
    expires_in_days: Option<i64>,
}

#[derive(Serialize)]
pub(super) struct ShareResponse {
    share: AvatarShare,
    url: String,
}

pub(super) async fn create_share_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(avatar_id): Path<Uuid>,
    Json(req): Json<CreateShareRequest>,
) -> Result<(StatusCode, Json<ShareResponse>), AppError> {
    let expires_at = expiry_from_days(req.expires_in_days, Utc::now())?;
    owned_avatar(&state, avatar_id, auth.user_id).await?;

    let email = req
        .email
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty());
    if email.as_deref().is_some_and(|e| !e.contains('@')) {
        return Err(AppError::BadRequest("Invalid email address".to_string()));
    }

    let share = state
        .share_store
        .create(&NewAvatarShare {
            avatar_id,
            owner_id: auth.user_id,
            share_token: generate_share_token(),
            shared_with_email: email,
            permissions: req.permissions,
            status: ShareStatus::Active,
            expires_at,
        })
        .await?;

    info!(user_id = %auth.user_id, avatar_id = %avatar_id, share_id = %share.id, "Share link created");

    let url = share_url(&state.config.public_base_url, &share.share_token);
    Ok((StatusCode::CREATED, Json(ShareResponse { share, url })))
}

#[derive(Serialize)]
pub(super) struct ShareListResponse {
    shares: Vec<ShareResponse>,
}

pub(super) async fn list_shares_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(avatar_id): Path<Uuid>,
) -> Result<Json<ShareListResponse>, AppError> {
    owned_avatar(&state, avatar_id, auth.user_id).await?;

    let shares = state
        .share_store
        .list_for_avatar(avatar_id)
        .await?
        .into_iter()
        .map(|share| ShareResponse {
            url: share_url(&state.config.public_base_url, &share.share_token),
            share,
        })
        .collect();

    Ok(Json(ShareListResponse { shares }))
}

pub(super) async fn revoke_share_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(share_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if !state.share_store.revoke(share_id, auth.user_id).await? {
        return Err(AppError::NotFound("Share not found".to_string()));
    }
    info!(user_id = %auth.user_id, share_id = %share_id, "Share link revoked");
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Public endpoints (share token only)
// ============================================================================

async fn shared_avatar(state: &AppState, token: &str) -> Result<(AvatarShare, Avatar), AppError> {
    let share = resolve_token(&state.share_store, token).await?;
    let avatar = state
        .avatar_store
        .get(share.avatar_id)
        .await?
        .filter(|a| a.is_active)
        .ok_or_else(|| AppError::NotFound("Avatar not found".to_string()))?;
    Ok((share, avatar))
}

#[derive(Serialize)]
pub(super) struct PublicAvatarView {
    avatar_id: Uuid,
    name: String,
    description: Option<String>,
    has_voice: bool,
    permissions: SharePermission,
}

pub(super) async fn shared_avatar_handler(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<PublicAvatarView>, AppError> {
    let (share, avatar) = shared_avatar(&state, &token).await?;

    Ok(Json(PublicAvatarView {
        avatar_id: avatar.id,
        has_voice: avatar.has_voice(),
        name: avatar.name,
        description: avatar.description,
        permissions: share.permissions,
    }))
}

#[derive(Deserialize)]
pub(super) struct SharedChatRequest {
    message: String,
    #[serde(default)]
    history: Vec<ChatMessage>,
    #[serde(default)]
    voice: bool,
}

pub(super) async fn shared_chat_handler(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(req): Json<SharedChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let (share, avatar) = shared_avatar(&state, &token).await?;
    check_rate_limit(&state, share.id)?;

    if req.voice && !share.permissions.allows_voice() {
        return Err(AppError::Forbidden(
            "This share link does not allow voice replies".to_string(),
        ));
    }

    let reply = state
        .chat
        .reply(
            &avatar,
            ChatTurn {
                message: &req.message,
                history: &req.history,
                with_voice: req.voice,
                remember: false,
            },
        )
        .await?;

    if let Err(e) = state.share_store.touch(share.id).await {
        warn!(share_id = %share.id, error = %e, "Failed to record share usage");
    }

    info!(share_id = %share.id, avatar_id = %avatar.id, "Shared chat reply");
    Ok(Json(reply.into()))
}

#[derive(Deserialize)]
pub(super) struct LegacyContributionRequest {
    contributor_name: String,
    relationship: Option<String>,
    content: String,
}

pub(super) async fn contribute_legacy_handler(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(req): Json<LegacyContributionRequest>,
) -> Result<(StatusCode, Json<LegacyMemory>), AppError> {
    let contributor_name = req.contributor_name.trim();
    let name_len = contributor_name.chars().count();
    if name_len == 0 || name_len > MAX_CONTRIBUTOR_CHARS {
        return Err(AppError::BadRequest(format!(
            "Contributor name must be 1-{MAX_CONTRIBUTOR_CHARS} characters"
        )));
    }
    let content = req.content.trim();
    let content_len = content.chars().count();
    if content_len == 0 || content_len > MAX_LEGACY_CHARS {
        return Err(AppError::BadRequest(format!(
            "Memory must be 1-{MAX_LEGACY_CHARS} characters"
        )));
    }

    let (share, avatar) = shared_avatar(&state, &token).await?;

    let entry = state
        .legacy_store
        .create(&NewLegacyMemory {
            avatar_id: avatar.id,
            share_id: Some(share.id),
            contributor_name: contributor_name.to_string(),
            relationship: req
                .relationship
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty()),
            content: content.to_string(),
            status: LegacyStatus::Pending,
        })
        .await?;

    if let Err(e) = state.share_store.touch(share.id).await {
        warn!(share_id = %share.id, error = %e, "Failed to record share usage");
    }

    info!(share_id = %share.id, avatar_id = %avatar.id, legacy_id = %entry.id, "Legacy memory contributed");
    Ok((StatusCode::CREATED, Json(entry)))
}
