//! Avatar CRUD endpoints (owner-only)

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use super::error::AppError;
use super::middleware::AuthenticatedUser;
use crate::app::AppState;
use crate::store::avatars::{Avatar, AvatarUpdate, NewAvatar};
use crate::util::json::empty_object;

pub const MAX_NAME_CHARS: usize = 100;

/// Fetch an avatar the caller owns; anything else is a 404
pub(super) async fn owned_avatar(
    state: &AppState,
    avatar_id: Uuid,
    user_id: Uuid,
) -> Result<Avatar, AppError> {
    state
        .avatar_store
        .get_owned(avatar_id, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Avatar not found".to_string()))
}

fn validate_name(name: &str) -> Result<String, AppError> {
    let name = name.trim();
    let len = name.chars().count();
    if len == 0 || len > MAX_NAME_CHARS {
        return Err(AppError::BadRequest(format!(
            "Avatar name must be 1-{MAX_NAME_CHARS} characters"
        )));
    }
    Ok(name.to_string())
}

#[derive(Serialize)]
pub(super) struct AvatarListResponse {
    avatars: Vec<Avatar>,
}

pub(super) async fn list_avatars_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
) -> Result<Json<AvatarListResponse>, AppError> {
    let avatars = state.avatar_store.list_for_user(auth.user_id).await?;
    Ok(Json(AvatarListResponse { avatars }))
}

#[derive(Deserialize)]
pub(super) struct CreateAvatarRequest {
    name: String,
    description: Option<String>,
    personality: Option<String>,
    #[serde(default)]
    profile_data: Option<Value>,
}

pub(super) async fn create_avatar_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Json(req): Json<CreateAvatarRequest>,
) -> Result<(StatusCode, Json<Avatar>), AppError> {
    let name = validate_name(&req.name)?;

    let profile_data = match req.profile_data {
        Some(data @ Value::Object(_)) => data,
        Some(Value::Null) | None => empty_object(),
        Some(_) => {
            return Err(AppError::BadRequest(
                "profile_data must be an object".to_string(),
            ))
        }
    };

    let avatar = state
        .avatar_store
        .create(&NewAvatar {
            user_id: auth.user_id,
            name,
            description: req.description,
            personality: req.personality,
            profile_data,
        })
        .await?;

    info!(user_id = %auth.user_id, avatar_id = %avatar.id, "Avatar created");
    Ok((StatusCode::CREATED, Json(avatar)))
}

pub(super) async fn get_avatar_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(avatar_id): Path<Uuid>,
) -> Result<Json<Avatar>, AppError> {
    Ok(Json(owned_avatar(&state, avatar_id, auth.user_id).await?))
}

pub(super) async fn update_avatar_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(avatar_id): Path<Uuid>,
    Json(mut update): Json<AvatarUpdate>,
) -> Result<Json<Avatar>, AppError> {
    owned_avatar(&state, avatar_id, auth.user_id).await?;

    if let Some(name) = update.name.as_deref() {
        update.name = Some(validate_name(name)?);
    }

    let avatar = state
        .avatar_store
        .update(avatar_id, update)
        .await?
        .ok_or_else(|| AppError::NotFound("Avatar not found".to_string()))?;

    Ok(Json(avatar))
}

pub(super) async fn delete_avatar_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(avatar_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let avatar = owned_avatar(&state, avatar_id, auth.user_id).await?;

    if let Some(voice_id) = avatar.voice_id.as_deref().filter(|v| !v.is_empty()) {
        if let Err(e) = state.elevenlabs.delete_voice(voice_id).await {
            warn!(avatar_id = %avatar_id, voice_id, error = %e, "Failed to delete cloned voice");
        }
    }

    state.avatar_store.delete(avatar_id).await?;

    info!(user_id = %auth.user_id, avatar_id = %avatar_id, "Avatar deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_trimmed_and_bounded() {
        assert_eq!(validate_name("  Grandma Rose ").unwrap(), "Grandma Rose");
        assert!(validate_name("   ").is_err());
        assert!(validate_name(&"x".repeat(MAX_NAME_CHARS)).is_ok());
        assert!(validate_name(&"x".repeat(MAX_NAME_CHARS + 1)).is_err());
    }
}
