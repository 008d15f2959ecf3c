//! Voice cloning, settings and preview endpoints

use axum::{
    extract::{Extension, Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use super::avatars::owned_avatar;
use super::error::AppError;
use super::middleware::AuthenticatedUser;
use crate::app::AppState;
use crate::store::avatars::{Avatar, AvatarUpdate};
use crate::voice::{AudioSample, VoiceInfo, VoiceSettings};

pub const MAX_PREVIEW_CHARS: usize = 500;

fn require_voice(avatar: &Avatar) -> Result<&str, AppError> {
    avatar
        .voice_id
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Conflict("Avatar has no voice configured".to_string()))
}

// ============================================================================
// Cloning
// ============================================================================

#[derive(Serialize)]
pub(super) struct CloneVoiceResponse {
    voice_id: String,
    avatar: Avatar,
}

pub(super) async fn clone_voice_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(avatar_id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<CloneVoiceResponse>, AppError> {
    let avatar = owned_avatar(&state, avatar_id, auth.user_id).await?;

    let mut name = None;
    let mut description = None;
    let mut samples = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some("name") => name = Some(field.text().await?),
            Some("description") => description = Some(field.text().await?),
            Some("files") => {
                let filename = field.file_name().unwrap_or("sample.mp3").to_string();
                let mime = field.content_type().unwrap_or("audio/mpeg").to_string();
                let data = field.bytes().await?;
                if !data.is_empty() {
                    samples.push(AudioSample {
                        filename,
                        mime,
                        data,
                    });
                }
            }
            _ => {}
        }
    }

    let name = name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| avatar.name.clone());
    let description = description.filter(|d| !d.trim().is_empty());

    let voice_id = state
        .elevenlabs
        .clone_voice(&name, description.as_deref(), samples)
        .await?;

    if let Err(e) = state.avatar_store.set_voice(avatar_id, Some(&voice_id)).await {
        if let Err(cleanup) = state.elevenlabs.delete_voice(&voice_id).await {
            warn!(avatar_id = %avatar_id, voice_id = %voice_id, error = %cleanup, "Failed to delete orphaned voice");
        }
        return Err(e.into());
    }

    if let Some(previous) = avatar.voice_id.as_deref().filter(|v| !v.is_empty() && *v != voice_id) {
        if let Err(e) = state.elevenlabs.delete_voice(previous).await {
            warn!(avatar_id = %avatar_id, voice_id = previous, error = %e, "Failed to delete replaced voice");
        }
    }

    info!(user_id = %auth.user_id, avatar_id = %avatar_id, voice_id = %voice_id, "Voice cloned for avatar");

    let avatar = owned_avatar(&state, avatar_id, auth.user_id).await?;
    Ok(Json(CloneVoiceResponse { voice_id, avatar }))
}

pub(super) async fn delete_voice_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(avatar_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let avatar = owned_avatar(&state, avatar_id, auth.user_id).await?;
    let voice_id = require_voice(&avatar)?;

    state.elevenlabs.delete_voice(voice_id).await?;
    state.avatar_store.set_voice(avatar_id, None).await?;

    info!(user_id = %auth.user_id, avatar_id = %avatar_id, "Voice removed from avatar");
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Settings
// ============================================================================

pub(super) async fn get_voice_settings_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(avatar_id): Path<Uuid>,
) -> Result<Json<VoiceSettings>, AppError> {
    let avatar = owned_avatar(&state, avatar_id, auth.user_id).await?;
    let voice_id = require_voice(&avatar)?;

    let settings = state.elevenlabs.get_voice_settings(voice_id).await?;
    Ok(Json(settings))
}

pub(super) async fn update_voice_settings_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(avatar_id): Path<Uuid>,
    Json(settings): Json<VoiceSettings>,
) -> Result<Json<VoiceSettings>, AppError> {
    settings.validate()?;

    let avatar = owned_avatar(&state, avatar_id, auth.user_id).await?;
    let voice_id = require_voice(&avatar)?;

    state.elevenlabs.edit_voice_settings(voice_id, &settings).await?;
    state
        .avatar_store
        .update(
            avatar_id,
            AvatarUpdate {
                voice_settings: Some(settings),
                ..Default::default()
            },
        )
        .await?;

    Ok(Json(settings))
}

// ============================================================================
// Preview and listing
// ============================================================================

#[derive(Deserialize)]
pub(super) struct PreviewRequest {
    text: String,
}

pub(super) async fn preview_voice_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(avatar_id): Path<Uuid>,
    Json(req): Json<PreviewRequest>,
) -> Result<Response, AppError> {
    let text = req.text.trim();
    if text.is_empty() {
        return Err(AppError::BadRequest("Preview text cannot be empty".to_string()));
    }
    if text.chars().count() > MAX_PREVIEW_CHARS {
        return Err(AppError::BadRequest(format!(
            "Preview text exceeds {MAX_PREVIEW_CHARS} characters"
        )));
    }

    let avatar = owned_avatar(&state, avatar_id, auth.user_id).await?;
    let voice_id = require_voice(&avatar)?;

    let audio = state
        .elevenlabs
        .text_to_speech(voice_id, text, avatar.voice_settings)
        .await?;

    Ok(([(header::CONTENT_TYPE, "audio/mpeg")], audio).into_response())
}

#[derive(Serialize)]
pub(super) struct VoiceListResponse {
    voices: Vec<VoiceInfo>,
}

pub(super) async fn list_voices_handler(
    State(state): State<AppState>,
) -> Result<Json<VoiceListResponse>, AppError> {
    let voices = state.elevenlabs.list_voices().await?;
    Ok(Json(VoiceListResponse { voices }))
}
