//! Legacy hub moderation for avatar owners

use axum::{
    extract::{Extension, Path, Query, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use super::avatars::owned_avatar;
use super::error::AppError;
use super::middleware::AuthenticatedUser;
use crate::app::AppState;
use crate::memory::MemoryDraft;
use crate::store::legacy::{LegacyMemory, LegacyStatus};
use crate::store::memories::MemorySource;

#[derive(Deserialize)]
pub(super) struct LegacyListQuery {
    status: Option<LegacyStatus>,
}

#[derive(Serialize)]
pub(super) struct LegacyListResponse {
    entries: Vec<LegacyMemory>,
}

pub(super) async fn list_legacy_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(avatar_id): Path<Uuid>,
    Query(query): Query<LegacyListQuery>,
) -> Result<Json<LegacyListResponse>, AppError> {
    owned_avatar(&state, avatar_id, auth.user_id).await?;
    let entries = state
        .legacy_store
        .list_for_avatar(avatar_id, query.status)
        .await?;
    Ok(Json(LegacyListResponse { entries }))
}

/// Load an entry whose avatar the caller owns
async fn owned_entry(
    state: &AppState,
    entry_id: Uuid,
    user_id: Uuid,
) -> Result<LegacyMemory, AppError> {
    let entry = state
        .legacy_store
        .get(entry_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Legacy memory not found".to_string()))?;
    if state
        .avatar_store
        .get_owned(entry.avatar_id, user_id)
        .await?
        .is_none()
    {
        return Err(AppError::NotFound("Legacy memory not found".to_string()));
    }
    Ok(entry)
}

#[derive(Serialize)]
pub(super) struct ModerationResponse {
    id: Uuid,
    status: LegacyStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    memory_fragment_id: Option<Uuid>,
}

pub(super) async fn approve_legacy_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(entry_id): Path<Uuid>,
) -> Result<Json<ModerationResponse>, AppError> {
    let entry = owned_entry(&state, entry_id, auth.user_id).await?;
    if entry.status == LegacyStatus::Approved {
        return Err(AppError::Conflict(
            "Legacy memory is already approved".to_string(),
        ));
    }

    let draft = MemoryDraft::new(entry.content.clone())
        .with_category(Some("legacy".to_string()))
        .with_importance(0.6)
        .with_metadata(json!({
            "legacy_id": entry.id,
            "contributor_name": entry.contributor_name,
            "relationship": entry.relationship,
        }));

    let fragment = state
        .memory
        .remember(auth.user_id, Some(entry.avatar_id), vec![draft], MemorySource::Legacy)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::Internal("Legacy memory was not stored".to_string()))?;

    state
        .legacy_store
        .set_status(entry.id, LegacyStatus::Approved, Some(fragment.id))
        .await?;

    info!(user_id = %auth.user_id, avatar_id = %entry.avatar_id, legacy_id = %entry.id, "Legacy memory approved");
    Ok(Json(ModerationResponse {
        id: entry.id,
        status: LegacyStatus::Approved,
        memory_fragment_id: Some(fragment.id),
    }))
}

pub(super) async fn reject_legacy_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(entry_id): Path<Uuid>,
) -> Result<Json<ModerationResponse>, AppError> {
    let entry = owned_entry(&state, entry_id, auth.user_id).await?;
    if entry.status == LegacyStatus::Approved {
        return Err(AppError::Conflict(
            "Approved memories cannot be rejected".to_string(),
        ));
    }

    state
        .legacy_store
        .set_status(entry.id, LegacyStatus::Rejected, None)
        .await?;

    info!(user_id = %auth.user_id, legacy_id = %entry.id, "Legacy memory rejected");
    Ok(Json(ModerationResponse {
        id: entry.id,
        status: LegacyStatus::Rejected,
        memory_fragment_id: None,
    }))
}
