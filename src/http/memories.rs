//! Memory fragment endpoints

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use super::avatars::owned_avatar;
use super::error::AppError;
use super::middleware::AuthenticatedUser;
use crate::app::AppState;
use crate::memory::MemoryDraft;
use crate::store::memories::{MatchedFragment, MemoryFragment, MemorySource};

const DEFAULT_LIST_LIMIT: usize = 50;
const MAX_LIST_LIMIT: usize = 200;
const MAX_MEMORY_CHARS: usize = 2000;

#[derive(Deserialize)]
pub(super) struct ListMemoriesQuery {
    avatar_id: Option<Uuid>,
    limit: Option<usize>,
}

#[derive(Serialize)]
pub(super) struct MemoryListResponse {
    memories: Vec<MemoryFragment>,
}

pub(super) async fn list_memories_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Query(query): Query<ListMemoriesQuery>,
) -> Result<Json<MemoryListResponse>, AppError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);

    let memories = state
        .memory
        .store()
        .list(auth.user_id, query.avatar_id, limit)
        .await?;

    Ok(Json(MemoryListResponse { memories }))
}

#[derive(Deserialize)]
pub(super) struct CreateMemoryRequest {
    text: String,
    avatar_id: Option<Uuid>,
    category: Option<String>,
}

pub(super) async fn create_memory_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Json(req): Json<CreateMemoryRequest>,
) -> Result<(StatusCode, Json<MemoryFragment>), AppError> {
    let text = req.text.trim();
    if text.is_empty() {
        return Err(AppError::BadRequest("Memory text cannot be empty".to_string()));
    }
    if text.chars().count() > MAX_MEMORY_CHARS {
        return Err(AppError::BadRequest(format!(
            "Memory text exceeds {MAX_MEMORY_CHARS} characters"
        )));
    }
    if let Some(avatar_id) = req.avatar_id {
        owned_avatar(&state, avatar_id, auth.user_id).await?;
    }

    let draft = MemoryDraft::new(text)
        .with_category(req.category.map(|c| c.trim().to_lowercase()).filter(|c| !c.is_empty()))
        .with_importance(0.7)
        .with_metadata(json!({}));

    let fragment = state
        .memory
        .remember(auth.user_id, req.avatar_id, vec![draft], MemorySource::Manual)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::Internal("Memory was not stored".to_string()))?;

    Ok((StatusCode::CREATED, Json(fragment)))
}

#[derive(Deserialize)]
pub(super) struct SearchMemoriesRequest {
    query: String,
    avatar_id: Option<Uuid>,
}

#[derive(Serialize)]
pub(super) struct SearchMemoriesResponse {
    results: Vec<MatchedFragment>,
}

pub(super) async fn search_memories_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Json(req): Json<SearchMemoriesRequest>,
) -> Result<Json<SearchMemoriesResponse>, AppError> {
    if req.query.trim().is_empty() {
        return Err(AppError::BadRequest("Search query cannot be empty".to_string()));
    }

    let results = state
        .memory
        .recall(auth.user_id, req.avatar_id, &req.query)
        .await?;

    Ok(Json(SearchMemoriesResponse { results }))
}

pub(super) async fn delete_memory_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(fragment_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if !state.memory.store().delete(fragment_id, auth.user_id).await? {
        return Err(AppError::NotFound("Memory not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}
