//! Onboarding interview endpoints

use axum::{
    extract::{Extension, Multipart, Query, State},
    response::Json,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::avatars::owned_avatar;
use super::error::AppError;
use super::middleware::AuthenticatedUser;
use crate::app::AppState;
use crate::memory::AnswerInput;
use crate::onboarding::{self, find_question, OnboardingProgress, Question, QUESTIONS};
use crate::store::memories::MemorySource;
use crate::util::json::empty_object;

const MAX_ANSWER_CHARS: usize = 4000;

#[derive(Deserialize)]
pub(super) struct QuestionsQuery {
    avatar_id: Option<Uuid>,
}

#[derive(Serialize)]
pub(super) struct QuestionsResponse {
    questions: &'static [Question],
    progress: OnboardingProgress,
}

pub(super) async fn questions_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Query(query): Query<QuestionsQuery>,
) -> Result<Json<QuestionsResponse>, AppError> {
    let profile_data = match query.avatar_id {
        Some(avatar_id) => owned_avatar(&state, avatar_id, auth.user_id).await?.profile_data,
        None => state
            .profile_store
            .get_profile(auth.user_id)
            .await?
            .map(|p| p.profile_data)
            .unwrap_or_else(empty_object),
    };

    Ok(Json(QuestionsResponse {
        questions: QUESTIONS,
        progress: onboarding::progress(&profile_data),
    }))
}

#[derive(Deserialize)]
pub(super) struct AnswerRequest {
    question_id: String,
    answer: String,
    avatar_id: Option<Uuid>,
}

#[derive(Serialize)]
pub(super) struct AnswerResponse {
    question_id: String,
    fragments_stored: usize,
    progress: OnboardingProgress,
    #[serde(skip_serializing_if = "Option::is_none")]
    transcript: Option<String>,
}

async fn record_answer(
    state: &AppState,
    user_id: Uuid,
    question: &'static Question,
    avatar_id: Option<Uuid>,
    answer: &str,
    source: MemorySource,
) -> Result<AnswerResponse, AppError> {
    let answer = answer.trim();
    if answer.is_empty() {
        return Err(AppError::BadRequest("Answer cannot be empty".to_string()));
    }
    if answer.chars().count() > MAX_ANSWER_CHARS {
        return Err(AppError::BadRequest(format!(
            "Answer exceeds {MAX_ANSWER_CHARS} characters"
        )));
    }

    let avatar = match avatar_id {
        Some(id) => Some(owned_avatar(state, id, user_id).await?),
        None => None,
    };

    let outcome = state
        .memory
        .ingest_answer(
            user_id,
            avatar.as_ref(),
            AnswerInput {
                question_id: question.id,
                question: question.prompt,
                category: question.category.as_str(),
                answer,
                source,
            },
        )
        .await?;

    let progress = onboarding::progress(&outcome.profile_data);
    if progress.complete {
        // Facts landed on the avatar; the profile row may not exist yet
        if avatar.is_some() {
            state.profile_store.ensure_profile(user_id).await?;
        }
        state.profile_store.mark_onboarding_complete(user_id).await?;
        info!(user_id = %user_id, "Onboarding complete");
    }

    info!(
        user_id = %user_id,
        avatar_id = ?avatar_id,
        question_id = question.id,
        fragments = outcome.fragments.len(),
        "Onboarding answer recorded"
    );

    Ok(AnswerResponse {
        question_id: question.id.to_string(),
        fragments_stored: outcome.fragments.len(),
        progress,
        transcript: None,
    })
}

fn lookup_question(id: &str) -> Result<&'static Question, AppError> {
    find_question(id.trim())
        .ok_or_else(|| AppError::BadRequest(format!("Unknown question id: {id}")))
}

pub(super) async fn answer_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Json(req): Json<AnswerRequest>,
) -> Result<Json<AnswerResponse>, AppError> {
    let question = lookup_question(&req.question_id)?;
    let response = record_answer(
        &state,
        auth.user_id,
        question,
        req.avatar_id,
        &req.answer,
        MemorySource::Onboarding,
    )
    .await?;
    Ok(Json(response))
}

pub(super) async fn voice_answer_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    mut multipart: Multipart,
) -> Result<Json<AnswerResponse>, AppError> {
    let mut question_id = None;
    let mut avatar_id = None;
    let mut audio: Option<(String, String, Bytes)> = None;

    while let Some(field) = multipart.next_field().await? {
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some("question_id") => question_id = Some(field.text().await?),
            Some("avatar_id") => {
                let raw = field.text().await?;
                if !raw.trim().is_empty() {
                    let id = raw
                        .trim()
                        .parse::<Uuid>()
                        .map_err(|_| AppError::BadRequest("Invalid avatar_id".to_string()))?;
                    avatar_id = Some(id);
                }
            }
            Some("audio") => {
                let filename = field.file_name().unwrap_or("answer.webm").to_string();
                let mime = field.content_type().unwrap_or("audio/webm").to_string();
                audio = Some((filename, mime, field.bytes().await?));
            }
            _ => {}
        }
    }

    let question_id =
        question_id.ok_or_else(|| AppError::BadRequest("Missing question_id".to_string()))?;
    let question = lookup_question(&question_id)?;
    let (filename, mime, data) = audio
        .filter(|(_, _, data)| !data.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing audio".to_string()))?;

    let transcript = state.openai.transcribe(data, &filename, &mime).await?;
    if transcript.is_empty() {
        return Err(AppError::BadRequest(
            "Could not hear anything in the recording".to_string(),
        ));
    }

    let mut response = record_answer(
        &state,
        auth.user_id,
        question,
        avatar_id,
        &transcript,
        MemorySource::Voice,
    )
    .await?;
    response.transcript = Some(transcript);
    Ok(Json(response))
}
