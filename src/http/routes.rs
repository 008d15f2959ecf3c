//! HTTP route definitions

use std::time::Duration;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::{header, Method},
    middleware,
    response::Json,
    routing::{delete, get, post},
    Router,
};
use serde::Serialize;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer, trace::TraceLayer,
};

use super::middleware::require_auth;
use super::{avatars, chat, conversations, legacy, memories, onboarding, shares, voice};
use crate::app::AppState;
use crate::conversation::socket::conversation_ws_handler;
use crate::util::time::uptime_secs;

/// Voice samples and recorded answers can be large
const MAX_BODY_BYTES: usize = 25 * 1024 * 1024;
/// Upper bound for LLM + TTS round trips
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // CORS configuration - support multiple origins (comma-separated in CLIENT_ORIGIN)
    let allowed_origins: Vec<header::HeaderValue> = state
        .config
        .client_origin
        .split(',')
        .filter_map(|s| s.trim().parse::<header::HeaderValue>().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true);

    // Public routes (no JWT; share routes carry their own token)
    let public_routes = Router::new()
        .route("/health", get(health_handler))
        .route("/ws/conversations/:id", get(conversation_ws_handler))
        .route("/shared/:token", get(shares::shared_avatar_handler))
        .route("/shared/:token/chat", post(shares::shared_chat_handler))
        .route("/shared/:token/legacy", post(shares::contribute_legacy_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/onboarding/questions", get(onboarding::questions_handler))
        .route("/onboarding/answers", post(onboarding::answer_handler))
        .route("/onboarding/answers/voice", post(onboarding::voice_answer_handler))
        .route(
            "/avatars",
            get(avatars::list_avatars_handler).post(avatars::create_avatar_handler),
        )
        .route(
            "/avatars/:id",
            get(avatars::get_avatar_handler)
                .patch(avatars::update_avatar_handler)
                .delete(avatars::delete_avatar_handler),
        )
        .route("/avatars/:id/voice", delete(voice::delete_voice_handler))
        .route("/avatars/:id/voice/clone", post(voice::clone_voice_handler))
        .route(
            "/avatars/:id/voice/settings",
            get(voice::get_voice_settings_handler).put(voice::update_voice_settings_handler),
        )
        .route("/avatars/:id/voice/preview", post(voice::preview_voice_handler))
        .route("/voices", get(voice::list_voices_handler))
        .route(
            "/memories",
            get(memories::list_memories_handler).post(memories::create_memory_handler),
        )
        .route("/memories/search", post(memories::search_memories_handler))
        .route("/memories/:id", delete(memories::delete_memory_handler))
        .route("/avatars/:id/chat", post(chat::chat_handler))
        .route("/avatars/:id/chat/voice", post(chat::voice_chat_handler))
        .route(
            "/avatars/:id/shares",
            get(shares::list_shares_handler).post(shares::create_share_handler),
        )
        .route("/shares/:id", delete(shares::revoke_share_handler))
        .route("/avatars/:id/legacy", get(legacy::list_legacy_handler))
        .route("/legacy/:id/approve", post(legacy::approve_legacy_handler))
        .route("/legacy/:id/reject", post(legacy::reject_legacy_handler))
        .route("/conversations", post(conversations::start_conversation_handler))
        .route(
            "/conversations/:id",
            get(conversations::get_conversation_handler)
                .delete(conversations::end_conversation_handler),
        )
        .route(
            "/conversations/:id/messages",
            post(conversations::send_message_handler),
        )
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    active_conversations: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        active_conversations: state.conversations.active_conversations(),
    })
}
