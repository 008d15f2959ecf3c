//! HTTP error responses

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use tracing::error;

use crate::chat::ChatError;
use crate::conversation::{ConversationError, TurnError};
use crate::llm::OpenAiError;
use crate::memory::MemoryError;
use crate::sharing::ShareError;
use crate::store::SupabaseError;
use crate::voice::ElevenLabsError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Too many requests")]
    RateLimited,

    /// An external service (Supabase, OpenAI, ElevenLabs) failed
    #[error("{service} request failed")]
    Upstream {
        service: &'static str,
        details: String,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (message, details) = match self {
            AppError::BadRequest(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg) => (msg, None),
            AppError::Unauthorized => ("Unauthorized".to_string(), None),
            AppError::RateLimited => ("Too many requests, try again shortly".to_string(), None),
            AppError::Upstream { service, details } => {
                error!(service, %details, "Upstream request failed");
                (format!("{service} request failed"), Some(details))
            }
            AppError::Internal(msg) => {
                error!(error = %msg, "Internal error");
                ("Internal server error".to_string(), Some(msg))
            }
        };

        let body = serde_json::json!({
            "error": message,
            "details": details,
        });

        (status, Json(body)).into_response()
    }
}

impl From<SupabaseError> for AppError {
    fn from(e: SupabaseError) -> Self {
        AppError::Upstream {
            service: "Database",
            details: e.to_string(),
        }
    }
}

impl From<OpenAiError> for AppError {
    fn from(e: OpenAiError) -> Self {
        AppError::Upstream {
            service: "Language model",
            details: e.to_string(),
        }
    }
}

impl From<ElevenLabsError> for AppError {
    fn from(e: ElevenLabsError) -> Self {
        match e {
            ElevenLabsError::NoSamples | ElevenLabsError::InvalidSetting(_) => {
                AppError::BadRequest(e.to_string())
            }
            other => AppError::Upstream {
                service: "Voice",
                details: other.to_string(),
            },
        }
    }
}

impl From<MemoryError> for AppError {
    fn from(e: MemoryError) -> Self {
        match e {
            MemoryError::Database(e) => e.into(),
            MemoryError::Llm(e) => e.into(),
            MemoryError::InvalidExtraction(reason) => AppError::Upstream {
                service: "Language model",
                details: reason,
            },
        }
    }
}

impl From<ChatError> for AppError {
    fn from(e: ChatError) -> Self {
        match e {
            ChatError::EmptyMessage | ChatError::MessageTooLong => {
                AppError::BadRequest(e.to_string())
            }
            ChatError::NoVoice => AppError::Conflict(e.to_string()),
            ChatError::Memory(e) => e.into(),
            ChatError::Llm(e) => e.into(),
            ChatError::Voice(e) => e.into(),
        }
    }
}

impl From<ShareError> for AppError {
    fn from(e: ShareError) -> Self {
        match e {
            ShareError::NotFound => AppError::NotFound(e.to_string()),
            ShareError::Revoked | ShareError::Expired => AppError::Forbidden(e.to_string()),
            ShareError::InvalidExpiry => AppError::BadRequest(e.to_string()),
            ShareError::Database(e) => e.into(),
        }
    }
}

impl From<ConversationError> for AppError {
    fn from(e: ConversationError) -> Self {
        match e {
            ConversationError::NotFound => AppError::NotFound(e.to_string()),
            ConversationError::Busy => AppError::Conflict(e.to_string()),
        }
    }
}

impl From<TurnError> for AppError {
    fn from(e: TurnError) -> Self {
        match e {
            TurnError::Conversation(e) => e.into(),
            TurnError::AvatarNotFound => AppError::NotFound(e.to_string()),
            TurnError::Chat(e) => e.into(),
            TurnError::Database(e) => e.into(),
        }
    }
}

impl From<MultipartError> for AppError {
    fn from(e: MultipartError) -> Self {
        AppError::BadRequest(format!("Invalid multipart body: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn upstream_errors_are_bad_gateway_with_details() {
        let err: AppError = SupabaseError::Api {
            status: 500,
            body: "boom".to_string(),
        }
        .into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let body = body_json(response).await;
        assert_eq!(body["error"], "Database request failed");
        assert!(body["details"].as_str().unwrap().contains("boom"));
    }

    #[tokio::test]
    async fn client_errors_have_null_details() {
        let response = AppError::NotFound("Avatar not found".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body, serde_json::json!({"error": "Avatar not found", "details": null}));
    }

    #[test]
    fn domain_errors_map_to_statuses() {
        assert_eq!(AppError::from(ChatError::NoVoice).status(), StatusCode::CONFLICT);
        assert_eq!(AppError::from(ChatError::EmptyMessage).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::from(ShareError::Expired).status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::from(ShareError::Revoked).status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::from(ShareError::NotFound).status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::from(ConversationError::Busy).status(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::from(ElevenLabsError::InvalidSetting("stability")).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::RateLimited.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
