//! Authentication middleware and JWT verification

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

use crate::app::AppState;

type HmacSha256 = Hmac<Sha256>;

/// JWT claims from Supabase auth token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user ID)
    pub sub: Uuid,
    #[serde(default)]
    pub aud: Option<String>,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
    #[serde(default)]
    pub iat: u64,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

/// Verify an HS256 Supabase access token and extract its claims
pub fn verify_jwt(token: &str, secret: &str) -> Result<JwtClaims, AuthError> {
    let mut parts = token.split('.');
    let (Some(header_b64), Some(payload_b64), Some(signature_b64), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(AuthError::InvalidToken);
    };

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| AuthError::InvalidToken)?;
    mac.update(header_b64.as_bytes());
    mac.update(b".");
    mac.update(payload_b64.as_bytes());

    let provided_signature = URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| AuthError::InvalidToken)?;

    // Constant-time comparison
    mac.verify_slice(&provided_signature)
        .map_err(|_| AuthError::InvalidToken)?;

    let payload_json = URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| AuthError::InvalidToken)?;

    let claims: JwtClaims =
        serde_json::from_slice(&payload_json).map_err(|_| AuthError::InvalidToken)?;

    let now = chrono::Utc::now().timestamp().max(0) as u64;
    if claims.exp < now {
        return Err(AuthError::TokenExpired);
    }

    Ok(claims)
}

/// Authentication error types
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing authorization header")]
    MissingHeader,

    #[error("Invalid authorization header format")]
    InvalidFormat,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match &self {
            AuthError::InvalidFormat => StatusCode::BAD_REQUEST,
            AuthError::MissingHeader | AuthError::InvalidToken | AuthError::TokenExpired => {
                StatusCode::UNAUTHORIZED
            }
        };

        let body = serde_json::json!({
            "error": self.to_string(),
            "details": null,
        });

        (status, Json(body)).into_response()
    }
}

/// Authenticated user extractor result
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
}

/// Middleware to require authentication
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    if !request.headers().contains_key(header::AUTHORIZATION) {
        return Err(AuthError::MissingHeader);
    }

    let Authorization(bearer) = request
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or(AuthError::InvalidFormat)?;

    let claims = verify_jwt(bearer.token(), &state.config.supabase_jwt_secret)?;

    let auth_user = AuthenticatedUser {
        user_id: claims.sub,
    };

    request.extensions_mut().insert(auth_user);

    Ok(next.run(request).await)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Mint an HS256 token the way Supabase auth does
    pub(crate) fn sign_token(user_id: Uuid, secret: &str, exp: i64) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(
            serde_json::json!({
                "sub": user_id,
                "aud": "authenticated",
                "exp": exp,
                "iat": 0,
                "role": "authenticated",
            })
            .to_string(),
        );

        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{header}.{payload}").as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        format!("{header}.{payload}.{signature}")
    }

    fn in_one_hour() -> i64 {
        chrono::Utc::now().timestamp() + 3600
    }

    #[test]
    fn accepts_valid_token() {
        let user = Uuid::new_v4();
        let token = sign_token(user, "secret", in_one_hour());

        let claims = verify_jwt(&token, "secret").unwrap();
        assert_eq!(claims.sub, user);
        assert_eq!(claims.aud.as_deref(), Some("authenticated"));
    }

    #[test]
    fn rejects_wrong_secret() {
        let token = sign_token(Uuid::new_v4(), "secret", in_one_hour());
        assert!(matches!(
            verify_jwt(&token, "other-secret"),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn rejects_expired_token() {
        let token = sign_token(Uuid::new_v4(), "secret", 1_000);
        assert!(matches!(
            verify_jwt(&token, "secret"),
            Err(AuthError::TokenExpired)
        ));
    }

    #[test]
    fn rejects_malformed_token() {
        assert!(matches!(verify_jwt("abc.def", "secret"), Err(AuthError::InvalidToken)));
        assert!(matches!(
            verify_jwt("a.b.c.d", "secret"),
            Err(AuthError::InvalidToken)
        ));
    }
}
