//! Share link tokens and validation

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;

use crate::store::shares::{AvatarShare, ShareStatus};
use crate::store::{ShareStore, SupabaseError};

/// Random bytes per token (hex-encoded to twice as many chars)
pub const TOKEN_BYTES: usize = 32;
pub const MAX_EXPIRY_DAYS: i64 = 365;

/// Generate an opaque, URL-safe share token
pub fn generate_share_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Cheap shape check before touching the database
pub fn is_well_formed_token(token: &str) -> bool {
    token.len() == TOKEN_BYTES * 2 && token.bytes().all(|b| b.is_ascii_hexdigit())
}

pub fn share_url(public_base_url: &str, token: &str) -> String {
    format!("{}/shared/{}", public_base_url.trim_end_matches('/'), token)
}

/// Turn an optional `expires_in_days` into an absolute expiry
pub fn expiry_from_days(
    days: Option<i64>,
    now: DateTime<Utc>,
) -> Result<Option<DateTime<Utc>>, ShareError> {
    match days {
        None => Ok(None),
        Some(d) if (1..=MAX_EXPIRY_DAYS).contains(&d) => Ok(Some(now + Duration::days(d))),
        Some(_) => Err(ShareError::InvalidExpiry),
    }
}

/// A share is usable while active and unexpired
pub fn validate_share(share: &AvatarShare, now: DateTime<Utc>) -> Result<(), ShareError> {
    if share.status == ShareStatus::Revoked {
        return Err(ShareError::Revoked);
    }
    if share.expires_at.is_some_and(|expires| expires <= now) {
        return Err(ShareError::Expired);
    }
    Ok(())
}

/// Look up and validate a token in one step
pub async fn resolve_token(store: &ShareStore, token: &str) -> Result<AvatarShare, ShareError> {
    if !is_well_formed_token(token) {
        return Err(ShareError::NotFound);
    }
    let share = store
        .get_by_token(token)
        .await?
        .ok_or(ShareError::NotFound)?;
    validate_share(&share, Utc::now())?;
    Ok(share)
}

/// Share errors
#[derive(Debug, thiserror::Error)]
pub enum ShareError {
    #[error("Share link not found")]
    NotFound,

    #[error("Share link has been revoked")]
    Revoked,

    #[error("Share link has expired")]
    Expired,

    #[error("expires_in_days must be between 1 and {MAX_EXPIRY_DAYS}")]
    InvalidExpiry,

    #[error("Database error: {0}")]
    Database(#[from] SupabaseError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::shares::SharePermission;
    use uuid::Uuid;

    fn share(status: ShareStatus, expires_at: Option<DateTime<Utc>>) -> AvatarShare {
        AvatarShare {
            id: Uuid::new_v4(),
            avatar_id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            share_token: generate_share_token(),
            shared_with_email: None,
            permissions: SharePermission::Chat,
            status,
            expires_at,
            last_used_at: None,
            created_at: None,
        }
    }

    #[test]
    fn tokens_are_64_hex_chars_and_unique() {
        let a = generate_share_token();
        let b = generate_share_token();
        assert!(is_well_formed_token(&a));
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        assert!(!is_well_formed_token("abc"));
        assert!(!is_well_formed_token(&"z".repeat(64)));
    }

    #[test]
    fn share_url_joins_without_double_slash() {
        assert_eq!(
            share_url("https://echostone.app/", "abc"),
            "https://echostone.app/shared/abc"
        );
    }

    #[test]
    fn expiry_bounds() {
        let now = Utc::now();
        assert_eq!(expiry_from_days(None, now).unwrap(), None);
        assert_eq!(
            expiry_from_days(Some(7), now).unwrap(),
            Some(now + Duration::days(7))
        );
        assert!(matches!(
            expiry_from_days(Some(0), now),
            Err(ShareError::InvalidExpiry)
        ));
        assert!(matches!(
            expiry_from_days(Some(366), now),
            Err(ShareError::InvalidExpiry)
        ));
    }

    #[test]
    fn validation_checks_status_then_expiry() {
        let now = Utc::now();
        assert!(validate_share(&share(ShareStatus::Active, None), now).is_ok());
        assert!(validate_share(
            &share(ShareStatus::Active, Some(now + Duration::hours(1))),
            now
        )
        .is_ok());
        assert!(matches!(
            validate_share(&share(ShareStatus::Active, Some(now)), now),
            Err(ShareError::Expired)
        ));
        assert!(matches!(
            validate_share(&share(ShareStatus::Revoked, None), now),
            Err(ShareError::Revoked)
        ));
    }
}
