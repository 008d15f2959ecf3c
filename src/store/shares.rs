//! Tokenized avatar share links (`avatar_shares` table)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::supabase::{SupabaseClient, SupabaseError};

/// What a share link lets the holder do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SharePermission {
    #[default]
    Chat,
    ChatVoice,
}

impl SharePermission {
    pub fn allows_voice(self) -> bool {
        matches!(self, SharePermission::ChatVoice)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShareStatus {
    Active,
    Revoked,
}

/// Share record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvatarShare {
    pub id: Uuid,
    pub avatar_id: Uuid,
    pub owner_id: Uuid,
    pub share_token: String,
    pub shared_with_email: Option<String>,
    #[serde(default)]
    pub permissions: SharePermission,
    pub status: ShareStatus,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
}

/// New share for insertion
#[derive(Debug, Clone, Serialize)]
pub struct NewAvatarShare {
    pub avatar_id: Uuid,
    pub owner_id: Uuid,
    pub share_token: String,
    pub shared_with_email: Option<String>,
    pub permissions: SharePermission,
    pub status: ShareStatus,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Share store operations
#[derive(Clone)]
pub struct ShareStore {
    client: SupabaseClient,
}

impl ShareStore {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    pub async fn create(&self, share: &NewAvatarShare) -> Result<AvatarShare, SupabaseError> {
        self.client.insert("avatar_shares", share).await
    }

    pub async fn list_for_avatar(
        &self,
        avatar_id: Uuid,
    ) -> Result<Vec<AvatarShare>, SupabaseError> {
        let query = format!("avatar_id=eq.{}&order=created_at.desc", avatar_id);
        self.client.get("avatar_shares", &query).await
    }

    pub async fn get_by_token(&self, token: &str) -> Result<Option<AvatarShare>, SupabaseError> {
        let query = format!("share_token=eq.{}", token);
        self.client.get_one("avatar_shares", &query).await
    }

    /// Revoke a share owned by `owner_id`; false when nothing matched
    pub async fn revoke(&self, share_id: Uuid, owner_id: Uuid) -> Result<bool, SupabaseError> {
        #[derive(Serialize)]
        struct StatusUpdate {
            status: ShareStatus,
        }

        let rows: Vec<AvatarShare> = self
            .client
            .update_returning(
                "avatar_shares",
                &format!("id=eq.{}&owner_id=eq.{}", share_id, owner_id),
                &StatusUpdate {
                    status: ShareStatus::Revoked,
                },
            )
            .await?;
        Ok(!rows.is_empty())
    }

    /// Record that the link was just used
    pub async fn touch(&self, share_id: Uuid) -> Result<(), SupabaseError> {
        #[derive(Serialize)]
        struct Touch {
            last_used_at: DateTime<Utc>,
        }

        self.client
            .update(
                "avatar_shares",
                &format!("id=eq.{}", share_id),
                &Touch {
                    last_used_at: Utc::now(),
                },
            )
            .await
    }
}
