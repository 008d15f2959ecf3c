//! Legacy hub contributions (`legacy_memories` table)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::supabase::{SupabaseClient, SupabaseError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegacyStatus {
    Pending,
    Approved,
    Rejected,
}

impl LegacyStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            LegacyStatus::Pending => "pending",
            LegacyStatus::Approved => "approved",
            LegacyStatus::Rejected => "rejected",
        }
    }
}

/// A memory contributed by a visitor through a share link
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyMemory {
    pub id: Uuid,
    pub avatar_id: Uuid,
    pub share_id: Option<Uuid>,
    pub contributor_name: String,
    pub relationship: Option<String>,
    pub content: String,
    pub status: LegacyStatus,
    pub memory_fragment_id: Option<Uuid>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewLegacyMemory {
    pub avatar_id: Uuid,
    pub share_id: Option<Uuid>,
    pub contributor_name: String,
    pub relationship: Option<String>,
    pub content: String,
    pub status: LegacyStatus,
}

#[derive(Clone)]
pub struct LegacyStore {
    client: SupabaseClient,
}

impl LegacyStore {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    pub async fn create(&self, entry: &NewLegacyMemory) -> Result<LegacyMemory, SupabaseError> {
        self.client.insert("legacy_memories", entry).await
    }

    pub async fn list_for_avatar(
        &self,
        avatar_id: Uuid,
        status: Option<LegacyStatus>,
    ) -> Result<Vec<LegacyMemory>, SupabaseError> {
        let mut query = format!("avatar_id=eq.{}&order=created_at.desc", avatar_id);
        if let Some(status) = status {
            query.push_str(&format!("&status=eq.{}", status.as_str()));
        }
        self.client.get("legacy_memories", &query).await
    }

    pub async fn get(&self, entry_id: Uuid) -> Result<Option<LegacyMemory>, SupabaseError> {
        let query = format!("id=eq.{}", entry_id);
        self.client.get_one("legacy_memories", &query).await
    }

    pub async fn set_status(
        &self,
        entry_id: Uuid,
        status: LegacyStatus,
        memory_fragment_id: Option<Uuid>,
    ) -> Result<(), SupabaseError> {
        #[derive(Serialize)]
        struct StatusUpdate {
            status: LegacyStatus,
            #[serde(skip_serializing_if = "Option::is_none")]
            memory_fragment_id: Option<Uuid>,
        }

        self.client
            .update(
                "legacy_memories",
                &format!("id=eq.{}", entry_id),
                &StatusUpdate {
                    status,
                    memory_fragment_id,
                },
            )
            .await
    }
}
