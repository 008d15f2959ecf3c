//! Avatar persona records (`avatar_profiles` table)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::supabase::{SupabaseClient, SupabaseError};
use crate::util::json::{empty_object, merge_json};
use crate::voice::VoiceSettings;

/// Avatar persona
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Avatar {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// Traits and speaking style, free text
    pub personality: Option<String>,
    #[serde(default = "empty_object")]
    pub profile_data: Value,
    pub voice_id: Option<String>,
    pub voice_settings: Option<VoiceSettings>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_active() -> bool {
    true
}

impl Avatar {
    pub fn has_voice(&self) -> bool {
        self.voice_id.as_deref().is_some_and(|v| !v.is_empty())
    }
}

/// New avatar for insertion
#[derive(Debug, Clone, Serialize)]
pub struct NewAvatar {
    pub user_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub personality: Option<String>,
    pub profile_data: Value,
}

/// Partial avatar update
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AvatarUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub profile_data: Option<Value>,
    #[serde(skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub voice_settings: Option<VoiceSettings>,
    #[serde(skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Avatar store operations
#[derive(Clone)]
pub struct AvatarStore {
    client: SupabaseClient,
}

impl AvatarStore {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Avatar>, SupabaseError> {
        let query = format!("user_id=eq.{}&order=created_at.desc", user_id);
        self.client.get("avatar_profiles", &query).await
    }

    pub async fn get(&self, avatar_id: Uuid) -> Result<Option<Avatar>, SupabaseError> {
        let query = format!("id=eq.{}", avatar_id);
        self.client.get_one("avatar_profiles", &query).await
    }

    /// Fetch an avatar only if `user_id` owns it
    pub async fn get_owned(
        &self,
        avatar_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Avatar>, SupabaseError> {
        let query = format!("id=eq.{}&user_id=eq.{}", avatar_id, user_id);
        self.client.get_one("avatar_profiles", &query).await
    }

    pub async fn create(&self, avatar: &NewAvatar) -> Result<Avatar, SupabaseError> {
        self.client.insert("avatar_profiles", avatar).await
    }

    pub async fn update(
        &self,
        avatar_id: Uuid,
        mut update: AvatarUpdate,
    ) -> Result<Option<Avatar>, SupabaseError> {
        update.updated_at = Some(Utc::now());
        let query = format!("id=eq.{}", avatar_id);
        let rows: Vec<Avatar> = self
            .client
            .update_returning("avatar_profiles", &query, &update)
            .await?;
        Ok(rows.into_iter().next())
    }

    pub async fn delete(&self, avatar_id: Uuid) -> Result<bool, SupabaseError> {
        let query = format!("id=eq.{}", avatar_id);
        Ok(self.client.delete("avatar_profiles", &query).await? > 0)
    }

    /// Set or clear the cloned ElevenLabs voice
    pub async fn set_voice(
        &self,
        avatar_id: Uuid,
        voice_id: Option<&str>,
    ) -> Result<(), SupabaseError> {
        #[derive(Serialize)]
        struct VoiceUpdate<'a> {
            voice_id: Option<&'a str>,
            updated_at: DateTime<Utc>,
        }

        self.client
            .update(
                "avatar_profiles",
                &format!("id=eq.{}", avatar_id),
                &VoiceUpdate {
                    voice_id,
                    updated_at: Utc::now(),
                },
            )
            .await
    }

    pub async fn merge_profile_data(
        &self,
        avatar: &Avatar,
        updates: &Value,
    ) -> Result<Value, SupabaseError> {
        let mut data = avatar.profile_data.clone();
        merge_json(&mut data, updates);

        self.update(
            avatar.id,
            AvatarUpdate {
                profile_data: Some(data.clone()),
                ..Default::default()
            },
        )
        .await?;

        Ok(data)
    }
}
