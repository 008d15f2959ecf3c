//! User profile management

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::supabase::{SupabaseClient, SupabaseError};
use crate::util::json::{empty_object, merge_json};

/// User profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub full_name: Option<String>,
    #[serde(default = "empty_object")]
    pub profile_data: Value,
    #[serde(default)]
    pub onboarding_complete: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// New profile for insertion
#[derive(Debug, Clone, Serialize)]
pub struct NewProfile {
    pub id: Uuid,
    pub profile_data: Value,
}

/// Profile update
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub onboarding_complete: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Profile store operations
#[derive(Clone)]
pub struct ProfileStore {
    client: SupabaseClient,
}

impl ProfileStore {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    /// Get a user profile by ID
    pub async fn get_profile(&self, user_id: Uuid) -> Result<Option<UserProfile>, SupabaseError> {
        let query = format!("id=eq.{}", user_id);
        self.client.get_one("profiles", &query).await
    }

    /// Create a new, empty user profile
    pub async fn create_profile(&self, user_id: Uuid) -> Result<UserProfile, SupabaseError> {
        let profile = NewProfile {
            id: user_id,
            profile_data: empty_object(),
        };
        self.client.insert("profiles", &profile).await
    }

    /// Update a user profile
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        mut update: ProfileUpdate,
    ) -> Result<(), SupabaseError> {
        update.updated_at.get_or_insert_with(Utc::now);
        let query = format!("id=eq.{}", user_id);
        self.client.update("profiles", &query, &update).await
    }

    /// Get or create profile (ensures profile exists)
    pub async fn ensure_profile(&self, user_id: Uuid) -> Result<UserProfile, SupabaseError> {
        match self.get_profile(user_id).await? {
            Some(profile) => Ok(profile),
            None => self.create_profile(user_id).await,
        }
    }

    /// Deep-merge extracted facts into the stored `profile_data`
    pub async fn merge_profile_data(
        &self,
        user_id: Uuid,
        updates: &Value,
    ) -> Result<Value, SupabaseError> {
        let mut profile = self.ensure_profile(user_id).await?;
        merge_json(&mut profile.profile_data, updates);

        self.update_profile(
            user_id,
            ProfileUpdate {
                profile_data: Some(profile.profile_data.clone()),
                ..Default::default()
            },
        )
        .await?;

        Ok(profile.profile_data)
    }

    pub async fn mark_onboarding_complete(&self, user_id: Uuid) -> Result<(), SupabaseError> {
        self.update_profile(
            user_id,
            ProfileUpdate {
                onboarding_complete: Some(true),
                ..Default::default()
            },
        )
        .await
    }
}
