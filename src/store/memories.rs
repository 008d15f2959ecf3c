//! Vector-embedded memory fragments (`memory_fragments` table)

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::supabase::{SupabaseClient, SupabaseError};

/// Columns returned to callers; the embedding itself is never read back
const FRAGMENT_COLUMNS: &str =
    "id,user_id,avatar_id,fragment_text,source,category,importance,metadata,created_at";

/// Where a fragment came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemorySource {
    Onboarding,
    Chat,
    Manual,
    Voice,
    Legacy,
}

impl fmt::Display for MemorySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MemorySource::Onboarding => "onboarding",
            MemorySource::Chat => "chat",
            MemorySource::Manual => "manual",
            MemorySource::Voice => "voice",
            MemorySource::Legacy => "legacy",
        };
        f.write_str(s)
    }
}

/// Stored memory fragment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryFragment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub avatar_id: Option<Uuid>,
    pub fragment_text: String,
    pub source: MemorySource,
    pub category: Option<String>,
    #[serde(default = "default_importance")]
    pub importance: f32,
    #[serde(default)]
    pub metadata: Value,
    pub created_at: Option<DateTime<Utc>>,
}

fn default_importance() -> f32 {
    0.5
}

/// New fragment for insertion
#[derive(Debug, Clone, Serialize)]
pub struct NewMemoryFragment {
    pub user_id: Uuid,
    pub avatar_id: Option<Uuid>,
    pub fragment_text: String,
    pub embedding: Vec<f32>,
    pub source: MemorySource,
    pub category: Option<String>,
    pub importance: f32,
    pub metadata: Value,
}

/// Row returned by the `match_memory_fragments` RPC
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchedFragment {
    pub id: Uuid,
    pub fragment_text: String,
    pub category: Option<String>,
    #[serde(default = "default_importance")]
    pub importance: f32,
    pub similarity: f32,
}

#[derive(Debug, Serialize)]
struct MatchArgs<'a> {
    query_embedding: &'a [f32],
    match_threshold: f32,
    match_count: usize,
    p_user_id: Uuid,
    p_avatar_id: Option<Uuid>,
}

/// Memory fragment store operations
#[derive(Clone)]
pub struct MemoryStore {
    client: SupabaseClient,
}

impl MemoryStore {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    pub async fn insert_fragment(
        &self,
        fragment: &NewMemoryFragment,
    ) -> Result<MemoryFragment, SupabaseError> {
        self.client.insert("memory_fragments", fragment).await
    }

    /// Most recent fragments for a user, optionally scoped to one avatar
    pub async fn list(
        &self,
        user_id: Uuid,
        avatar_id: Option<Uuid>,
        limit: usize,
    ) -> Result<Vec<MemoryFragment>, SupabaseError> {
        let mut query = format!(
            "select={}&user_id=eq.{}&order=created_at.desc&limit={}",
            FRAGMENT_COLUMNS, user_id, limit
        );
        if let Some(avatar_id) = avatar_id {
            query.push_str(&format!("&avatar_id=eq.{}", avatar_id));
        }
        self.client.get("memory_fragments", &query).await
    }

    /// Delete a fragment owned by `user_id`; false when nothing matched
    pub async fn delete(&self, fragment_id: Uuid, user_id: Uuid) -> Result<bool, SupabaseError> {
        let query = format!("id=eq.{}&user_id=eq.{}", fragment_id, user_id);
        Ok(self.client.delete("memory_fragments", &query).await? > 0)
    }

    /// Vector similarity search delegated to pgvector
    pub async fn match_fragments(
        &self,
        query_embedding: &[f32],
        user_id: Uuid,
        avatar_id: Option<Uuid>,
        threshold: f32,
        count: usize,
    ) -> Result<Vec<MatchedFragment>, SupabaseError> {
        let args = MatchArgs {
            query_embedding,
            match_threshold: threshold,
            match_count: count,
            p_user_id: user_id,
            p_avatar_id: avatar_id,
        };
        self.client.rpc("match_memory_fragments", &args).await
    }
}
