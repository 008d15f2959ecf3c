//! Memory pipeline: remember, recall and onboarding ingestion

use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::extraction::{Extraction, FactExtractor};
use super::MemoryError;
use crate::config::Config;
use crate::llm::OpenAiClient;
use crate::store::avatars::Avatar;
use crate::store::memories::{MatchedFragment, MemoryFragment, MemorySource, NewMemoryFragment};
use crate::store::{AvatarStore, MemoryStore, ProfileStore};

/// Text to embed and store as a fragment
#[derive(Debug, Clone)]
pub struct MemoryDraft {
    pub text: String,
    pub category: Option<String>,
    pub importance: f32,
    pub metadata: Value,
}

impl MemoryDraft {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            category: None,
            importance: 0.5,
            metadata: json!({}),
        }
    }

    pub fn with_category(mut self, category: Option<String>) -> Self {
        self.category = category;
        self
    }

    pub fn with_importance(mut self, importance: f32) -> Self {
        self.importance = importance.clamp(0.0, 1.0);
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// A single interview answer to ingest
#[derive(Debug, Clone, Copy)]
pub struct AnswerInput<'a> {
    pub question_id: &'a str,
    pub question: &'a str,
    pub category: &'a str,
    pub answer: &'a str,
    pub source: MemorySource,
}

/// What an ingested answer produced
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub profile_data: Value,
    pub fragments: Vec<MemoryFragment>,
}

#[derive(Clone)]
pub struct MemoryService {
    llm: OpenAiClient,
    extractor: FactExtractor,
    memories: MemoryStore,
    profiles: ProfileStore,
    avatars: AvatarStore,
    match_threshold: f32,
    match_count: usize,
}

impl MemoryService {
    pub fn new(
        config: &Config,
        llm: OpenAiClient,
        memories: MemoryStore,
        profiles: ProfileStore,
        avatars: AvatarStore,
    ) -> Self {
        Self {
            extractor: FactExtractor::new(llm.clone()),
            llm,
            memories,
            profiles,
            avatars,
            match_threshold: config.memory_match_threshold,
            match_count: config.memory_match_count,
        }
    }

    /// Embed drafts in one batch and store one fragment each
    pub async fn remember(
        &self,
        user_id: Uuid,
        avatar_id: Option<Uuid>,
        drafts: Vec<MemoryDraft>,
        source: MemorySource,
    ) -> Result<Vec<MemoryFragment>, MemoryError> {
        let drafts: Vec<MemoryDraft> = drafts
            .into_iter()
            .filter(|d| !d.text.trim().is_empty())
            .collect();
        if drafts.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<String> = drafts.iter().map(|d| d.text.trim().to_string()).collect();
        let embeddings = self.llm.embed(&texts).await?;

        let mut stored = Vec::with_capacity(drafts.len());
        for ((draft, text), embedding) in drafts.into_iter().zip(texts).zip(embeddings) {
            let fragment = NewMemoryFragment {
                user_id,
                avatar_id,
                fragment_text: text,
                embedding,
                source,
                category: draft.category,
                importance: draft.importance,
                metadata: draft.metadata,
            };
            stored.push(self.memories.insert_fragment(&fragment).await?);
        }

        info!(
            user_id = %user_id,
            avatar_id = ?avatar_id,
            count = stored.len(),
            source = %source,
            "Stored memory fragments"
        );
        Ok(stored)
    }

    /// Semantic search over a user's fragments, most similar first
    pub async fn recall(
        &self,
        user_id: Uuid,
        avatar_id: Option<Uuid>,
        query: &str,
    ) -> Result<Vec<MatchedFragment>, MemoryError> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let embedding = self.llm.embed_one(query).await?;
        let mut matches = self
            .memories
            .match_fragments(
                &embedding,
                user_id,
                avatar_id,
                self.match_threshold,
                self.match_count,
            )
            .await?;
        matches.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        Ok(matches)
    }

    /// Extract facts from an answer, merge them into the profile and store
    /// the fragments.
    ///
    /// Facts go to the avatar's `profile_data` when an avatar is given,
    /// otherwise to the user's own profile.
    pub async fn ingest_answer(
        &self,
        user_id: Uuid,
        avatar: Option<&Avatar>,
        input: AnswerInput<'_>,
    ) -> Result<IngestOutcome, MemoryError> {
        let extraction = match self
            .extractor
            .extract(input.question, input.answer, input.category)
            .await
        {
            Ok(extraction) => extraction,
            Err(MemoryError::InvalidExtraction(reason)) => {
                warn!(user_id = %user_id, question_id = input.question_id, %reason, "Unparseable extraction, storing raw answer");
                Extraction::empty()
            }
            Err(e) => return Err(e),
        };
        if extraction.is_empty() {
            debug!(user_id = %user_id, question_id = input.question_id, "No facts extracted, storing raw answer");
        }

        let mut updates = extraction.profile_updates.clone();
        crate::util::json::merge_json(
            &mut updates,
            &json!({ "_onboarding": { "answered": [input.question_id] } }),
        );

        let profile_data = match avatar {
            Some(avatar) => self.avatars.merge_profile_data(avatar, &updates).await?,
            None => self.profiles.merge_profile_data(user_id, &updates).await?,
        };

        let metadata = json!({ "question_id": input.question_id });
        let mut drafts: Vec<MemoryDraft> = extraction
            .memory_fragments
            .into_iter()
            .map(|f| {
                MemoryDraft::new(f.text)
                    .with_category(f.category.or_else(|| Some(input.category.to_string())))
                    .with_importance(f.importance)
                    .with_metadata(metadata.clone())
            })
            .collect();

        if drafts.is_empty() && !input.answer.trim().is_empty() {
            drafts.push(
                MemoryDraft::new(input.answer)
                    .with_category(Some(input.category.to_string()))
                    .with_metadata(metadata),
            );
        }

        let fragments = self
            .remember(user_id, avatar.map(|a| a.id), drafts, input.source)
            .await?;

        Ok(IngestOutcome {
            profile_data,
            fragments,
        })
    }

    pub fn store(&self) -> &MemoryStore {
        &self.memories
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SupabaseClient;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn service_for(server: &MockServer) -> MemoryService {
        let config = Config::for_tests(&server.uri());
        let supabase = SupabaseClient::new(&config);
        MemoryService::new(
            &config,
            OpenAiClient::from_config(&config),
            MemoryStore::new(supabase.clone()),
            ProfileStore::new(supabase.clone()),
            AvatarStore::new(supabase),
        )
    }

    fn fragment_row(user_id: Uuid, text: &str) -> Value {
        json!({
            "id": Uuid::new_v4(),
            "user_id": user_id,
            "avatar_id": null,
            "fragment_text": text,
            "source": "onboarding",
            "category": "identity",
            "importance": 0.9,
            "metadata": {"question_id": "identity_hometown"},
            "created_at": "2026-01-01T00:00:00Z"
        })
    }

    #[tokio::test]
    async fn recall_sorts_by_similarity() {
        let server = MockServer::start().await;
        let user_id = Uuid::new_v4();
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"embedding": [0.1, 0.2], "index": 0}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/rpc/match_memory_fragments"))
            .and(body_partial_json(json!({"match_count": 8, "p_user_id": user_id})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": Uuid::new_v4(), "fragment_text": "low", "category": null, "similarity": 0.4},
                {"id": Uuid::new_v4(), "fragment_text": "high", "category": null, "similarity": 0.9}
            ])))
            .mount(&server)
            .await;

        let matches = service_for(&server)
            .recall(user_id, None, "where did you grow up?")
            .await
            .unwrap();
        let texts: Vec<&str> = matches.iter().map(|m| m.fragment_text.as_str()).collect();
        assert_eq!(texts, vec!["high", "low"]);
    }

    #[tokio::test]
    async fn remember_skips_blank_drafts_without_calls() {
        let server = MockServer::start().await;
        let stored = service_for(&server)
            .remember(
                Uuid::new_v4(),
                None,
                vec![MemoryDraft::new("   ")],
                MemorySource::Manual,
            )
            .await
            .unwrap();
        assert!(stored.is_empty());
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn ingest_answer_merges_profile_and_stores_fragments() {
        let server = MockServer::start().await;
        let user_id = Uuid::new_v4();

        let extraction = json!({
            "profile_updates": {"identity": {"hometown": "Leeds"}},
            "memory_fragments": [{"text": "I grew up in Leeds.", "category": "identity", "importance": 0.9}]
        });
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": extraction.to_string()}}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/profiles"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": user_id,
                "full_name": "Margaret",
                "profile_data": {"identity": {"name": "Margaret"}},
                "onboarding_complete": false,
                "created_at": null,
                "updated_at": null
            })))
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/rest/v1/profiles"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"embedding": [0.3, 0.4], "index": 0}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/memory_fragments"))
            .and(body_partial_json(json!({"fragment_text": "I grew up in Leeds.", "source": "onboarding"})))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(json!([fragment_row(user_id, "I grew up in Leeds.")])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let outcome = service_for(&server)
            .ingest_answer(
                user_id,
                None,
                AnswerInput {
                    question_id: "identity_hometown",
                    question: "Where did you grow up?",
                    category: "identity",
                    answer: "Leeds, mostly.",
                    source: MemorySource::Onboarding,
                },
            )
            .await
            .unwrap();

        assert_eq!(
            outcome.profile_data,
            json!({
                "identity": {"name": "Margaret", "hometown": "Leeds"},
                "_onboarding": {"answered": ["identity_hometown"]}
            })
        );
        assert_eq!(outcome.fragments.len(), 1);
        assert_eq!(outcome.fragments[0].fragment_text, "I grew up in Leeds.");
    }
}
