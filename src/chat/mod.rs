//! Persona chat: recall, prompt, complete, optionally speak

use bytes::Bytes;
use serde_json::json;
use tracing::{info, warn};

use crate::llm::{ChatMessage, ChatOptions, OpenAiClient, OpenAiError};
use crate::memory::{ContextBuilder, MemoryDraft, MemoryError, MemoryService, Persona};
use crate::store::avatars::Avatar;
use crate::store::memories::MemorySource;
use crate::voice::{ElevenLabsClient, ElevenLabsError};

/// Maximum accepted length of one user message
pub const MAX_MESSAGE_CHARS: usize = 4000;

/// One chat turn request
#[derive(Debug, Clone)]
pub struct ChatTurn<'a> {
    pub message: &'a str,
    pub history: &'a [ChatMessage],
    pub with_voice: bool,
    /// Persist the user's message as a chat memory
    pub remember: bool,
}

/// Generated persona reply
#[derive(Debug, Clone)]
pub struct ChatReply {
    pub reply: String,
    pub memories_used: usize,
    pub audio: Option<Bytes>,
}

#[derive(Clone)]
pub struct ChatService {
    memory: MemoryService,
    llm: OpenAiClient,
    voice: ElevenLabsClient,
    context: ContextBuilder,
}

impl ChatService {
    pub fn new(memory: MemoryService, llm: OpenAiClient, voice: ElevenLabsClient) -> Self {
        Self {
            memory,
            llm,
            voice,
            context: ContextBuilder::default(),
        }
    }

    /// Reply as `avatar`, grounded in the owner's memories for it
    pub async fn reply(&self, avatar: &Avatar, turn: ChatTurn<'_>) -> Result<ChatReply, ChatError> {
        let message = turn.message.trim();
        if message.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if message.chars().count() > MAX_MESSAGE_CHARS {
            return Err(ChatError::MessageTooLong);
        }
        if turn.with_voice && !avatar.has_voice() {
            return Err(ChatError::NoVoice);
        }

        let memories = self
            .memory
            .recall(avatar.user_id, Some(avatar.id), message)
            .await?;

        let system = self
            .context
            .system_prompt(&Persona::from(avatar), &avatar.profile_data, &memories);
        let messages = self.context.build_messages(system, turn.history, message);

        let reply = self.llm.chat(&messages, ChatOptions::default()).await?;

        info!(
            avatar_id = %avatar.id,
            memories_used = memories.len(),
            reply_chars = reply.len(),
            "Generated persona reply"
        );

        let audio = match (turn.with_voice, avatar.voice_id.as_deref()) {
            (true, Some(voice_id)) => Some(
                self.voice
                    .text_to_speech(voice_id, &reply, avatar.voice_settings)
                    .await?,
            ),
            _ => None,
        };

        if turn.remember {
            self.remember_turn(avatar, message).await;
        }

        Ok(ChatReply {
            reply,
            memories_used: memories.len(),
            audio,
        })
    }

    async fn remember_turn(&self, avatar: &Avatar, message: &str) {
        let draft = MemoryDraft::new(message)
            .with_category(Some("conversation".to_string()))
            .with_metadata(json!({ "role": "user" }));

        if let Err(e) = self
            .memory
            .remember(avatar.user_id, Some(avatar.id), vec![draft], MemorySource::Chat)
            .await
        {
            warn!(avatar_id = %avatar.id, error = %e, "Failed to store chat memory");
        }
    }
}

/// Chat errors
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Message cannot be empty")]
    EmptyMessage,

    #[error("Message exceeds {MAX_MESSAGE_CHARS} characters")]
    MessageTooLong,

    #[error("Avatar has no voice configured")]
    NoVoice,

    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("Language model error: {0}")]
    Llm(#[from] OpenAiError),

    #[error("Voice error: {0}")]
    Voice(#[from] ElevenLabsError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::store::{AvatarStore, MemoryStore, ProfileStore, SupabaseClient};
    use serde_json::json;
    use uuid::Uuid;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn service_for(server: &MockServer) -> ChatService {
        let config = Config::for_tests(&server.uri());
        let supabase = SupabaseClient::new(&config);
        let llm = OpenAiClient::from_config(&config);
        let memory = MemoryService::new(
            &config,
            llm.clone(),
            MemoryStore::new(supabase.clone()),
            ProfileStore::new(supabase.clone()),
            AvatarStore::new(supabase),
        );
        ChatService::new(memory, llm, ElevenLabsClient::new(&config))
    }

    fn avatar(voice_id: Option<&str>) -> Avatar {
        serde_json::from_value(json!({
            "id": Uuid::new_v4(),
            "user_id": Uuid::new_v4(),
            "name": "Margaret",
            "description": "A retired schoolteacher",
            "personality": "Warm",
            "profile_data": {"identity": {"hometown": "Leeds"}},
            "voice_id": voice_id,
            "voice_settings": null,
            "is_active": true,
            "created_at": null,
            "updated_at": null
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn empty_message_is_rejected() {
        let server = MockServer::start().await;
        let turn = ChatTurn {
            message: "   ",
            history: &[],
            with_voice: false,
            remember: false,
        };
        let err = service_for(&server).reply(&avatar(None), turn).await.unwrap_err();
        assert!(matches!(err, ChatError::EmptyMessage));
    }

    #[tokio::test]
    async fn voice_without_voice_id_is_rejected_before_any_call() {
        let server = MockServer::start().await;
        let turn = ChatTurn {
            message: "Hello",
            history: &[],
            with_voice: true,
            remember: false,
        };
        let err = service_for(&server).reply(&avatar(None), turn).await.unwrap_err();
        assert!(matches!(err, ChatError::NoVoice));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reply_uses_recalled_memories_and_speaks() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"embedding": [0.5, 0.5], "index": 0}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/rpc/match_memory_fragments"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": Uuid::new_v4(), "fragment_text": "I taught maths in Leeds.", "category": "life_story", "similarity": 0.82}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_string_contains("I taught maths in Leeds."))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "Oh, thirty years of fractions, love."}}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/elevenlabs/v1/text-to-speech/voice-9"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"mp3".to_vec()))
            .mount(&server)
            .await;

        let turn = ChatTurn {
            message: "What did you do for work?",
            history: &[],
            with_voice: true,
            remember: false,
        };
        let reply = service_for(&server)
            .reply(&avatar(Some("voice-9")), turn)
            .await
            .unwrap();

        assert_eq!(reply.reply, "Oh, thirty years of fractions, love.");
        assert_eq!(reply.memories_used, 1);
        assert_eq!(reply.audio.as_deref(), Some(&b"mp3"[..]));
    }
}
