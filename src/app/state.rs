//! Application state shared across routes

use std::sync::Arc;

use crate::chat::ChatService;
use crate::config::Config;
use crate::conversation::{ConversationManager, TurnContext};
use crate::llm::OpenAiClient;
use crate::memory::MemoryService;
use crate::store::{AvatarStore, LegacyStore, MemoryStore, ProfileStore, ShareStore, SupabaseClient};
use crate::util::rate_limit::UserRateLimiter;
use crate::voice::ElevenLabsClient;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub profile_store: ProfileStore,
    pub avatar_store: AvatarStore,
    pub share_store: ShareStore,
    pub legacy_store: LegacyStore,
    pub openai: OpenAiClient,
    pub elevenlabs: ElevenLabsClient,
    pub memory: MemoryService,
    pub chat: ChatService,
    pub conversations: Arc<ConversationManager>,
    pub chat_limiter: UserRateLimiter,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);

        // Initialize Supabase client
        let supabase = SupabaseClient::new(&config);

        // Initialize stores
        let profile_store = ProfileStore::new(supabase.clone());
        let avatar_store = AvatarStore::new(supabase.clone());
        let memory_store = MemoryStore::new(supabase.clone());
        let share_store = ShareStore::new(supabase.clone());
        let legacy_store = LegacyStore::new(supabase);

        // External AI services
        let openai = OpenAiClient::from_config(&config);
        let elevenlabs = ElevenLabsClient::new(&config);

        let memory = MemoryService::new(
            &config,
            openai.clone(),
            memory_store,
            profile_store.clone(),
            avatar_store.clone(),
        );
        let chat = ChatService::new(memory.clone(), openai.clone(), elevenlabs.clone());

        let chat_limiter = UserRateLimiter::per_minute(config.chat_rate_limit_per_minute);

        Self {
            config,
            profile_store,
            avatar_store,
            share_store,
            legacy_store,
            openai,
            elevenlabs,
            memory,
            chat,
            conversations: Arc::new(ConversationManager::new()),
            chat_limiter,
        }
    }

    /// Handles needed by a spawned conversation turn
    pub fn turn_context(&self) -> TurnContext {
        TurnContext {
            conversations: self.conversations.clone(),
            avatars: self.avatar_store.clone(),
            chat: self.chat.clone(),
            chat_limiter: self.chat_limiter.clone(),
        }
    }
}
