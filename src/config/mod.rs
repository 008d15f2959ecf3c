//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Supabase project URL
    pub supabase_url: String,
    /// Supabase service role key (bypasses RLS - server only!)
    pub supabase_service_role_key: String,
    /// Supabase JWT secret for token verification
    pub supabase_jwt_secret: String,

    /// OpenAI API key
    pub openai_api_key: String,
    /// OpenAI-compatible base URL
    pub openai_base_url: String,
    pub openai_chat_model: String,
    pub openai_embedding_model: String,
    pub openai_transcription_model: String,

    /// ElevenLabs API key
    pub elevenlabs_api_key: String,
    pub elevenlabs_base_url: String,
    /// TTS model used for avatar speech
    pub elevenlabs_model_id: String,

    /// Minimum cosine similarity for recalled memory fragments
    pub memory_match_threshold: f32,
    /// Maximum fragments recalled per query
    pub memory_match_count: usize,

    /// Chat requests allowed per user per minute
    pub chat_rate_limit_per_minute: u32,

    /// Public base URL used when building share links
    pub public_base_url: String,
    /// Allowed client origin for CORS
    pub client_origin: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Render provides PORT env var, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            supabase_url: required("SUPABASE_URL")?,
            supabase_service_role_key: required("SUPABASE_SERVICE_ROLE_KEY")?,
            supabase_jwt_secret: required("SUPABASE_JWT_SECRET")?,

            openai_api_key: required("OPENAI_API_KEY")?,
            openai_base_url: optional("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            openai_chat_model: optional("OPENAI_CHAT_MODEL", "gpt-4o-mini"),
            openai_embedding_model: optional("OPENAI_EMBEDDING_MODEL", "text-embedding-3-small"),
            openai_transcription_model: optional("OPENAI_TRANSCRIPTION_MODEL", "whisper-1"),

            elevenlabs_api_key: required("ELEVENLABS_API_KEY")?,
            elevenlabs_base_url: optional("ELEVENLABS_BASE_URL", "https://api.elevenlabs.io/v1"),
            elevenlabs_model_id: optional("ELEVENLABS_MODEL_ID", "eleven_multilingual_v2"),

            memory_match_threshold: parsed("MEMORY_MATCH_THRESHOLD", 0.3)?,
            memory_match_count: parsed("MEMORY_MATCH_COUNT", 8)?,
            chat_rate_limit_per_minute: parsed("CHAT_RATE_LIMIT_PER_MINUTE", 20)?,

            public_base_url: required("PUBLIC_BASE_URL")?
                .trim_end_matches('/')
                .to_string(),
            client_origin: required("CLIENT_ORIGIN")?,
        })
    }

    /// Configuration pointing every upstream at a single base URL (tests)
    #[cfg(test)]
    pub fn for_tests(upstream: &str) -> Self {
        Self {
            server_addr: "127.0.0.1:0".parse().expect("valid addr"),
            log_level: "debug".to_string(),
            supabase_url: upstream.to_string(),
            supabase_service_role_key: "service-role".to_string(),
            supabase_jwt_secret: "test-jwt-secret".to_string(),
            openai_api_key: "sk-test".to_string(),
            openai_base_url: format!("{}/v1", upstream),
            openai_chat_model: "gpt-4o-mini".to_string(),
            openai_embedding_model: "text-embedding-3-small".to_string(),
            openai_transcription_model: "whisper-1".to_string(),
            elevenlabs_api_key: "xi-test".to_string(),
            elevenlabs_base_url: format!("{}/elevenlabs/v1", upstream),
            elevenlabs_model_id: "eleven_multilingual_v2".to_string(),
            memory_match_threshold: 0.3,
            memory_match_count: 8,
            chat_rate_limit_per_minute: 20,
            public_base_url: "https://echostone.test".to_string(),
            client_origin: "http://localhost:3000".to_string(),
        }
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn optional(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parsed<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber(name)),
        _ => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,

    #[error("Invalid numeric value for environment variable: {0}")]
    InvalidNumber(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parsed_falls_back_to_default_when_unset() {
        let value: usize = parsed("ECHOSTONE_TEST_UNSET_NUMBER", 8).unwrap();
        assert_eq!(value, 8);
    }

    #[test]
    fn parsed_rejects_garbage() {
        env::set_var("ECHOSTONE_TEST_BAD_NUMBER", "eight");
        let result: Result<f32, _> = parsed("ECHOSTONE_TEST_BAD_NUMBER", 0.3);
        assert!(matches!(
            result,
            Err(ConfigError::InvalidNumber("ECHOSTONE_TEST_BAD_NUMBER"))
        ));
    }

    #[test]
    fn optional_ignores_blank_values() {
        env::set_var("ECHOSTONE_TEST_BLANK", "   ");
        assert_eq!(optional("ECHOSTONE_TEST_BLANK", "fallback"), "fallback");
    }
}
