//! OpenAI chat completions, embeddings and transcription

use bytes::Bytes;
use reqwest::{multipart, Client, Response};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Config;

/// Models and credentials for the OpenAI-compatible API
#[derive(Clone, Debug)]
pub struct OpenAiSettings {
    pub api_key: String,
    pub base_url: String,
    pub chat_model: String,
    pub embedding_model: String,
    pub transcription_model: String,
}

impl OpenAiSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            api_key: config.openai_api_key.clone(),
            base_url: config.openai_base_url.trim_end_matches('/').to_string(),
            chat_model: config.openai_chat_model.clone(),
            embedding_model: config.openai_embedding_model.clone(),
            transcription_model: config.openai_transcription_model.clone(),
        }
    }
}

/// OpenAI API client
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    settings: OpenAiSettings,
}

/// A single chat turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Sampling options for a completion
#[derive(Debug, Clone, Copy)]
pub struct ChatOptions {
    pub temperature: f32,
    pub max_tokens: u32,
    /// Ask the model for a JSON object response
    pub json_mode: bool,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            temperature: 0.8,
            max_tokens: 600,
            json_mode: false,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

impl OpenAiClient {
    pub fn new(settings: OpenAiSettings) -> Self {
        Self {
            client: Client::new(),
            settings,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(OpenAiSettings::from_config(config))
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.settings.base_url, endpoint)
    }

    async fn check(response: Response) -> Result<Response, OpenAiError> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponse>(&body)
            .map(|e| e.error.message)
            .unwrap_or(body);
        Err(OpenAiError::Api { status, message })
    }

    /// Run a chat completion and return the assistant text
    pub async fn chat(
        &self,
        messages: &[ChatMessage],
        options: ChatOptions,
    ) -> Result<String, OpenAiError> {
        debug!(
            model = %self.settings.chat_model,
            messages = messages.len(),
            json_mode = options.json_mode,
            "Requesting chat completion"
        );

        let request = ChatRequest {
            model: &self.settings.chat_model,
            messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            response_format: options.json_mode.then_some(ResponseFormat {
                kind: "json_object",
            }),
        };

        let response = self
            .client
            .post(self.url("chat/completions"))
            .bearer_auth(&self.settings.api_key)
            .json(&request)
            .send()
            .await
            .map_err(OpenAiError::Request)?;

        let completion: ChatResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(OpenAiError::Parse)?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or(OpenAiError::EmptyResponse)
    }

    /// Embed a batch of texts, preserving input order
    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, OpenAiError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(count = texts.len(), model = %self.settings.embedding_model, "Generating embeddings");

        let request = EmbeddingRequest {
            model: &self.settings.embedding_model,
            input: texts,
        };

        let response = self
            .client
            .post(self.url("embeddings"))
            .bearer_auth(&self.settings.api_key)
            .json(&request)
            .send()
            .await
            .map_err(OpenAiError::Request)?;

        let body: EmbeddingResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(OpenAiError::Parse)?;

        if body.data.len() != texts.len() {
            return Err(OpenAiError::EmbeddingCount {
                expected: texts.len(),
                got: body.data.len(),
            });
        }

        let mut data = body.data;
        data.sort_by_key(|d| d.index);
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }

    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>, OpenAiError> {
        self.embed(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or(OpenAiError::EmptyResponse)
    }

    /// Speech-to-text for voice answers
    pub async fn transcribe(
        &self,
        audio: Bytes,
        filename: &str,
        mime: &str,
    ) -> Result<String, OpenAiError> {
        debug!(bytes = audio.len(), filename, "Transcribing audio");

        let file = multipart::Part::bytes(audio.to_vec())
            .file_name(filename.to_string())
            .mime_str(mime)
            .map_err(OpenAiError::Request)?;
        let form = multipart::Form::new()
            .text("model", self.settings.transcription_model.clone())
            .part("file", file);

        let response = self
            .client
            .post(self.url("audio/transcriptions"))
            .bearer_auth(&self.settings.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(OpenAiError::Request)?;

        let body: TranscriptionResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(OpenAiError::Parse)?;

        Ok(body.text.trim().to_string())
    }
}

/// OpenAI-related errors
#[derive(Debug, thiserror::Error)]
pub enum OpenAiError {
    #[error("HTTP request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("OpenAI API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse OpenAI response: {0}")]
    Parse(#[source] reqwest::Error),

    #[error("OpenAI returned an empty response")]
    EmptyResponse,

    #[error("Expected {expected} embeddings, got {got}")]
    EmbeddingCount { expected: usize, got: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> OpenAiClient {
        OpenAiClient::new(OpenAiSettings {
            api_key: "sk-test".to_string(),
            base_url: format!("{}/v1", server.uri()),
            chat_model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            transcription_model: "whisper-1".to_string(),
        })
    }

    #[tokio::test]
    async fn chat_returns_trimmed_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("Authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({"response_format": {"type": "json_object"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "  {\"ok\": true}\n"}}]
            })))
            .mount(&server)
            .await;

        let options = ChatOptions {
            json_mode: true,
            ..Default::default()
        };
        let reply = client_for(&server)
            .chat(&[ChatMessage::user("hi")], options)
            .await
            .unwrap();
        assert_eq!(reply, "{\"ok\": true}");
    }

    #[tokio::test]
    async fn chat_with_no_choices_is_empty_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .chat(&[ChatMessage::user("hi")], ChatOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, OpenAiError::EmptyResponse));
    }

    #[tokio::test]
    async fn api_error_message_is_extracted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "error": {"message": "Rate limit reached", "type": "requests"}
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .chat(&[ChatMessage::user("hi")], ChatOptions::default())
            .await
            .unwrap_err();
        match err {
            OpenAiError::Api { status, message } => {
                assert_eq!(status, 429);
                assert_eq!(message, "Rate limit reached");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn embeddings_are_reordered_by_index() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    {"embedding": [0.0, 1.0], "index": 1},
                    {"embedding": [1.0, 0.0], "index": 0}
                ]
            })))
            .mount(&server)
            .await;

        let vectors = client_for(&server)
            .embed(&["first".to_string(), "second".to_string()])
            .await
            .unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn empty_embedding_input_skips_the_network() {
        let server = MockServer::start().await;
        let vectors = client_for(&server).embed(&[]).await.unwrap();
        assert!(vectors.is_empty());
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn transcribe_returns_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/audio/transcriptions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"text": " I grew up in Leeds. "})),
            )
            .mount(&server)
            .await;

        let text = client_for(&server)
            .transcribe(Bytes::from_static(b"RIFF"), "answer.webm", "audio/webm")
            .await
            .unwrap();
        assert_eq!(text, "I grew up in Leeds.");
    }
}
