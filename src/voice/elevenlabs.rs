//! ElevenLabs text-to-speech and voice cloning

use std::collections::HashMap;

use bytes::Bytes;
use reqwest::{multipart, Client, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::Config;

/// Voice tuning parameters as ElevenLabs defines them
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoiceSettings {
    pub stability: f32,
    pub similarity_boost: f32,
    #[serde(default)]
    pub style: f32,
    #[serde(default = "default_speaker_boost")]
    pub use_speaker_boost: bool,
}

fn default_speaker_boost() -> bool {
    true
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            stability: 0.5,
            similarity_boost: 0.75,
            style: 0.0,
            use_speaker_boost: true,
        }
    }
}

impl VoiceSettings {
    /// Check every ratio lies in [0, 1]
    pub fn validate(&self) -> Result<(), ElevenLabsError> {
        for (name, value) in [
            ("stability", self.stability),
            ("similarity_boost", self.similarity_boost),
            ("style", self.style),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ElevenLabsError::InvalidSetting(name));
            }
        }
        Ok(())
    }
}

/// One uploaded recording used to clone a voice
#[derive(Debug, Clone)]
pub struct AudioSample {
    pub filename: String,
    pub mime: String,
    pub data: Bytes,
}

/// Voice listing entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceInfo {
    pub voice_id: String,
    pub name: String,
    pub category: Option<String>,
    pub preview_url: Option<String>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct VoiceList {
    voices: Vec<VoiceInfo>,
}

#[derive(Debug, Deserialize)]
struct AddVoiceResponse {
    voice_id: String,
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    voice_settings: Option<VoiceSettings>,
}

/// ElevenLabs API client
#[derive(Clone)]
pub struct ElevenLabsClient {
    client: Client,
    api_key: String,
    base_url: String,
    model_id: String,
}

impl ElevenLabsClient {
    pub fn new(config: &Config) -> Self {
        Self::from_parts(
            &config.elevenlabs_base_url,
            &config.elevenlabs_api_key,
            &config.elevenlabs_model_id,
        )
    }

    pub fn from_parts(base_url: &str, api_key: &str, model_id: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model_id: model_id.to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn check(response: Response) -> Result<Response, ElevenLabsError> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ElevenLabsError::Api { status: status.as_u16(), body });
        }
        Ok(response)
    }

    /// Synthesize `text` with the given voice, returning MP3 audio
    pub async fn text_to_speech(
        &self,
        voice_id: &str,
        text: &str,
        settings: Option<VoiceSettings>,
    ) -> Result<Bytes, ElevenLabsError> {
        debug!(voice_id, chars = text.len(), "Requesting speech synthesis");

        let request = SpeechRequest {
            text,
            model_id: &self.model_id,
            voice_settings: settings,
        };

        let response = self
            .client
            .post(self.url(&format!("text-to-speech/{}", voice_id)))
            .header("xi-api-key", &self.api_key)
            .header("Accept", "audio/mpeg")
            .json(&request)
            .send()
            .await
            .map_err(ElevenLabsError::Request)?;

        Self::check(response)
            .await?
            .bytes()
            .await
            .map_err(ElevenLabsError::Request)
    }

    /// Create an instant voice clone from one or more samples
    pub async fn clone_voice(
        &self,
        name: &str,
        description: Option<&str>,
        samples: Vec<AudioSample>,
    ) -> Result<String, ElevenLabsError> {
        if samples.is_empty() {
            return Err(ElevenLabsError::NoSamples);
        }

        let sample_count = samples.len();
        let mut form = multipart::Form::new().text("name", name.to_string());
        if let Some(description) = description {
            form = form.text("description", description.to_string());
        }
        for sample in samples {
            let part = multipart::Part::bytes(sample.data.to_vec())
                .file_name(sample.filename)
                .mime_str(&sample.mime)
                .map_err(ElevenLabsError::Request)?;
            form = form.part("files", part);
        }

        let response = self
            .client
            .post(self.url("voices/add"))
            .header("xi-api-key", &self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(ElevenLabsError::Request)?;

        let added: AddVoiceResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(ElevenLabsError::Request)?;

        info!(voice_id = %added.voice_id, samples = sample_count, "Cloned voice");
        Ok(added.voice_id)
    }

    pub async fn delete_voice(&self, voice_id: &str) -> Result<(), ElevenLabsError> {
        let response = self
            .client
            .delete(self.url(&format!("voices/{}", voice_id)))
            .header("xi-api-key", &self.api_key)
            .send()
            .await
            .map_err(ElevenLabsError::Request)?;

        Self::check(response).await?;
        Ok(())
    }

    pub async fn list_voices(&self) -> Result<Vec<VoiceInfo>, ElevenLabsError> {
        let response = self
            .client
            .get(self.url("voices"))
            .header("xi-api-key", &self.api_key)
            .send()
            .await
            .map_err(ElevenLabsError::Request)?;

        let list: VoiceList = Self::check(response)
            .await?
            .json()
            .await
            .map_err(ElevenLabsError::Request)?;
        Ok(list.voices)
    }

    pub async fn get_voice_settings(&self, voice_id: &str) -> Result<VoiceSettings, ElevenLabsError> {
        let response = self
            .client
            .get(self.url(&format!("voices/{}/settings", voice_id)))
            .header("xi-api-key", &self.api_key)
            .send()
            .await
            .map_err(ElevenLabsError::Request)?;

        Self::check(response)
            .await?
            .json()
            .await
            .map_err(ElevenLabsError::Request)
    }

    pub async fn edit_voice_settings(
        &self,
        voice_id: &str,
        settings: &VoiceSettings,
    ) -> Result<(), ElevenLabsError> {
        settings.validate()?;

        let response = self
            .client
            .post(self.url(&format!("voices/{}/settings/edit", voice_id)))
            .header("xi-api-key", &self.api_key)
            .json(settings)
            .send()
            .await
            .map_err(ElevenLabsError::Request)?;

        Self::check(response).await?;
        Ok(())
    }
}

/// ElevenLabs-related errors
#[derive(Debug, thiserror::Error)]
pub enum ElevenLabsError {
    #[error("HTTP request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("ElevenLabs API error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("At least one audio sample is required")]
    NoSamples,

    #[error("Voice setting {0} must be between 0 and 1")]
    InvalidSetting(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> ElevenLabsClient {
        ElevenLabsClient::from_parts(&server.uri(), "xi-test", "eleven_multilingual_v2")
    }

    #[test]
    fn settings_outside_unit_range_are_rejected() {
        let settings = VoiceSettings {
            similarity_boost: 1.2,
            ..Default::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(ElevenLabsError::InvalidSetting("similarity_boost"))
        ));
        assert!(VoiceSettings::default().validate().is_ok());
    }

    #[tokio::test]
    async fn text_to_speech_returns_audio_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/text-to-speech/voice-1"))
            .and(header("xi-api-key", "xi-test"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ID3audio".to_vec()))
            .mount(&server)
            .await;

        let audio = client_for(&server)
            .text_to_speech("voice-1", "Hello there", None)
            .await
            .unwrap();
        assert_eq!(&audio[..], b"ID3audio");
    }

    #[tokio::test]
    async fn clone_voice_requires_samples() {
        let server = MockServer::start().await;
        let err = client_for(&server)
            .clone_voice("Grandma", None, Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ElevenLabsError::NoSamples));
    }

    #[tokio::test]
    async fn clone_voice_returns_new_voice_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/voices/add"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"voice_id": "v-123"})))
            .mount(&server)
            .await;

        let sample = AudioSample {
            filename: "sample.mp3".to_string(),
            mime: "audio/mpeg".to_string(),
            data: Bytes::from_static(b"ID3"),
        };
        let voice_id = client_for(&server)
            .clone_voice("Grandma", Some("warm and slow"), vec![sample])
            .await
            .unwrap();
        assert_eq!(voice_id, "v-123");
    }

    #[tokio::test]
    async fn api_failures_surface_status() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/voices/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string("voice not found"))
            .mount(&server)
            .await;

        let err = client_for(&server).delete_voice("missing").await.unwrap_err();
        assert!(matches!(err, ElevenLabsError::Api { status: 404, .. }));
    }
}
