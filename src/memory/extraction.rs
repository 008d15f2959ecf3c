//! LLM-backed fact extraction from free-text answers

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::MemoryError;
use crate::llm::{ChatMessage, ChatOptions, OpenAiClient};
use crate::util::json::empty_object;

const EXTRACTION_INSTRUCTIONS: &str = "You extract personal facts for a memory profile. \
Given an interview question and the person's answer, respond with a JSON object with two keys:\n\
\"profile_updates\": an object of structured facts grouped under the category key \
(for example {\"identity\": {\"hometown\": \"Leeds\"}}). Use short snake_case keys and arrays for lists.\n\
\"memory_fragments\": an array of objects {\"text\", \"category\", \"importance\"} where text is one \
self-contained first-person statement, category is a single word and importance is between 0 and 1.\n\
Only include facts the answer states. Never guess. Use empty values when nothing applies.";

/// A single memory statement pulled from an answer
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedFragment {
    pub text: String,
    pub category: Option<String>,
    pub importance: f32,
}

/// Structured output of one extraction call
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub profile_updates: Value,
    pub memory_fragments: Vec<ExtractedFragment>,
}

impl Extraction {
    pub fn empty() -> Self {
        Self {
            profile_updates: empty_object(),
            memory_fragments: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.memory_fragments.is_empty()
            && self.profile_updates.as_object().map_or(true, |m| m.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct RawExtraction {
    #[serde(default)]
    profile_updates: Value,
    #[serde(default)]
    memory_fragments: Vec<RawFragment>,
}

#[derive(Debug, Deserialize)]
struct RawFragment {
    #[serde(default)]
    text: String,
    category: Option<String>,
    importance: Option<f32>,
}

/// Parse the model's JSON, tolerating a surrounding code fence
pub fn parse_extraction(raw: &str) -> Result<Extraction, MemoryError> {
    let payload = strip_code_fence(raw);
    let parsed: RawExtraction = serde_json::from_str(payload)
        .map_err(|e| MemoryError::InvalidExtraction(e.to_string()))?;

    let profile_updates = match parsed.profile_updates {
        Value::Object(map) => Value::Object(map),
        _ => empty_object(),
    };

    let memory_fragments = parsed
        .memory_fragments
        .into_iter()
        .filter_map(|f| {
            let text = f.text.trim().to_string();
            if text.is_empty() {
                return None;
            }
            Some(ExtractedFragment {
                text,
                category: f
                    .category
                    .map(|c| c.trim().to_lowercase())
                    .filter(|c| !c.is_empty()),
                importance: f.importance.unwrap_or(0.5).clamp(0.0, 1.0),
            })
        })
        .collect();

    Ok(Extraction {
        profile_updates,
        memory_fragments,
    })
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    if let Some(rest) = trimmed.strip_prefix("```") {
        // Drop the language tag line, then the closing fence
        let body = rest.split_once('\n').map(|(_, b)| b).unwrap_or("");
        return body.trim_end().trim_end_matches("```").trim();
    }
    trimmed
}

/// Prompt messages for one interview answer
pub fn extraction_messages(question: &str, answer: &str, category: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(EXTRACTION_INSTRUCTIONS),
        ChatMessage::user(format!(
            "Category: {}\nQuestion: {}\nAnswer: {}",
            category, question, answer
        )),
    ]
}

/// Runs extraction prompts against the chat model
#[derive(Clone)]
pub struct FactExtractor {
    llm: OpenAiClient,
}

impl FactExtractor {
    pub fn new(llm: OpenAiClient) -> Self {
        Self { llm }
    }

    pub async fn extract(
        &self,
        question: &str,
        answer: &str,
        category: &str,
    ) -> Result<Extraction, MemoryError> {
        if answer.trim().is_empty() {
            return Ok(Extraction::empty());
        }

        let options = ChatOptions {
            temperature: 0.2,
            max_tokens: 800,
            json_mode: true,
        };
        let raw = self
            .llm
            .chat(&extraction_messages(question, answer, category), options)
            .await?;
        let extraction = parse_extraction(&raw)?;

        debug!(
            category,
            fragments = extraction.memory_fragments.len(),
            "Extracted facts from answer"
        );
        Ok(extraction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_plain_json() {
        let extraction = parse_extraction(
            r#"{"profile_updates": {"identity": {"hometown": "Leeds"}},
                "memory_fragments": [{"text": "I grew up in Leeds.", "category": "Identity", "importance": 0.9}]}"#,
        )
        .unwrap();

        assert_eq!(
            extraction.profile_updates,
            json!({"identity": {"hometown": "Leeds"}})
        );
        assert_eq!(
            extraction.memory_fragments,
            vec![ExtractedFragment {
                text: "I grew up in Leeds.".to_string(),
                category: Some("identity".to_string()),
                importance: 0.9,
            }]
        );
    }

    #[test]
    fn tolerates_code_fence() {
        let raw = "```json\n{\"profile_updates\": {}, \"memory_fragments\": []}\n```";
        let extraction = parse_extraction(raw).unwrap();
        assert!(extraction.is_empty());
    }

    #[test]
    fn drops_blank_fragments_and_clamps_importance() {
        let extraction = parse_extraction(
            r#"{"memory_fragments": [
                {"text": "   "},
                {"text": "I love sailing", "importance": 3.0},
                {"text": "My dog is Rex"}
            ]}"#,
        )
        .unwrap();

        let importances: Vec<f32> = extraction
            .memory_fragments
            .iter()
            .map(|f| f.importance)
            .collect();
        assert_eq!(importances, vec![1.0, 0.5]);
        assert_eq!(extraction.profile_updates, json!({}));
    }

    #[test]
    fn non_object_profile_updates_become_empty() {
        let extraction = parse_extraction(r#"{"profile_updates": ["nope"]}"#).unwrap();
        assert_eq!(extraction.profile_updates, json!({}));
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert!(matches!(
            parse_extraction("I could not find any facts."),
            Err(MemoryError::InvalidExtraction(_))
        ));
    }

    #[tokio::test]
    async fn blank_answer_short_circuits() {
        let llm = OpenAiClient::new(crate::llm::openai::OpenAiSettings {
            api_key: "unused".to_string(),
            base_url: "http://127.0.0.1:9".to_string(),
            chat_model: "m".to_string(),
            embedding_model: "e".to_string(),
            transcription_model: "t".to_string(),
        });
        let extraction = FactExtractor::new(llm)
            .extract("Where did you grow up?", "  \n", "identity")
            .await
            .unwrap();
        assert!(extraction.is_empty());
    }
}
