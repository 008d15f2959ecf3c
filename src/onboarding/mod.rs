//! Onboarding interview catalog and progress tracking

use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionCategory {
    Identity,
    Personality,
    Relationships,
    LifeStory,
    Values,
    Preferences,
}

impl QuestionCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionCategory::Identity => "identity",
            QuestionCategory::Personality => "personality",
            QuestionCategory::Relationships => "relationships",
            QuestionCategory::LifeStory => "life_story",
            QuestionCategory::Values => "values",
            QuestionCategory::Preferences => "preferences",
        }
    }
}

/// One interview question
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Question {
    pub id: &'static str,
    pub category: QuestionCategory,
    pub prompt: &'static str,
    pub follow_up: Option<&'static str>,
}

const fn q(
    id: &'static str,
    category: QuestionCategory,
    prompt: &'static str,
    follow_up: Option<&'static str>,
) -> Question {
    Question {
        id,
        category,
        prompt,
        follow_up,
    }
}

use QuestionCategory::*;

pub static QUESTIONS: &[Question] = &[
    q("identity_name", Identity, "What's your full name, and what do people usually call you?", None),
    q("identity_hometown", Identity, "Where did you grow up, and where do you live now?", Some("What do you miss most about where you grew up?")),
    q("identity_work", Identity, "What do you do, or what did you spend most of your working life doing?", None),
    q("personality_describe", Personality, "How would your closest friend describe you in three words?", Some("Do you agree with them?")),
    q("personality_humor", Personality, "What makes you laugh? Do you have a favourite joke or saying?", None),
    q("personality_stress", Personality, "How do you usually react when things go wrong?", None),
    q("relationships_family", Relationships, "Tell me about the people in your family.", Some("Who are you closest to?")),
    q("relationships_friends", Relationships, "Who are your oldest friends, and how did you meet?", None),
    q("life_story_childhood", LifeStory, "What's a favourite memory from your childhood?", None),
    q("life_story_turning_point", LifeStory, "What moment changed the direction of your life?", None),
    q("life_story_proud", LifeStory, "What are you most proud of?", None),
    q("values_beliefs", Values, "What do you believe in most strongly?", None),
    q("values_advice", Values, "What advice would you give your younger self?", None),
    q("preferences_food", Preferences, "What are your favourite foods and drinks?", None),
    q("preferences_pastimes", Preferences, "How do you like to spend a free afternoon?", Some("Any hobbies you've kept up for years?")),
    q("preferences_music", Preferences, "What music, books or films mean the most to you?", None),
];

pub fn find_question(id: &str) -> Option<&'static Question> {
    QUESTIONS.iter().find(|q| q.id == id)
}

/// Question ids recorded under `profile_data._onboarding.answered`
pub fn answered_ids(profile_data: &Value) -> Vec<String> {
    profile_data
        .pointer("/_onboarding/answered")
        .and_then(Value::as_array)
        .map(|ids| {
            ids.iter()
                .filter_map(Value::as_str)
                .filter(|id| find_question(id).is_some())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Progress through the catalog
#[derive(Debug, Clone, Serialize)]
pub struct OnboardingProgress {
    pub answered: Vec<String>,
    pub total: usize,
    pub complete: bool,
    pub next_question: Option<&'static str>,
}

pub fn progress(profile_data: &Value) -> OnboardingProgress {
    let answered = answered_ids(profile_data);
    let next_question = QUESTIONS
        .iter()
        .find(|q| !answered.iter().any(|id| id == q.id))
        .map(|q| q.id);

    OnboardingProgress {
        complete: next_question.is_none(),
        total: QUESTIONS.len(),
        next_question,
        answered,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    #[test]
    fn question_ids_are_unique_and_prefixed_by_category() {
        let mut seen = HashSet::new();
        for question in QUESTIONS {
            assert!(seen.insert(question.id), "duplicate id {}", question.id);
            assert!(question.id.starts_with(question.category.as_str()));
        }
    }

    #[test]
    fn progress_skips_unknown_ids_and_finds_next() {
        let data = json!({"_onboarding": {"answered": ["identity_name", "bogus"]}});
        let p = progress(&data);
        assert_eq!(p.answered, vec!["identity_name".to_string()]);
        assert_eq!(p.next_question, Some("identity_hometown"));
        assert!(!p.complete);
    }

    #[test]
    fn progress_complete_when_all_answered() {
        let ids: Vec<&str> = QUESTIONS.iter().map(|q| q.id).collect();
        let p = progress(&json!({"_onboarding": {"answered": ids}}));
        assert!(p.complete);
        assert_eq!(p.next_question, None);
        assert_eq!(p.total, QUESTIONS.len());
    }

    #[test]
    fn empty_profile_has_no_progress() {
        let p = progress(&json!({}));
        assert!(p.answered.is_empty());
        assert_eq!(p.next_question, Some("identity_name"));
    }
}
