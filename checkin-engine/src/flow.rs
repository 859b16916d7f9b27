//! Linear question flow.
//!
//! A flow is an immutable, ordered list of questions. It never tracks
//! progress itself: the engine owns the cursor and asks the flow what lives
//! at a given index.

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::error::{CheckInError, Result};

/// The kind of answer a question expects
///
/// Only used for logging plausibility; answers are never rejected on content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerType {
    FreeText,
    /// A list of items, e.g. symptoms or activities.
    List,
    /// A number from 0 to 10.
    Scale,
    /// A rating word such as "good" or "poor".
    Rating,
    YesNo,
}

impl AnswerType {
    const YES_NO_WORDS: &'static [&'static str] = &[
        "yes", "no", "yeah", "yep", "nope", "not", "did", "didn't", "have", "haven't",
        "took", "forgot", "missed", "skipped", "all", "some", "none",
    ];

    /// Soft check: does `answer` look like what this question expects?
    pub fn is_plausible(&self, answer: &str) -> bool {
        let lower = answer.to_lowercase();
        match self {
            Self::FreeText | Self::List | Self::Rating => !lower.trim().is_empty(),
            Self::Scale => {
                lower.chars().any(|c| c.is_ascii_digit())
                    || [
                        "zero", "one", "two", "three", "four", "five", "six", "seven",
                        "eight", "nine", "ten", "none", "no pain",
                    ]
                    .iter()
                    .any(|w| lower.contains(w))
            }
            Self::YesNo => lower
                .split(|c: char| !c.is_alphanumeric() && c != '\'')
                .any(|word| Self::YES_NO_WORDS.contains(&word)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionDefinition {
    pub index: usize,
    pub prompt_text: String,
    pub expected_answer_type: AnswerType,
}

impl QuestionDefinition {
    pub fn new(index: usize, prompt_text: impl Into<String>, expected: AnswerType) -> Self {
        Self {
            index,
            prompt_text: prompt_text.into(),
            expected_answer_type: expected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionFlow {
    questions: Vec<QuestionDefinition>,
}

impl QuestionFlow {
    /// Build a flow, rejecting empty sets, blank prompts, and indices that are
    /// not exactly `0..len` in order.
    pub fn new(questions: Vec<QuestionDefinition>) -> std::result::Result<Self, ConfigError> {
        if questions.is_empty() {
            return Err(ConfigError::Invalid(
                "question flow must contain at least one question".to_string(),
            ));
        }
        for (position, question) in questions.iter().enumerate() {
            if question.index != position {
                return Err(ConfigError::Invalid(format!(
                    "question at position {position} has index {}",
                    question.index
                )));
            }
            if question.prompt_text.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "question {position} has an empty prompt"
                )));
            }
        }
        Ok(Self { questions })
    }

    /// The eight-question daily check-in.
    pub fn reference() -> Self {
        Self {
            questions: reference_questions(),
        }
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// The question at `index`, or `OutOfRange` past the end.
    pub fn next_question(&self, index: usize) -> Result<&QuestionDefinition> {
        self.questions
            .get(index)
            .ok_or_else(|| CheckInError::out_of_range(index, index, self.questions.len()))
    }

    pub fn is_complete(&self, index: usize) -> bool {
        index >= self.questions.len()
    }

    pub fn questions(&self) -> &[QuestionDefinition] {
        &self.questions
    }
}

impl Default for QuestionFlow {
    fn default() -> Self {
        Self::reference()
    }
}

pub fn reference_questions() -> Vec<QuestionDefinition> {
    vec![
        QuestionDefinition::new(
            0,
            "Hello! Let's start your daily check-in. How are you feeling today, and how would you describe your mood?",
            AnswerType::FreeText,
        ),
        QuestionDefinition::new(
            1,
            "Are you experiencing any symptoms today, such as headache, cough, nausea, or dizziness?",
            AnswerType::List,
        ),
        QuestionDefinition::new(
            2,
            "On a scale from zero to ten, how would you rate any pain you are feeling right now?",
            AnswerType::Scale,
        ),
        QuestionDefinition::new(
            3,
            "How would you describe your energy level today?",
            AnswerType::Rating,
        ),
        QuestionDefinition::new(
            4,
            "How well did you sleep last night?",
            AnswerType::Rating,
        ),
        QuestionDefinition::new(
            5,
            "Have you taken your medications as prescribed today?",
            AnswerType::YesNo,
        ),
        QuestionDefinition::new(
            6,
            "Did you do any physical activity or exercise today?",
            AnswerType::List,
        ),
        QuestionDefinition::new(
            7,
            "What did you eat for breakfast, lunch, and dinner? Is there anything else you would like to share?",
            AnswerType::FreeText,
        ),
    ]
}
