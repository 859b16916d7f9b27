use serde::Serialize;
use std::fmt;

use crate::model::{ConversationMessage, MessageRole};

/// One question and the answer it got, if any
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptTurn {
    pub question_index: usize,
    pub question: String,
    pub answer: Option<String>,
}

/// The ordered conversation of a session, paired into turns
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Transcript {
    turns: Vec<TranscriptTurn>,
}

impl Transcript {
    /// Rebuild the transcript from persisted messages.
    ///
    /// Messages are ordered by `created_at`; equal timestamps keep the order
    /// they were appended in.
    pub fn from_messages(messages: &[ConversationMessage]) -> Self {
        let mut ordered: Vec<&ConversationMessage> = messages.iter().collect();
        ordered.sort_by_key(|message| message.created_at);

        let mut turns: Vec<TranscriptTurn> = Vec::new();
        for message in ordered {
            match message.role {
                MessageRole::Assistant => turns.push(TranscriptTurn {
                    question_index: message.question_index,
                    question: message.content.clone(),
                    answer: None,
                }),
                MessageRole::User => {
                    let open_turn = turns
                        .iter_mut()
                        .rev()
                        .find(|turn| turn.question_index == message.question_index);
                    match open_turn {
                        Some(turn) if turn.answer.is_none() => {
                            turn.answer = Some(message.content.clone());
                        }
                        // An answer with no question on record still belongs in the transcript.
                        _ => turns.push(TranscriptTurn {
                            question_index: message.question_index,
                            question: String::new(),
                            answer: Some(message.content.clone()),
                        }),
                    }
                }
            }
        }

        Self { turns }
    }

    pub fn turns(&self) -> &[TranscriptTurn] {
        &self.turns
    }

    pub fn answered_count(&self) -> usize {
        self.turns.iter().filter(|turn| turn.answer.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// `Q1: …` / `A1: …` lines, numbered from one.
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Transcript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (position, turn) in self.turns.iter().enumerate() {
            if position > 0 {
                writeln!(f)?;
            }
            let number = turn.question_index + 1;
            if !turn.question.is_empty() {
                write!(f, "Q{number}: {}", turn.question)?;
                if turn.answer.is_some() {
                    writeln!(f)?;
                }
            }
            if let Some(answer) = &turn.answer {
                write!(f, "A{number}: {answer}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    #[test]
    fn pairs_questions_with_answers() {
        let session_id = Uuid::new_v4();
        let now = Utc::now();
        let messages = vec![
            ConversationMessage::assistant(session_id, 0, "How are you?", now),
            ConversationMessage::user(session_id, 0, "Pretty good", now),
            ConversationMessage::assistant(session_id, 1, "Any symptoms?", now),
        ];

        let transcript = Transcript::from_messages(&messages);
        assert_eq!(transcript.answered_count(), 1);
        assert_eq!(
            transcript.render(),
            "Q1: How are you?\nA1: Pretty good\nQ2: Any symptoms?"
        );
    }

    #[test]
    fn orders_by_creation_time_then_append_order() {
        let session_id = Uuid::new_v4();
        let now = Utc::now();
        let messages = vec![
            ConversationMessage::user(session_id, 0, "fine", now + Duration::seconds(5)),
            ConversationMessage::assistant(session_id, 0, "How are you?", now),
        ];

        let transcript = Transcript::from_messages(&messages);
        assert_eq!(transcript.render(), "Q1: How are you?\nA1: fine");
    }

    #[test]
    fn same_messages_give_same_transcript() {
        let session_id = Uuid::new_v4();
        let now = Utc::now();
        let messages: Vec<_> = (0..8)
            .flat_map(|i| {
                [
                    ConversationMessage::assistant(session_id, i, format!("question {i}"), now),
                    ConversationMessage::user(session_id, i, format!("answer {i}"), now),
                ]
            })
            .collect();

        let first = Transcript::from_messages(&messages);
        let second = Transcript::from_messages(&messages.clone());
        assert_eq!(first, second);
        assert_eq!(first.answered_count(), 8);
        assert!(first.render().contains("Q8: question 7\nA8: answer 7"));
    }

    #[test]
    fn empty_transcript_renders_empty() {
        assert_eq!(Transcript::from_messages(&[]).render(), "");
    }
}
