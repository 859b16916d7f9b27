use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::CheckInError;
use crate::extraction::ExtractedData;

/// Lifecycle status of a check-in session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Completed,
    Expired,
    TimedOut,
}

impl SessionStatus {
    pub const ALL: [SessionStatus; 4] = [
        SessionStatus::Active,
        SessionStatus::Completed,
        SessionStatus::Expired,
        SessionStatus::TimedOut,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Expired => "expired",
            Self::TimedOut => "timed_out",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Active)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One check-in conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckInSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: SessionStatus,
    pub current_question_index: usize,
    pub started_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub expired_at: Option<DateTime<Utc>>,
    /// Bumped by the store on every successful compare-and-swap.
    pub version: u64,
}

impl CheckInSession {
    pub fn new(user_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            status: SessionStatus::Active,
            current_question_index: 0,
            started_at: now,
            last_activity_at: now,
            completed_at: None,
            expired_at: None,
            version: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// `Active` exactly when neither terminal timestamp is set.
    pub fn is_consistent(&self) -> bool {
        let no_terminal_stamp = self.completed_at.is_none() && self.expired_at.is_none();
        self.is_active() == no_terminal_stamp
    }
}

/// Who produced a conversation message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    Assistant,
    User,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Assistant => "assistant",
            Self::User => "user",
        }
    }
}

/// A single question or answer within a session, append-only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub id: Uuid,
    pub session_id: Uuid,
    pub role: MessageRole,
    /// The turn this message belongs to.
    pub question_index: usize,
    pub content: String,
    pub audio_file_path: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ConversationMessage {
    pub fn assistant(
        session_id: Uuid,
        question_index: usize,
        content: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self::new(session_id, MessageRole::Assistant, question_index, content, now)
    }

    pub fn user(
        session_id: Uuid,
        question_index: usize,
        content: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self::new(session_id, MessageRole::User, question_index, content, now)
    }

    fn new(
        session_id: Uuid,
        role: MessageRole,
        question_index: usize,
        content: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id,
            role,
            question_index,
            content: content.into(),
            audio_file_path: None,
            created_at: now,
        }
    }
}

/// How the structured fields of a health record were obtained
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExtractionStatus {
    Parsed,
    /// Only the raw transcript is populated.
    Degraded { reason: String },
}

/// The finalized output of a completed check-in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthRecord {
    pub id: Uuid,
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub data: ExtractedData,
    pub extraction: ExtractionStatus,
    pub created_at: DateTime<Utc>,
}

impl HealthRecord {
    pub fn extraction_failed(&self) -> bool {
        matches!(self.extraction, ExtractionStatus::Degraded { .. })
    }

    /// The informational notice a transport layer renders for a
    /// transcript-only record; `None` when the fields were parsed.
    pub fn degradation(&self) -> Option<CheckInError> {
        match &self.extraction {
            ExtractionStatus::Parsed => None,
            ExtractionStatus::Degraded { reason } => Some(CheckInError::ExtractionDegraded {
                session_id: self.session_id,
                reason: reason.clone(),
            }),
        }
    }
}

/// Synthesized audio for one question
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionPrompt {
    pub question_index: usize,
    pub text: String,
    pub audio: Vec<u8>,
}

/// Returned by `start_session`
#[derive(Debug, Clone)]
pub struct StartedSession {
    pub session_id: Uuid,
    pub question: QuestionPrompt,
}

/// Returned by `submit_answer`
#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    NextQuestion(QuestionPrompt),
    Completed(HealthRecord),
}

/// Lock-free, possibly slightly stale view of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub status: SessionStatus,
    pub current_question_index: usize,
    pub total_questions: usize,
    pub started_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

/// Final result of one streamed answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalTranscript {
    pub session_id: Uuid,
    /// The question the audio answered; pass it back to `submit_answer`.
    pub question_index: usize,
    pub text: String,
}
