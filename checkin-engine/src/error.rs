use error_common::{codes, ClassifiedError, ErrorCode, ErrorDisposition};
use thiserror::Error;
use uuid::Uuid;

use crate::config::ConfigError;
use crate::model::SessionStatus;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum CheckInError {
    #[error("Session not found: {0}")]
    SessionNotFound(Uuid),

    #[error("Session {session_id} is not active (status: {status})")]
    SessionNotActive {
        session_id: Uuid,
        status: SessionStatus,
    },

    #[error("Question {question_index} of session {session_id} was already answered")]
    SessionAlreadyAnswered {
        session_id: Uuid,
        question_index: usize,
    },

    #[error("Session {0} exceeded the total conversation time limit")]
    SessionExpired(Uuid),

    #[error("Session {0} timed out after inactivity")]
    SessionTimedOut(Uuid),

    #[error("Question index {index} is out of range (current: {current}, total: {total})")]
    OutOfRange {
        index: usize,
        current: usize,
        total: usize,
    },

    #[error("Session {0} was modified concurrently")]
    ConcurrentModification(Uuid),

    /// Another instance completed the session and is still writing its record.
    #[error("Session {0} is still being finalized")]
    FinalizationInProgress(Uuid),

    #[error("Downstream service unavailable: {reason}")]
    DownstreamUnavailable {
        /// Set when the session itself was created or advanced before the failure.
        session_id: Option<Uuid>,
        reason: String,
    },

    #[error("Session {session_id} has {answered} of {total} questions answered")]
    SessionIncomplete {
        session_id: Uuid,
        answered: usize,
        total: usize,
    },

    #[error("Empty answer for question {question_index} of session {session_id}")]
    EmptyAnswer {
        session_id: Uuid,
        question_index: usize,
    },

    #[error("Transcription cancelled for session {0}")]
    TranscriptionCancelled(Uuid),

    /// Not a failure: the health record was stored with the transcript only.
    #[error("Health record for session {session_id} stored without structured fields: {reason}")]
    ExtractionDegraded { session_id: Uuid, reason: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, CheckInError>;

impl CheckInError {
    /// The error a caller sees for a session that already reached `status`.
    pub fn for_terminal_status(session_id: Uuid, status: SessionStatus) -> Self {
        match status {
            SessionStatus::Expired => Self::SessionExpired(session_id),
            SessionStatus::TimedOut => Self::SessionTimedOut(session_id),
            SessionStatus::Active | SessionStatus::Completed => {
                Self::SessionNotActive { session_id, status }
            }
        }
    }

    pub(crate) fn out_of_range(index: usize, current: usize, total: usize) -> Self {
        Self::OutOfRange {
            index,
            current,
            total,
        }
    }
}

impl From<StoreError> for CheckInError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => Self::SessionNotFound(id),
            StoreError::ConcurrentModification(id) => Self::ConcurrentModification(id),
            StoreError::Backend(msg) => Self::Storage(msg),
        }
    }
}

impl ClassifiedError for CheckInError {
    fn error_code(&self) -> ErrorCode {
        use ErrorDisposition::{
            ClientBug, Conflict, Informational, Internal, RetryLater, StartNewSession,
        };

        match self {
            Self::SessionNotFound(_) => ErrorCode::new(codes::session::NOT_FOUND, StartNewSession),
            Self::SessionNotActive { .. } => {
                ErrorCode::new(codes::session::NOT_ACTIVE, StartNewSession)
            }
            Self::SessionExpired(_) => ErrorCode::new(codes::session::EXPIRED, StartNewSession),
            Self::SessionTimedOut(_) => ErrorCode::new(codes::session::TIMED_OUT, StartNewSession),
            Self::ConcurrentModification(_) => {
                ErrorCode::new(codes::session::CONCURRENT_MODIFICATION, Conflict)
            }
            Self::FinalizationInProgress(_) => ErrorCode::new(codes::session::FINALIZING, Conflict),
            Self::SessionAlreadyAnswered { .. } => {
                ErrorCode::new(codes::input::ALREADY_ANSWERED, ClientBug)
            }
            Self::OutOfRange { .. } => ErrorCode::new(codes::input::OUT_OF_RANGE, ClientBug),
            Self::EmptyAnswer { .. } => ErrorCode::new(codes::input::EMPTY_ANSWER, ClientBug),
            Self::SessionIncomplete { .. } => {
                ErrorCode::new(codes::input::SESSION_INCOMPLETE, ClientBug)
            }
            Self::DownstreamUnavailable { .. } => {
                ErrorCode::new(codes::downstream::UNAVAILABLE, RetryLater)
            }
            Self::TranscriptionCancelled(_) => {
                ErrorCode::new(codes::downstream::TRANSCRIPTION_CANCELLED, RetryLater)
            }
            Self::ExtractionDegraded { .. } => {
                ErrorCode::new(codes::downstream::EXTRACTION_DEGRADED, Informational)
            }
            Self::Storage(_) => ErrorCode::new(codes::internal::STORAGE, Internal),
            Self::Configuration(_) => ErrorCode::new(codes::internal::CONFIGURATION, Internal),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::SessionNotFound(_) => "session_not_found",
            Self::SessionNotActive { .. } => "session_not_active",
            Self::SessionAlreadyAnswered { .. } => "session_already_answered",
            Self::SessionExpired(_) => "session_expired",
            Self::SessionTimedOut(_) => "session_timed_out",
            Self::OutOfRange { .. } => "out_of_range",
            Self::ConcurrentModification(_) => "concurrent_modification",
            Self::FinalizationInProgress(_) => "finalization_in_progress",
            Self::DownstreamUnavailable { .. } => "downstream_unavailable",
            Self::SessionIncomplete { .. } => "session_incomplete",
            Self::EmptyAnswer { .. } => "empty_answer",
            Self::TranscriptionCancelled(_) => "transcription_cancelled",
            Self::ExtractionDegraded { .. } => "extraction_degraded",
            Self::Storage(_) => "storage",
            Self::Configuration(_) => "configuration",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn every_variant() -> Vec<CheckInError> {
        let id = Uuid::new_v4();
        vec![
            CheckInError::SessionNotFound(id),
            CheckInError::SessionNotActive {
                session_id: id,
                status: SessionStatus::Completed,
            },
            CheckInError::SessionAlreadyAnswered {
                session_id: id,
                question_index: 0,
            },
            CheckInError::SessionExpired(id),
            CheckInError::SessionTimedOut(id),
            CheckInError::out_of_range(9, 1, 8),
            CheckInError::ConcurrentModification(id),
            CheckInError::FinalizationInProgress(id),
            CheckInError::DownstreamUnavailable {
                session_id: Some(id),
                reason: "tts down".into(),
            },
            CheckInError::SessionIncomplete {
                session_id: id,
                answered: 3,
                total: 8,
            },
            CheckInError::EmptyAnswer {
                session_id: id,
                question_index: 2,
            },
            CheckInError::TranscriptionCancelled(id),
            CheckInError::ExtractionDegraded {
                session_id: id,
                reason: "completer offline".into(),
            },
            CheckInError::Storage("disk full".into()),
            CheckInError::Configuration(ConfigError::Invalid("bad".into())),
        ]
    }

    #[test]
    fn every_error_kind_has_a_distinct_code() {
        let errors = every_variant();
        let codes: HashSet<&str> = errors.iter().map(|e| e.error_code().code).collect();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn dispositions_separate_retry_from_restart_from_client_bug() {
        let id = Uuid::new_v4();
        let downstream = CheckInError::DownstreamUnavailable {
            session_id: None,
            reason: "x".into(),
        };
        assert_eq!(downstream.error_code().disposition, ErrorDisposition::RetryLater);
        assert_eq!(
            CheckInError::SessionTimedOut(id).error_code().disposition,
            ErrorDisposition::StartNewSession
        );
        assert_eq!(
            CheckInError::out_of_range(3, 1, 8).error_code().disposition,
            ErrorDisposition::ClientBug
        );
    }

    #[test]
    fn unfinished_finalization_is_a_retryable_conflict() {
        let code = CheckInError::FinalizationInProgress(Uuid::new_v4()).error_code();
        assert_eq!(code.code, codes::session::FINALIZING);
        assert_eq!(code.disposition, ErrorDisposition::Conflict);
        assert!(code.disposition.is_retryable());
    }

    #[test]
    fn degraded_extraction_is_informational() {
        let notice = CheckInError::ExtractionDegraded {
            session_id: Uuid::new_v4(),
            reason: "completer offline".into(),
        };
        assert_eq!(notice.error_code().code, codes::downstream::EXTRACTION_DEGRADED);
        assert_eq!(notice.error_code().disposition, ErrorDisposition::Informational);
        assert!(!notice.error_code().disposition.is_retryable());
        assert_eq!(notice.kind(), "extraction_degraded");
    }

    #[test]
    fn terminal_status_maps_to_matching_error() {
        let id = Uuid::new_v4();
        assert!(matches!(
            CheckInError::for_terminal_status(id, SessionStatus::Expired),
            CheckInError::SessionExpired(_)
        ));
        assert!(matches!(
            CheckInError::for_terminal_status(id, SessionStatus::TimedOut),
            CheckInError::SessionTimedOut(_)
        ));
        assert!(matches!(
            CheckInError::for_terminal_status(id, SessionStatus::Completed),
            CheckInError::SessionNotActive { .. }
        ));
    }

    #[test]
    fn store_errors_convert() {
        let id = Uuid::new_v4();
        assert!(matches!(
            CheckInError::from(StoreError::NotFound(id)),
            CheckInError::SessionNotFound(_)
        ));
        assert!(matches!(
            CheckInError::from(StoreError::ConcurrentModification(id)),
            CheckInError::ConcurrentModification(_)
        ));
    }
}
