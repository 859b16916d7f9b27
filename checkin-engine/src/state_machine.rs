//! Session lifecycle as an explicit transition table.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::model::{CheckInSession, SessionStatus};

/// Something that happened to a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEvent {
    /// An answer to a question other than the last one.
    AnswerRecorded,
    FinalAnswerRecorded,
    InactivityTimeout,
    ConversationLimitReached,
}

impl SessionEvent {
    pub const ALL: [SessionEvent; 4] = [
        SessionEvent::AnswerRecorded,
        SessionEvent::FinalAnswerRecorded,
        SessionEvent::InactivityTimeout,
        SessionEvent::ConversationLimitReached,
    ];
}

impl fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AnswerRecorded => "answer_recorded",
            Self::FinalAnswerRecorded => "final_answer_recorded",
            Self::InactivityTimeout => "inactivity_timeout",
            Self::ConversationLimitReached => "conversation_limit_reached",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("No transition from {from} on {event}")]
pub struct InvalidTransition {
    pub from: SessionStatus,
    pub event: SessionEvent,
}

/// The table. Terminal states have no outgoing edges.
pub fn next_status(
    from: SessionStatus,
    event: SessionEvent,
) -> Result<SessionStatus, InvalidTransition> {
    use SessionEvent::*;
    use SessionStatus::*;

    match (from, event) {
        (Active, AnswerRecorded) => Ok(Active),
        (Active, FinalAnswerRecorded) => Ok(Completed),
        (Active, InactivityTimeout) => Ok(TimedOut),
        (Active, ConversationLimitReached) => Ok(Expired),
        (Completed | Expired | TimedOut, _) => Err(InvalidTransition { from, event }),
    }
}

/// Apply `event` to a copy of `session` at time `now`.
///
/// The returned session keeps the caller's version; the store bumps it on a
/// successful compare-and-swap.
pub fn apply(
    session: &CheckInSession,
    event: SessionEvent,
    now: DateTime<Utc>,
) -> Result<CheckInSession, InvalidTransition> {
    let status = next_status(session.status, event)?;
    let mut next = session.clone();
    next.status = status;

    match event {
        SessionEvent::AnswerRecorded => {
            next.current_question_index += 1;
            next.last_activity_at = now;
        }
        SessionEvent::FinalAnswerRecorded => {
            next.current_question_index += 1;
            next.last_activity_at = now;
            next.completed_at = Some(now);
        }
        SessionEvent::InactivityTimeout | SessionEvent::ConversationLimitReached => {
            next.expired_at = Some(now);
        }
    }

    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use uuid::Uuid;

    #[test]
    fn exhaustive_transition_table() {
        for from in SessionStatus::ALL {
            for event in SessionEvent::ALL {
                let expected = match (from, event) {
                    (SessionStatus::Active, SessionEvent::AnswerRecorded) => {
                        Some(SessionStatus::Active)
                    }
                    (SessionStatus::Active, SessionEvent::FinalAnswerRecorded) => {
                        Some(SessionStatus::Completed)
                    }
                    (SessionStatus::Active, SessionEvent::InactivityTimeout) => {
                        Some(SessionStatus::TimedOut)
                    }
                    (SessionStatus::Active, SessionEvent::ConversationLimitReached) => {
                        Some(SessionStatus::Expired)
                    }
                    _ => None,
                };
                assert_eq!(next_status(from, event).ok(), expected, "{from} on {event}");
            }
        }
    }

    #[test]
    fn answer_advances_index_and_activity() {
        let start = Utc::now();
        let session = CheckInSession::new(Uuid::new_v4(), start);
        let later = start + chrono::Duration::minutes(2);

        let next = apply(&session, SessionEvent::AnswerRecorded, later).unwrap();
        assert_eq!(next.current_question_index, 1);
        assert_eq!(next.last_activity_at, later);
        assert_eq!(next.version, session.version);
    }

    #[test]
    fn final_answer_stamps_completion() {
        let session = CheckInSession::new(Uuid::new_v4(), Utc::now());
        let now = Utc::now();
        let done = apply(&session, SessionEvent::FinalAnswerRecorded, now).unwrap();
        assert_eq!(done.status, SessionStatus::Completed);
        assert_eq!(done.completed_at, Some(now));
        assert!(done.is_consistent());
    }

    #[test]
    fn timeout_stamps_expiry_without_touching_index() {
        let session = CheckInSession::new(Uuid::new_v4(), Utc::now());
        let now = Utc::now();
        let timed_out = apply(&session, SessionEvent::InactivityTimeout, now).unwrap();
        assert_eq!(timed_out.status, SessionStatus::TimedOut);
        assert_eq!(timed_out.expired_at, Some(now));
        assert_eq!(timed_out.current_question_index, 0);
        assert!(timed_out.is_consistent());
    }

    fn any_event() -> impl Strategy<Value = SessionEvent> {
        prop::sample::select(SessionEvent::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn at_most_one_terminal_transition(events in prop::collection::vec(any_event(), 0..40)) {
            let mut session = CheckInSession::new(Uuid::new_v4(), Utc::now());
            let mut terminal_transitions = 0;

            for event in events {
                let before = session.clone();
                match apply(&session, event, Utc::now()) {
                    Ok(next) => {
                        if next.status.is_terminal() {
                            terminal_transitions += 1;
                        }
                        prop_assert!(next.current_question_index >= before.current_question_index);
                        session = next;
                    }
                    Err(_) => {
                        prop_assert!(before.status.is_terminal());
                    }
                }
                prop_assert!(session.is_consistent());
            }

            prop_assert!(terminal_transitions <= 1);
        }
    }
}
