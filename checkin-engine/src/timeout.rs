use chrono::{DateTime, Duration, Utc};

use crate::config::CheckInConfig;
use crate::model::{CheckInSession, SessionStatus};
use crate::state_machine::SessionEvent;

/// Which limit a session ran into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutVerdict {
    /// No activity for the inactivity window.
    Inactive,
    /// Older than the total conversation limit.
    LimitReached,
}

impl TimeoutVerdict {
    pub fn event(&self) -> SessionEvent {
        match self {
            Self::Inactive => SessionEvent::InactivityTimeout,
            Self::LimitReached => SessionEvent::ConversationLimitReached,
        }
    }

    pub fn status(&self) -> SessionStatus {
        match self {
            Self::Inactive => SessionStatus::TimedOut,
            Self::LimitReached => SessionStatus::Expired,
        }
    }
}

/// Inactivity and total-duration limits for active sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutPolicy {
    inactivity: Duration,
    max_duration: Duration,
}

impl TimeoutPolicy {
    pub fn new(inactivity: Duration, max_duration: Duration) -> Self {
        Self {
            inactivity,
            max_duration,
        }
    }

    pub fn from_config(config: &CheckInConfig) -> Self {
        Self::new(config.inactivity_timeout(), config.max_session_duration())
    }

    pub fn inactivity_deadline(&self, session: &CheckInSession) -> DateTime<Utc> {
        session.last_activity_at + self.inactivity
    }

    pub fn limit_deadline(&self, session: &CheckInSession) -> DateTime<Utc> {
        session.started_at + self.max_duration
    }

    /// The limit `session` has crossed at `now`, if any.
    ///
    /// A deadline counts as crossed once `now` reaches it. When both are
    /// crossed the earlier deadline wins, and an exact tie goes to the total
    /// limit. Terminal sessions never get a verdict.
    pub fn evaluate(&self, session: &CheckInSession, now: DateTime<Utc>) -> Option<TimeoutVerdict> {
        if session.status.is_terminal() {
            return None;
        }

        let inactivity = self.inactivity_deadline(session);
        let limit = self.limit_deadline(session);

        match (now >= inactivity, now >= limit) {
            (false, false) => None,
            (true, false) => Some(TimeoutVerdict::Inactive),
            (false, true) => Some(TimeoutVerdict::LimitReached),
            (true, true) if inactivity < limit => Some(TimeoutVerdict::Inactive),
            (true, true) => Some(TimeoutVerdict::LimitReached),
        }
    }

    /// Status a reader should see at `now`, without persisting anything.
    pub fn effective_status(&self, session: &CheckInSession, now: DateTime<Utc>) -> SessionStatus {
        self.evaluate(session, now)
            .map_or(session.status, |verdict| verdict.status())
    }
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self::from_config(&CheckInConfig::default())
    }
}
