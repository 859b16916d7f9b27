use serde::{Deserialize, Serialize};
use std::fmt;

/// What a caller should do after receiving an error.
///
/// The transport layer renders each disposition differently so clients can
/// tell "retry now" from "start a new session" from "client bug".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorDisposition {
    /// A downstream dependency failed; the same request may succeed later.
    RetryLater,
    /// The session can no longer progress; the client must start over.
    StartNewSession,
    /// The request itself is wrong (duplicate, out of order, empty).
    ClientBug,
    /// Another writer won a race; reload and decide again.
    Conflict,
    /// Not a failure of the request; reported for visibility only.
    Informational,
    /// Unexpected server-side failure.
    Internal,
}

impl ErrorDisposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RetryLater => "retry_later",
            Self::StartNewSession => "start_new_session",
            Self::ClientBug => "client_bug",
            Self::Conflict => "conflict",
            Self::Informational => "informational",
            Self::Internal => "internal",
        }
    }

    /// Whether repeating the identical request can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RetryLater | Self::Conflict)
    }
}

impl fmt::Display for ErrorDisposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stable error code paired with its disposition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ErrorCode {
    pub code: &'static str,
    pub disposition: ErrorDisposition,
}

impl ErrorCode {
    pub const fn new(code: &'static str, disposition: ErrorDisposition) -> Self {
        Self { code, disposition }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.code, self.disposition)
    }
}

/// Implemented by service error enums so they can be reported uniformly.
pub trait ClassifiedError: std::error::Error {
    /// Stable code and disposition for this error value.
    fn error_code(&self) -> ErrorCode;

    /// Short machine-friendly kind name, e.g. `"session_timed_out"`.
    fn kind(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_retry_and_conflict_are_retryable() {
        assert!(ErrorDisposition::RetryLater.is_retryable());
        assert!(ErrorDisposition::Conflict.is_retryable());
        assert!(!ErrorDisposition::StartNewSession.is_retryable());
        assert!(!ErrorDisposition::ClientBug.is_retryable());
        assert!(!ErrorDisposition::Informational.is_retryable());
        assert!(!ErrorDisposition::Internal.is_retryable());
    }

    #[test]
    fn disposition_serializes_as_snake_case() {
        let json = serde_json::to_string(&ErrorDisposition::StartNewSession).unwrap();
        assert_eq!(json, "\"start_new_session\"");
    }

    #[test]
    fn code_display_includes_disposition() {
        let code = ErrorCode::new(crate::codes::input::OUT_OF_RANGE, ErrorDisposition::ClientBug);
        assert_eq!(code.to_string(), "CHECKIN_2002 (client_bug)");
    }
}
