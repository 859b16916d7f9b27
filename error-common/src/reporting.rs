// Error reporting utilities
// Serializable error payloads and structured error logging.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::context::ErrorContext;
use crate::types::{ClassifiedError, ErrorCode, ErrorDisposition};

/// Serializable error payload handed to the transport layer.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    pub error_id: Uuid,
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "ErrorContext::is_empty")]
    pub context: ErrorContext,
    pub occurred_at: DateTime<Utc>,
}

impl ErrorReport {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            error_id: Uuid::new_v4(),
            code,
            message: message.into(),
            context: ErrorContext::default(),
            occurred_at: Utc::now(),
        }
    }

    /// Build a report from any classified service error.
    pub fn from_error<E: ClassifiedError>(error: &E) -> Self {
        Self::new(error.error_code(), error.to_string())
    }

    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = context;
        self
    }

    pub fn code(&self) -> &'static str {
        self.code.code
    }

    pub fn disposition(&self) -> ErrorDisposition {
        self.code.disposition
    }
}

/// Log a classified error at a level matching its disposition.
pub fn log_error<E: ClassifiedError>(operation: &str, error: &E) {
    let code = error.error_code();
    match code.disposition {
        ErrorDisposition::Internal => tracing::error!(
            operation,
            error_code = code.code,
            error_kind = error.kind(),
            error = %error,
            "Check-in operation failed"
        ),
        ErrorDisposition::RetryLater | ErrorDisposition::Conflict => tracing::warn!(
            operation,
            error_code = code.code,
            error_kind = error.kind(),
            error = %error,
            "Check-in operation failed, retryable"
        ),
        ErrorDisposition::Informational => tracing::info!(
            operation,
            error_code = code.code,
            error_kind = error.kind(),
            error = %error,
            "Check-in operation degraded"
        ),
        _ => tracing::debug!(
            operation,
            error_code = code.code,
            error_kind = error.kind(),
            error = %error,
            "Check-in operation rejected"
        ),
    }
}
