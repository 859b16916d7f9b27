//! Common error handling utilities for the check-in services
//!
//! Every service error in the workspace maps onto a stable [`ErrorCode`] so the
//! transport layer can render each failure as a distinct, stable response
//! without knowing the service's internal error enum.
//!
//! # Key Features
//!
//! - **Stable Codes**: string codes that never change meaning once published
//! - **Dispositions**: what a client should do next (retry, start over, fix a bug)
//! - **Context Preservation**: session/user correlation without leaking patient data
//! - **Reports**: serializable error payloads with correlation ids
//!
//! # Example
//!
//! ```rust
//! use error_common::{codes, ErrorCode, ErrorDisposition, ErrorReport, ErrorContext};
//!
//! let code = ErrorCode::new(codes::session::TIMED_OUT, ErrorDisposition::StartNewSession);
//! let report = ErrorReport::new(code, "session timed out after 30 minutes of inactivity")
//!     .with_context(ErrorContext::new().with_session_id("3f1c"));
//!
//! assert!(!report.disposition().is_retryable());
//! assert_eq!(report.code(), "CHECKIN_1004");
//! ```

pub mod codes;
pub mod context;
pub mod reporting;
pub mod types;

pub use context::*;
pub use reporting::*;
pub use types::*;
