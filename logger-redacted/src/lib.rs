//! Logging with automatic PII redaction for the check-in services
//!
//! Health check-ins carry patient speech: answers about symptoms, medication,
//! and sleep. None of it may reach a log sink verbatim. This crate provides:
//!
//! - **Subscriber bootstrap**: `EnvFilter` plus human-readable or Bunyan JSON output
//! - **PII redaction**: emails, phone numbers, SSNs, IP addresses, record numbers, dates
//! - **Hash-based correlation**: redacted values can still be correlated by hash
//! - **Previews**: short, redacted excerpts of transcripts for debugging
//!
//! # Example
//!
//! ```rust
//! use logger_redacted::{PiiRedactor, RedactionConfig};
//!
//! let redactor = PiiRedactor::new(RedactionConfig {
//!     hash_for_correlation: false,
//!     ..Default::default()
//! });
//!
//! let preview = redactor.preview("call me on (555) 123-4567 if the rash spreads", 64);
//! assert!(preview.contains("(***) ***-****"));
//! ```

pub mod config;
pub mod redactor;

pub use config::*;
pub use redactor::*;

use thiserror::Error;
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Error, Debug)]
pub enum LoggerError {
    #[error("Invalid log filter '{directive}': {reason}")]
    InvalidFilter { directive: String, reason: String },
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over `config.log_level`. Returns `Ok(false)` when a global
/// subscriber was already installed, which makes repeated calls harmless.
pub fn init_logging(config: &LoggerConfig) -> Result<bool, LoggerError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log_level).map_err(|e| LoggerError::InvalidFilter {
            directive: config.log_level.clone(),
            reason: e.to_string(),
        })?,
    };

    let installed = if config.json_output {
        tracing_subscriber::registry()
            .with(filter)
            .with(JsonStorageLayer)
            .with(BunyanFormattingLayer::new(
                config.service_name.clone(),
                std::io::stdout,
            ))
            .try_init()
            .is_ok()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()
            .is_ok()
    };

    if installed {
        tracing::debug!(
            service = %config.service_name,
            json = config.json_output,
            redaction = config.redaction_enabled,
            "Logging initialized"
        );
    }

    Ok(installed)
}
