//! Transcript to structured health data.
//!
//! The extractor asks a chat completer for JSON, normalizes whatever comes
//! back, and falls back to a transcript-only record when the completer fails
//! or answers with something unusable. It never returns an error.

pub mod parser;
pub mod prompt;
pub mod types;

pub use parser::{extract_json_block, parse_response, sanitize_output, ParsedExtraction};
pub use types::{EnergyLevel, ExtractedData, Meals, MedicationAdherence, Mood, SleepQuality};

use std::sync::Arc;
use tracing::{info, warn};

use crate::model::ExtractionStatus;
use crate::providers::ChatCompleter;
use crate::retry::RetryPolicy;

/// Result of one extraction run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionOutcome {
    pub data: ExtractedData,
    pub status: ExtractionStatus,
}

impl ExtractionOutcome {
    fn degraded(raw_transcript: &str, reason: impl Into<String>) -> Self {
        Self {
            data: ExtractedData::degraded(raw_transcript),
            status: ExtractionStatus::Degraded {
                reason: reason.into(),
            },
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self.status, ExtractionStatus::Degraded { .. })
    }
}

pub struct DataExtractor {
    completer: Arc<dyn ChatCompleter>,
    retry: RetryPolicy,
}

impl DataExtractor {
    pub fn new(completer: Arc<dyn ChatCompleter>) -> Self {
        Self {
            completer,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Extract structured data from a rendered transcript.
    pub async fn extract(&self, transcript: &str) -> ExtractionOutcome {
        let request = prompt::build_prompt(transcript);
        let completer = &self.completer;
        let request = &request;

        let response = match self
            .retry
            .run("chat_completion", move || {
                completer.complete(request, prompt::SCHEMA_HINT)
            })
            .await
        {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "Extraction completer failed, keeping raw transcript only");
                return ExtractionOutcome::degraded(transcript, format!("completer failed: {err}"));
            }
        };

        match parse_response(&response, transcript) {
            ParsedExtraction::Parsed(data) => {
                info!(
                    symptoms = data.symptoms.len(),
                    has_pain_level = data.pain_level.is_some(),
                    "Extraction parsed"
                );
                ExtractionOutcome {
                    data,
                    status: ExtractionStatus::Parsed,
                }
            }
            ParsedExtraction::Malformed(raw) => {
                warn!(
                    response_chars = raw.chars().count(),
                    "Extraction response was not usable JSON, keeping raw transcript only"
                );
                ExtractionOutcome::degraded(transcript, "malformed completer response")
            }
        }
    }
}
