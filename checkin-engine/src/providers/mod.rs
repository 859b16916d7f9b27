//! Collaborator capabilities consumed by the engine.
//!
//! Vendor clients live outside this crate; the engine only sees these traits.

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::VoiceSettings;

/// Failure reported by a speech or completion vendor
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollaboratorError {
    #[error("Request timed out")]
    Timeout,

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// The vendor understood the request and refused it; retrying won't help.
    #[error("Request rejected: {0}")]
    Rejected(String),
}

impl CollaboratorError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Rejected(_))
    }
}

/// Raw audio chunks as the client sends them
pub type AudioStream = BoxStream<'static, Vec<u8>>;

/// Incremental output of a transcription
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptEvent {
    Partial(String),
    Final(String),
}

pub type TranscriptStream = BoxStream<'static, Result<TranscriptEvent, CollaboratorError>>;

/// Text to speech
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, voice: &VoiceSettings)
        -> Result<Vec<u8>, CollaboratorError>;
}

/// Streaming speech to text
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechTranscriber: Send + Sync {
    /// Start transcribing `audio`. The returned stream yields partials and
    /// ends after a `Final`, or early once `cancel` fires.
    async fn transcribe(
        &self,
        audio: AudioStream,
        cancel: CancellationToken,
    ) -> Result<TranscriptStream, CollaboratorError>;
}

/// Prompt to text
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatCompleter: Send + Sync {
    async fn complete(&self, prompt: &str, schema_hint: &str) -> Result<String, CollaboratorError>;
}
