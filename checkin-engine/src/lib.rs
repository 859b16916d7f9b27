//! Voice health check-in engine
//!
//! Runs a spoken, multi-turn daily check-in: a fixed list of questions is
//! read to the patient, spoken answers are transcribed, and the finished
//! conversation is distilled into a structured health record.
//!
//! # Features
//!
//! - Linear question flow with a built-in eight-question check-in
//! - Explicit session state machine (`active` to `completed`, `timed_out` or `expired`)
//! - Inactivity and total-duration timeouts, checked lazily and by a background sweep
//! - Per-session locking with optimistic versioning in the store
//! - Cached, single-flight question audio
//! - Streaming transcription with partial results and cancellation
//! - AI extraction with a transcript-only fallback that never blocks completion
//!
//! Speech synthesis, speech recognition and chat completion are consumed
//! through the traits in [`providers`]; persistence goes through
//! [`store::SessionStore`].
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use checkin_engine::{CheckInConfig, CheckInEngine, InMemorySessionStore, SubmitOutcome};
//! # use std::sync::Arc;
//! # use checkin_engine::providers::{SpeechSynthesizer, SpeechTranscriber, ChatCompleter};
//!
//! # async fn example(
//! #     synthesizer: Arc<dyn SpeechSynthesizer>,
//! #     transcriber: Arc<dyn SpeechTranscriber>,
//! #     completer: Arc<dyn ChatCompleter>,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let config = CheckInConfig::from_env()?;
//! let engine = CheckInEngine::new(
//!     Arc::new(InMemorySessionStore::new()),
//!     synthesizer,
//!     transcriber,
//!     completer,
//! )
//! .with_config(&config)?;
//!
//! let started = engine.start_session(uuid::Uuid::new_v4()).await?;
//! match engine
//!     .submit_answer(started.session_id, 0, "I'm feeling pretty good today")
//!     .await?
//! {
//!     SubmitOutcome::NextQuestion(question) => println!("Next: {}", question.text),
//!     SubmitOutcome::Completed(record) => println!("Done: {:?}", record.data),
//! }
//! # Ok(())
//! # }
//! ```

pub mod audio_cache;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod extraction;
pub mod flow;
pub mod locks;
pub mod model;
pub mod providers;
pub mod retry;
pub mod state_machine;
pub mod store;
pub mod sweeper;
pub mod timeout;
pub mod transcript;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::*;
pub use engine::{CheckInEngine, SweepReport};
pub use error::*;
pub use extraction::{DataExtractor, ExtractedData, ExtractionOutcome};
pub use flow::{AnswerType, QuestionDefinition, QuestionFlow};
pub use model::*;
pub use retry::RetryPolicy;
pub use store::{InMemorySessionStore, SessionStore, StoreError};
pub use sweeper::TimeoutSweeper;
pub use timeout::{TimeoutPolicy, TimeoutVerdict};
pub use transcript::{Transcript, TranscriptTurn};
