use chrono::{DateTime, Utc};
use error_common::log_error;
use futures::StreamExt;
use logger_redacted::{LoggerConfig, PiiRedactor};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::audio_cache::AudioCache;
use crate::clock::{Clock, SystemClock};
use crate::config::{CheckInConfig, VoiceSettings};
use crate::error::{CheckInError, Result};
use crate::extraction::{DataExtractor, ExtractedData};
use crate::flow::{QuestionDefinition, QuestionFlow};
use crate::locks::SessionLocks;
use crate::model::{
    CheckInSession, ConversationMessage, ExtractionStatus, FinalTranscript, HealthRecord,
    QuestionPrompt, SessionSnapshot, SessionStatus, StartedSession, SubmitOutcome,
};
use crate::providers::{
    AudioStream, ChatCompleter, SpeechSynthesizer, SpeechTranscriber, TranscriptEvent,
};
use crate::retry::RetryPolicy;
use crate::state_machine::{self, SessionEvent};
use crate::store::{SessionStore, StoreError};
use crate::timeout::TimeoutPolicy;
use crate::transcript::Transcript;

/// Compare-and-swap attempts for writes that are safe to recompute.
const MAX_CAS_ATTEMPTS: usize = 3;

/// Counts from one pass of the timeout sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub examined: usize,
    pub timed_out: usize,
    pub expired: usize,
    pub failed: usize,
}

impl SweepReport {
    pub fn transitioned(&self) -> usize {
        self.timed_out + self.expired
    }
}

/// Orchestrates check-in sessions from the first question to the health record
pub struct CheckInEngine {
    store: Arc<dyn SessionStore>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    transcriber: Arc<dyn SpeechTranscriber>,
    completer: Arc<dyn ChatCompleter>,
    extractor: DataExtractor,
    clock: Arc<dyn Clock>,
    flow: Arc<QuestionFlow>,
    timeouts: TimeoutPolicy,
    finalization_grace: chrono::Duration,
    synthesis_retry: RetryPolicy,
    voice: VoiceSettings,
    audio_cache: AudioCache,
    locks: SessionLocks,
    redactor: PiiRedactor,
    preview_chars: usize,
}

impl CheckInEngine {
    /// Create an engine with the default configuration and the system clock
    pub fn new(
        store: Arc<dyn SessionStore>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        transcriber: Arc<dyn SpeechTranscriber>,
        completer: Arc<dyn ChatCompleter>,
    ) -> Self {
        let config = CheckInConfig::default();
        let extractor = DataExtractor::new(completer.clone())
            .with_retry_policy(Self::extraction_policy(&config));

        Self {
            store,
            synthesizer,
            transcriber,
            completer,
            extractor,
            clock: Arc::new(SystemClock),
            flow: Arc::new(QuestionFlow::reference()),
            timeouts: TimeoutPolicy::from_config(&config),
            finalization_grace: config.finalization_grace(),
            synthesis_retry: RetryPolicy::from(&config.synthesis_retry),
            voice: config.voice,
            audio_cache: AudioCache::new(),
            locks: SessionLocks::new(),
            redactor: PiiRedactor::default(),
            preview_chars: config.logging.preview_chars,
        }
    }

    /// Apply a validated configuration
    pub fn with_config(mut self, config: &CheckInConfig) -> Result<Self> {
        config.validate()?;
        self.flow = Arc::new(config.question_flow()?);
        self.timeouts = TimeoutPolicy::from_config(config);
        self.finalization_grace = config.finalization_grace();
        self.synthesis_retry = RetryPolicy::from(&config.synthesis_retry);
        self.extractor = DataExtractor::new(self.completer.clone())
            .with_retry_policy(Self::extraction_policy(config));
        self.voice = config.voice.clone();
        Ok(self.with_logging(&config.logging))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_flow(mut self, flow: QuestionFlow) -> Self {
        self.flow = Arc::new(flow);
        self
    }

    pub fn with_synthesis_retry(mut self, policy: RetryPolicy) -> Self {
        self.synthesis_retry = policy;
        self
    }

    pub fn with_extraction_retry(mut self, policy: RetryPolicy) -> Self {
        self.extractor = DataExtractor::new(self.completer.clone()).with_retry_policy(policy);
        self
    }

    /// Control how patient speech is previewed in logs
    pub fn with_logging(mut self, logging: &LoggerConfig) -> Self {
        self.redactor = if logging.redaction_enabled {
            PiiRedactor::default()
        } else {
            PiiRedactor::disabled()
        };
        self.preview_chars = logging.preview_chars;
        self
    }

    fn extraction_policy(config: &CheckInConfig) -> RetryPolicy {
        RetryPolicy::from(&config.extraction_retry)
            .with_attempt_timeout(config.extraction_timeout())
    }

    pub fn flow(&self) -> &QuestionFlow {
        &self.flow
    }

    // =============================================================================
    // Session Operations
    // =============================================================================

    /// Start a check-in for `user_id` and return the first question
    ///
    /// The session is persisted before synthesis, so a synthesis failure
    /// still hands back the session id inside `DownstreamUnavailable`.
    pub async fn start_session(&self, user_id: Uuid) -> Result<StartedSession> {
        self.start_session_inner(user_id)
            .await
            .inspect_err(|e| log_error("start_session", e))
    }

    async fn start_session_inner(&self, user_id: Uuid) -> Result<StartedSession> {
        let now = self.clock.now();
        let session = CheckInSession::new(user_id, now);
        let session_id = session.id;

        self.store.create(session).await?;
        let question = self.flow.next_question(0)?;
        self.store
            .append_message(ConversationMessage::assistant(
                session_id,
                question.index,
                &question.prompt_text,
                now,
            ))
            .await?;

        info!(
            session_id = %session_id,
            user_id = %user_id,
            total_questions = self.flow.len(),
            "Check-in session started"
        );

        let question = self.question_prompt(session_id, question).await?;
        Ok(StartedSession {
            session_id,
            question,
        })
    }

    /// Record the answer to `question_index` and move the session forward
    ///
    /// Returns the next question, or the health record when this was the
    /// last answer. A synthesis failure for the next question surfaces as
    /// `DownstreamUnavailable`, but the answer stays recorded; fetch the
    /// question again with `get_question_audio`.
    pub async fn submit_answer(
        &self,
        session_id: Uuid,
        question_index: usize,
        transcript_text: &str,
    ) -> Result<SubmitOutcome> {
        self.submit_answer_inner(session_id, question_index, transcript_text)
            .await
            .inspect_err(|e| log_error("submit_answer", e))
    }

    async fn submit_answer_inner(
        &self,
        session_id: Uuid,
        question_index: usize,
        transcript_text: &str,
    ) -> Result<SubmitOutcome> {
        let answer = transcript_text.trim();
        if answer.is_empty() {
            return Err(CheckInError::EmptyAnswer {
                session_id,
                question_index,
            });
        }

        let _guard = self.locks.acquire(session_id).await;
        let now = self.clock.now();
        let session = self.load_active(session_id, now).await?;

        let total = self.flow.len();
        let current = session.current_question_index;
        if question_index < current {
            return Err(CheckInError::SessionAlreadyAnswered {
                session_id,
                question_index,
            });
        }
        if question_index > current || question_index >= total {
            return Err(CheckInError::out_of_range(question_index, current, total));
        }

        let question = self.flow.next_question(question_index)?;
        if !question.expected_answer_type.is_plausible(answer) {
            debug!(
                session_id = %session_id,
                question_index,
                expected = ?question.expected_answer_type,
                answer = %self.preview(answer),
                "Answer does not look like the expected type"
            );
        }

        let is_last = question_index + 1 == total;
        let event = if is_last {
            SessionEvent::FinalAnswerRecorded
        } else {
            SessionEvent::AnswerRecorded
        };
        let advanced = state_machine::apply(&session, event, now)
            .map_err(|t| CheckInError::for_terminal_status(session_id, t.from))?;
        // The answer lands with the advance, so a completed session always
        // carries its full transcript.
        let stored = self
            .store
            .compare_and_swap_with_message(
                session.version,
                advanced,
                ConversationMessage::user(session_id, question_index, answer, now),
            )
            .await?;

        debug!(
            session_id = %session_id,
            question_index,
            answer = %self.preview(answer),
            "Answer recorded"
        );

        if is_last {
            info!(session_id = %session_id, "Check-in completed, extracting health data");
            self.audio_cache.evict_session(session_id);
            let record = self.finalize(&stored).await;
            self.locks.evict(session_id);
            return record.map(SubmitOutcome::Completed);
        }

        let next = self.flow.next_question(stored.current_question_index)?;
        self.store
            .append_message(ConversationMessage::assistant(
                session_id,
                next.index,
                &next.prompt_text,
                now,
            ))
            .await?;

        self.question_prompt(session_id, next)
            .await
            .map(SubmitOutcome::NextQuestion)
    }

    /// Transcribe one spoken answer
    ///
    /// Partial transcripts go to `partials` as they arrive; a closed receiver
    /// is ignored. Cancelling `cancel` stops the transcription and records
    /// nothing. The returned transcript still has to be submitted with
    /// `submit_answer`.
    pub async fn stream_answer_audio(
        &self,
        session_id: Uuid,
        audio: AudioStream,
        partials: mpsc::Sender<String>,
        cancel: CancellationToken,
    ) -> Result<FinalTranscript> {
        self.stream_answer_audio_inner(session_id, audio, partials, cancel)
            .await
            .inspect_err(|e| log_error("stream_answer_audio", e))
    }

    async fn stream_answer_audio_inner(
        &self,
        session_id: Uuid,
        mut audio: AudioStream,
        partials: mpsc::Sender<String>,
        cancel: CancellationToken,
    ) -> Result<FinalTranscript> {
        let session = self.active_snapshot(session_id).await?;

        let first_chunk = loop {
            let chunk = tokio::select! {
                () = cancel.cancelled() => {
                    return Err(CheckInError::TranscriptionCancelled(session_id));
                }
                chunk = audio.next() => chunk,
            };
            match chunk {
                Some(chunk) if chunk.is_empty() => {}
                Some(chunk) => break chunk,
                None => {
                    return Err(CheckInError::EmptyAnswer {
                        session_id,
                        question_index: session.current_question_index,
                    })
                }
            }
        };

        let session = self.touch_activity(session_id).await?;
        let question_index = session.current_question_index;
        debug!(session_id = %session_id, question_index, "Answer audio started");

        let upstream = futures::stream::once(async move { first_chunk })
            .chain(audio)
            .boxed();
        let transcription_cancel = cancel.child_token();

        let mut events = tokio::select! {
            () = cancel.cancelled() => {
                return Err(CheckInError::TranscriptionCancelled(session_id));
            }
            started = self.transcriber.transcribe(upstream, transcription_cancel.clone()) => {
                started.map_err(|err| CheckInError::DownstreamUnavailable {
                    session_id: Some(session_id),
                    reason: format!("speech transcription failed: {err}"),
                })?
            }
        };

        let mut last_partial: Option<String> = None;
        let text = loop {
            let event = tokio::select! {
                () = cancel.cancelled() => {
                    transcription_cancel.cancel();
                    info!(session_id = %session_id, question_index, "Transcription cancelled");
                    return Err(CheckInError::TranscriptionCancelled(session_id));
                }
                event = events.next() => event,
            };

            match event {
                Some(Ok(TranscriptEvent::Partial(partial))) => {
                    if !partials.is_closed() {
                        tokio::select! {
                            () = cancel.cancelled() => {
                                transcription_cancel.cancel();
                                return Err(CheckInError::TranscriptionCancelled(session_id));
                            }
                            _ = partials.send(partial.clone()) => {}
                        }
                    }
                    last_partial = Some(partial);
                }
                Some(Ok(TranscriptEvent::Final(text))) => break text,
                Some(Err(err)) => {
                    return Err(CheckInError::DownstreamUnavailable {
                        session_id: Some(session_id),
                        reason: format!("speech transcription failed: {err}"),
                    });
                }
                None => match last_partial.take().filter(|p| !p.trim().is_empty()) {
                    Some(partial) => {
                        warn!(
                            session_id = %session_id,
                            question_index,
                            "Transcription ended without a final result, using last partial"
                        );
                        break partial;
                    }
                    None => {
                        return Err(CheckInError::DownstreamUnavailable {
                            session_id: Some(session_id),
                            reason: "transcription ended without a transcript".to_string(),
                        });
                    }
                },
            }
        };

        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(CheckInError::EmptyAnswer {
                session_id,
                question_index,
            });
        }

        debug!(
            session_id = %session_id,
            question_index,
            transcript = %self.preview(&text),
            "Answer transcribed"
        );
        Ok(FinalTranscript {
            session_id,
            question_index,
            text,
        })
    }

    /// Effective status of a session, without taking its lock
    ///
    /// A session whose deadline has passed reports `timed_out` or `expired`
    /// even if nothing has persisted that yet.
    pub async fn get_session_status(&self, session_id: Uuid) -> Result<SessionSnapshot> {
        let session = self
            .store
            .load(session_id)
            .await
            .map_err(CheckInError::from)
            .inspect_err(|e| log_error("get_session_status", e))?;

        Ok(SessionSnapshot {
            session_id,
            status: self.timeouts.effective_status(&session, self.clock.now()),
            current_question_index: session.current_question_index,
            total_questions: self.flow.len(),
            started_at: session.started_at,
            last_activity_at: session.last_activity_at,
        })
    }

    /// Audio for a question that has already been asked
    pub async fn get_question_audio(
        &self,
        session_id: Uuid,
        question_index: usize,
    ) -> Result<QuestionPrompt> {
        self.get_question_audio_inner(session_id, question_index)
            .await
            .inspect_err(|e| log_error("get_question_audio", e))
    }

    async fn get_question_audio_inner(
        &self,
        session_id: Uuid,
        question_index: usize,
    ) -> Result<QuestionPrompt> {
        let session = self.active_snapshot(session_id).await?;
        let total = self.flow.len();
        if question_index >= total || question_index > session.current_question_index {
            return Err(CheckInError::out_of_range(
                question_index,
                session.current_question_index,
                total,
            ));
        }

        let question = self.flow.next_question(question_index)?;
        self.question_prompt(session_id, question).await
    }

    /// Finish a session explicitly
    ///
    /// Completion normally happens on the last answer; this returns that
    /// record. While the completing instance may still be extracting, a
    /// missing record is `FinalizationInProgress`. Once the grace period has
    /// passed the process is assumed dead and the session gets a
    /// transcript-only record instead of a second extraction.
    pub async fn complete_session(&self, session_id: Uuid) -> Result<HealthRecord> {
        self.complete_session_inner(session_id)
            .await
            .inspect_err(|e| log_error("complete_session", e))
    }

    async fn complete_session_inner(&self, session_id: Uuid) -> Result<HealthRecord> {
        let _guard = self.locks.acquire(session_id).await;
        let now = self.clock.now();
        let session = self.load_locked(session_id).await?;
        let session = self.enforce_timeout(session, now).await?;
        if session.status.is_terminal() {
            self.locks.evict(session_id);
        }

        match session.status {
            SessionStatus::Active => Err(CheckInError::SessionIncomplete {
                session_id,
                answered: session.current_question_index,
                total: self.flow.len(),
            }),
            SessionStatus::Expired | SessionStatus::TimedOut => {
                Err(CheckInError::for_terminal_status(session_id, session.status))
            }
            SessionStatus::Completed => {
                if let Some(record) = self.store.load_health_record(session_id).await? {
                    return Ok(record);
                }
                let completed_at = session.completed_at.unwrap_or(session.last_activity_at);
                if now - completed_at < self.finalization_grace {
                    return Err(CheckInError::FinalizationInProgress(session_id));
                }
                warn!(
                    session_id = %session_id,
                    completed_at = %completed_at,
                    "Completed session has no health record, storing transcript only"
                );
                let transcript = self.transcript_text(session_id).await?;
                let record = self
                    .store_record(
                        &session,
                        ExtractedData::degraded(transcript),
                        ExtractionStatus::Degraded {
                            reason: "finalization interrupted".to_string(),
                        },
                    )
                    .await?;
                if let Some(notice) = record.degradation() {
                    log_error("complete_session", &notice);
                }
                Ok(record)
            }
        }
    }

    /// Q/A transcript of a session in any state
    pub async fn get_transcript(&self, session_id: Uuid) -> Result<Transcript> {
        let messages = self.store.load_messages(session_id).await?;
        Ok(Transcript::from_messages(&messages))
    }

    pub async fn get_health_record(&self, session_id: Uuid) -> Result<Option<HealthRecord>> {
        self.store.load(session_id).await?;
        Ok(self.store.load_health_record(session_id).await?)
    }

    /// Apply every timeout that is due
    ///
    /// Each candidate is re-read under its session lock, so a session that
    /// completed in the meantime is left alone.
    pub async fn sweep_timeouts(&self) -> Result<SweepReport> {
        let now = self.clock.now();
        let candidates = self.store.list_active().await?;
        let mut report = SweepReport::default();

        for candidate in candidates {
            report.examined += 1;
            if self.timeouts.evaluate(&candidate, now).is_none() {
                continue;
            }

            let _guard = self.locks.acquire(candidate.id).await;
            let current = match self.store.load(candidate.id).await {
                Ok(session) => session,
                Err(StoreError::NotFound(_)) => {
                    self.locks.evict(candidate.id);
                    continue;
                }
                Err(err) => {
                    warn!(session_id = %candidate.id, error = %err, "Sweep could not load session");
                    report.failed += 1;
                    continue;
                }
            };
            let was_active = current.is_active();

            match self.enforce_timeout(current, self.clock.now()).await {
                Ok(after) if was_active => match after.status {
                    SessionStatus::TimedOut => report.timed_out += 1,
                    SessionStatus::Expired => report.expired += 1,
                    SessionStatus::Active | SessionStatus::Completed => {}
                },
                Ok(_) => {}
                Err(err) => {
                    warn!(session_id = %candidate.id, error = %err, "Sweep could not time out session");
                    report.failed += 1;
                }
            }
        }

        if report.transitioned() > 0 || report.failed > 0 {
            info!(
                examined = report.examined,
                timed_out = report.timed_out,
                expired = report.expired,
                failed = report.failed,
                "Timeout sweep finished"
            );
        }
        Ok(report)
    }

    // =============================================================================
    // Internals
    // =============================================================================

    /// Load a session that must be active, applying any due timeout first.
    /// Call with the session lock held.
    async fn load_active(&self, session_id: Uuid, now: DateTime<Utc>) -> Result<CheckInSession> {
        let session = self.load_locked(session_id).await?;
        let session = self.enforce_timeout(session, now).await?;
        if session.status.is_terminal() {
            self.locks.evict(session_id);
            return Err(CheckInError::for_terminal_status(session_id, session.status));
        }
        Ok(session)
    }

    /// Load with the session lock held, dropping the lock entry when the
    /// session does not exist.
    async fn load_locked(&self, session_id: Uuid) -> Result<CheckInSession> {
        match self.store.load(session_id).await {
            Ok(session) => Ok(session),
            Err(err) => {
                if matches!(err, StoreError::NotFound(_)) {
                    self.locks.evict(session_id);
                }
                Err(err.into())
            }
        }
    }

    /// Lock-free read that only takes the lock when a timeout has to be applied.
    async fn active_snapshot(&self, session_id: Uuid) -> Result<CheckInSession> {
        let session = self.store.load(session_id).await?;
        if session.status.is_terminal() {
            return Err(CheckInError::for_terminal_status(session_id, session.status));
        }
        if self.timeouts.evaluate(&session, self.clock.now()).is_none() {
            return Ok(session);
        }

        let _guard = self.locks.acquire(session_id).await;
        self.load_active(session_id, self.clock.now()).await
    }

    /// Persist the timeout due for `session` at `now`, if any, and return the
    /// session as stored afterwards.
    async fn enforce_timeout(
        &self,
        mut session: CheckInSession,
        now: DateTime<Utc>,
    ) -> Result<CheckInSession> {
        for _ in 0..MAX_CAS_ATTEMPTS {
            let Some(verdict) = self.timeouts.evaluate(&session, now) else {
                return Ok(session);
            };

            let next = state_machine::apply(&session, verdict.event(), now)
                .map_err(|t| CheckInError::for_terminal_status(session.id, t.from))?;

            match self.store.compare_and_swap(session.version, next).await {
                Ok(stored) => {
                    warn!(
                        session_id = %stored.id,
                        status = %stored.status,
                        question_index = stored.current_question_index,
                        "Session ended by timeout"
                    );
                    self.audio_cache.evict_session(stored.id);
                    self.locks.evict(stored.id);
                    return Ok(stored);
                }
                Err(StoreError::ConcurrentModification(_)) => {
                    session = self.store.load(session.id).await?;
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(CheckInError::ConcurrentModification(session.id))
    }

    /// Refresh `last_activity_at` under the session lock.
    async fn touch_activity(&self, session_id: Uuid) -> Result<CheckInSession> {
        let _guard = self.locks.acquire(session_id).await;

        for _ in 0..MAX_CAS_ATTEMPTS {
            let now = self.clock.now();
            let session = self.load_active(session_id, now).await?;
            let mut touched = session.clone();
            touched.last_activity_at = now;

            match self.store.compare_and_swap(session.version, touched).await {
                Ok(stored) => return Ok(stored),
                Err(StoreError::ConcurrentModification(_)) => continue,
                Err(err) => return Err(err.into()),
            }
        }

        Err(CheckInError::ConcurrentModification(session_id))
    }

    async fn question_prompt(
        &self,
        session_id: Uuid,
        question: &QuestionDefinition,
    ) -> Result<QuestionPrompt> {
        let synthesizer = &self.synthesizer;
        let voice = &self.voice;
        let retry = &self.synthesis_retry;
        let text = question.prompt_text.as_str();

        let audio = self
            .audio_cache
            .get_or_synthesize(session_id, question.index, || async move {
                retry
                    .run("speech_synthesis", move || synthesizer.synthesize(text, voice))
                    .await
            })
            .await
            .map_err(|err| CheckInError::DownstreamUnavailable {
                session_id: Some(session_id),
                reason: format!("speech synthesis failed: {err}"),
            })?;

        Ok(QuestionPrompt {
            question_index: question.index,
            text: question.prompt_text.clone(),
            audio: audio.as_ref().clone(),
        })
    }

    /// Extract and store the health record for a session that just completed.
    async fn finalize(&self, session: &CheckInSession) -> Result<HealthRecord> {
        if let Some(existing) = self.store.load_health_record(session.id).await? {
            return Ok(existing);
        }

        let transcript = self.transcript_text(session.id).await?;
        let outcome = self.extractor.extract(&transcript).await;
        let record = self
            .store_record(session, outcome.data, outcome.status)
            .await?;
        if let Some(notice) = record.degradation() {
            log_error("finalize", &notice);
        }
        Ok(record)
    }

    async fn store_record(
        &self,
        session: &CheckInSession,
        data: ExtractedData,
        extraction: ExtractionStatus,
    ) -> Result<HealthRecord> {
        let record = HealthRecord {
            id: Uuid::new_v4(),
            session_id: session.id,
            user_id: session.user_id,
            data,
            extraction,
            created_at: self.clock.now(),
        };

        let stored = self.store.insert_health_record(record).await?;
        info!(
            session_id = %session.id,
            record_id = %stored.id,
            extraction_failed = stored.extraction_failed(),
            "Health record stored"
        );
        Ok(stored)
    }

    async fn transcript_text(&self, session_id: Uuid) -> Result<String> {
        Ok(self.get_transcript(session_id).await?.render())
    }

    fn preview(&self, text: &str) -> String {
        self.redactor.preview(text, self.preview_chars)
    }
}
