//! Scripted collaborators and a deterministic engine harness.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::Barrier;
use uuid::Uuid;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use checkin_engine::model::{CheckInSession, ConversationMessage, HealthRecord};
use checkin_engine::providers::{
    AudioStream, ChatCompleter, CollaboratorError, SpeechSynthesizer, SpeechTranscriber,
    TranscriptEvent, TranscriptStream,
};
use checkin_engine::{
    CheckInConfig, CheckInEngine, InMemorySessionStore, ManualClock, RetryPolicy, SessionStore,
    StoreError, SubmitOutcome, VoiceSettings,
};

pub const ANSWERS: [&str; 8] = [
    "I'm feeling pretty good today, a bit tired",
    "A mild headache and some congestion",
    "About a three",
    "My energy is moderate",
    "I slept poorly, woke up twice",
    "Yes, I took all of them this morning",
    "I walked for thirty minutes",
    "Oatmeal for breakfast, a salad for lunch, and pasta for dinner",
];

pub const PARSED_RESPONSE: &str = r#"```json
{
  "symptoms": ["headache", "congestion"],
  "mood": "good",
  "painLevel": 3,
  "energyLevel": "moderate",
  "sleepQuality": "poor",
  "medicationTaken": "taken",
  "physicalActivity": ["walking"],
  "meals": {"breakfast": "oatmeal", "lunch": "salad", "dinner": "pasta"},
  "generalFeeling": "pretty good, a bit tired",
  "additionalNotes": null
}
```"#;

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap()
}

pub fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(max_attempts, Duration::from_millis(1), Duration::from_millis(2))
}

/// Returns the prompt text as "audio" and counts calls
#[derive(Default)]
pub struct FakeSynthesizer {
    calls: AtomicUsize,
    failing: AtomicBool,
    delay_ms: AtomicUsize,
}

impl FakeSynthesizer {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms
            .store(delay.as_millis() as usize, Ordering::SeqCst);
    }
}

#[async_trait]
impl SpeechSynthesizer for FakeSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        _voice: &VoiceSettings,
    ) -> Result<Vec<u8>, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay as u64)).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(CollaboratorError::Unavailable("tts offline".into()));
        }
        Ok(text.as_bytes().to_vec())
    }
}

/// What the fake transcriber does with the next call
#[derive(Clone)]
pub enum TranscriberScript {
    /// Drain the audio, then emit these events.
    Events(Vec<TranscriptEvent>),
    /// Never produce anything until cancelled.
    Hang,
    Fail,
}

pub struct FakeTranscriber {
    script: Mutex<TranscriberScript>,
    calls: AtomicUsize,
    chunks_received: Arc<AtomicUsize>,
    last_cancel: Mutex<Option<CancellationToken>>,
}

impl Default for FakeTranscriber {
    fn default() -> Self {
        Self {
            script: Mutex::new(TranscriberScript::Events(vec![TranscriptEvent::Final(
                "default answer".into(),
            )])),
            calls: AtomicUsize::new(0),
            chunks_received: Arc::new(AtomicUsize::new(0)),
            last_cancel: Mutex::new(None),
        }
    }
}

impl FakeTranscriber {
    pub fn script(&self, script: TranscriberScript) {
        *self.script.lock() = script;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn chunks_received(&self) -> usize {
        self.chunks_received.load(Ordering::SeqCst)
    }

    /// Whether the token handed to the last call has been cancelled.
    pub fn last_call_cancelled(&self) -> bool {
        self.last_cancel
            .lock()
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }
}

#[async_trait]
impl SpeechTranscriber for FakeTranscriber {
    async fn transcribe(
        &self,
        audio: AudioStream,
        cancel: CancellationToken,
    ) -> Result<TranscriptStream, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_cancel.lock() = Some(cancel.clone());
        let script = self.script.lock().clone();

        match script {
            TranscriberScript::Events(events) => {
                let counter = self.chunks_received.clone();
                let drained = audio.filter_map(move |_chunk| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    async { None::<Result<TranscriptEvent, CollaboratorError>> }
                });
                Ok(drained.chain(stream::iter(events.into_iter().map(Ok))).boxed())
            }
            TranscriberScript::Hang => Ok(stream::once(async move { cancel.cancelled().await })
                .filter_map(|()| async { None::<Result<TranscriptEvent, CollaboratorError>> })
                .boxed()),
            TranscriberScript::Fail => Err(CollaboratorError::Unavailable("stt offline".into())),
        }
    }
}

/// Answers every prompt with a fixed response
pub struct FakeCompleter {
    response: Mutex<Result<String, CollaboratorError>>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
    delay_ms: AtomicUsize,
}

impl Default for FakeCompleter {
    fn default() -> Self {
        Self {
            response: Mutex::new(Ok(PARSED_RESPONSE.to_string())),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
            delay_ms: AtomicUsize::new(0),
        }
    }
}

impl FakeCompleter {
    pub fn respond_with(&self, response: Result<String, CollaboratorError>) {
        *self.response.lock() = response;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().last().cloned()
    }

    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms
            .store(delay.as_millis() as usize, Ordering::SeqCst);
    }
}

#[async_trait]
impl ChatCompleter for FakeCompleter {
    async fn complete(&self, prompt: &str, _schema_hint: &str) -> Result<String, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().push(prompt.to_string());
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay as u64)).await;
        }
        self.response.lock().clone()
    }
}

pub struct Harness {
    pub engine: Arc<CheckInEngine>,
    pub store: Arc<InMemorySessionStore>,
    pub clock: Arc<ManualClock>,
    pub synthesizer: Arc<FakeSynthesizer>,
    pub transcriber: Arc<FakeTranscriber>,
    pub completer: Arc<FakeCompleter>,
}

pub fn harness() -> Harness {
    build_harness(None)
}

/// Harness whose timeouts and question flow come from `config`.
pub fn harness_with_config(config: &CheckInConfig) -> Harness {
    build_harness(Some(config))
}

fn build_harness(config: Option<&CheckInConfig>) -> Harness {
    let store = Arc::new(InMemorySessionStore::new());
    let clock = Arc::new(ManualClock::new(start_time()));
    build_engine(store.clone(), store, clock, config)
}

fn build_engine(
    store: Arc<InMemorySessionStore>,
    engine_store: Arc<dyn SessionStore>,
    clock: Arc<ManualClock>,
    config: Option<&CheckInConfig>,
) -> Harness {
    let synthesizer = Arc::new(FakeSynthesizer::default());
    let transcriber = Arc::new(FakeTranscriber::default());
    let completer = Arc::new(FakeCompleter::default());

    let mut engine = CheckInEngine::new(
        engine_store,
        synthesizer.clone(),
        transcriber.clone(),
        completer.clone(),
    );
    if let Some(config) = config {
        engine = engine.with_config(config).unwrap();
    }
    let engine = engine
        .with_clock(clock.clone())
        .with_synthesis_retry(fast_retry(3))
        .with_extraction_retry(fast_retry(2));

    Harness {
        engine: Arc::new(engine),
        store,
        clock,
        synthesizer,
        transcriber,
        completer,
    }
}

pub fn audio(chunks: &[&[u8]]) -> AudioStream {
    let owned: Vec<Vec<u8>> = chunks.iter().map(|chunk| chunk.to_vec()).collect();
    stream::iter(owned).boxed()
}

impl Harness {
    /// Another engine instance with its own collaborators, writing through
    /// `store` and sharing this harness's backing store and clock.
    pub fn peer(&self, store: Arc<dyn SessionStore>) -> Harness {
        build_engine(self.store.clone(), store, self.clock.clone(), None)
    }

    /// Answer every remaining question starting at `from`, returning the
    /// final outcome.
    pub async fn answer_all(&self, session_id: Uuid, from: usize) -> SubmitOutcome {
        let mut outcome = None;
        for (index, answer) in ANSWERS.iter().enumerate().skip(from) {
            outcome = Some(
                self.engine
                    .submit_answer(session_id, index, answer)
                    .await
                    .unwrap(),
            );
        }
        outcome.unwrap()
    }
}

/// Delegates to an in-memory store, holding the first `gated` answer writes
/// until all of them have arrived.
pub struct GatedStore {
    inner: Arc<InMemorySessionStore>,
    barrier: Barrier,
    remaining: AtomicUsize,
}

impl GatedStore {
    pub fn new(inner: Arc<InMemorySessionStore>, gated: usize) -> Self {
        Self {
            inner,
            barrier: Barrier::new(gated),
            remaining: AtomicUsize::new(gated),
        }
    }
}

#[async_trait]
impl SessionStore for GatedStore {
    async fn create(&self, session: CheckInSession) -> Result<(), StoreError> {
        self.inner.create(session).await
    }

    async fn load(&self, session_id: Uuid) -> Result<CheckInSession, StoreError> {
        self.inner.load(session_id).await
    }

    async fn compare_and_swap(
        &self,
        expected_version: u64,
        updated: CheckInSession,
    ) -> Result<CheckInSession, StoreError> {
        self.inner.compare_and_swap(expected_version, updated).await
    }

    async fn compare_and_swap_with_message(
        &self,
        expected_version: u64,
        updated: CheckInSession,
        message: ConversationMessage,
    ) -> Result<CheckInSession, StoreError> {
        let gated = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if gated {
            self.barrier.wait().await;
        }
        self.inner
            .compare_and_swap_with_message(expected_version, updated, message)
            .await
    }

    async fn append_message(&self, message: ConversationMessage) -> Result<(), StoreError> {
        self.inner.append_message(message).await
    }

    async fn load_messages(&self, session_id: Uuid) -> Result<Vec<ConversationMessage>, StoreError> {
        self.inner.load_messages(session_id).await
    }

    async fn list_active(&self) -> Result<Vec<CheckInSession>, StoreError> {
        self.inner.list_active().await
    }

    async fn insert_health_record(&self, record: HealthRecord) -> Result<HealthRecord, StoreError> {
        self.inner.insert_health_record(record).await
    }

    async fn load_health_record(
        &self,
        session_id: Uuid,
    ) -> Result<Option<HealthRecord>, StoreError> {
        self.inner.load_health_record(session_id).await
    }
}
