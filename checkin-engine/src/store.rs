use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::model::{CheckInSession, ConversationMessage, HealthRecord};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Session not found: {0}")]
    NotFound(Uuid),

    #[error("Version conflict on session {0}")]
    ConcurrentModification(Uuid),

    #[error("Store backend error: {0}")]
    Backend(String),
}

/// Durable persistence for sessions, messages and health records
///
/// Session writes are conditioned on the version the caller last read, so the
/// store stays the source of truth when several engine instances share it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a brand new session. Fails if the id is already taken.
    async fn create(&self, session: CheckInSession) -> Result<(), StoreError>;

    async fn load(&self, session_id: Uuid) -> Result<CheckInSession, StoreError>;

    /// Replace the stored session if its version still equals
    /// `expected_version`. Returns the stored copy with the bumped version.
    async fn compare_and_swap(
        &self,
        expected_version: u64,
        updated: CheckInSession,
    ) -> Result<CheckInSession, StoreError>;

    /// `compare_and_swap` that also appends `message` in the same write.
    /// Neither change is applied when the version check fails.
    async fn compare_and_swap_with_message(
        &self,
        expected_version: u64,
        updated: CheckInSession,
        message: ConversationMessage,
    ) -> Result<CheckInSession, StoreError>;

    async fn append_message(&self, message: ConversationMessage) -> Result<(), StoreError>;

    /// Messages in append order.
    async fn load_messages(&self, session_id: Uuid) -> Result<Vec<ConversationMessage>, StoreError>;

    /// Every session still marked active, for the background sweep.
    async fn list_active(&self) -> Result<Vec<CheckInSession>, StoreError>;

    /// Insert-if-absent. Returns whichever record is stored afterwards, so a
    /// losing writer gets the winner's record back.
    async fn insert_health_record(&self, record: HealthRecord) -> Result<HealthRecord, StoreError>;

    async fn load_health_record(&self, session_id: Uuid)
        -> Result<Option<HealthRecord>, StoreError>;
}

/// In-memory store for testing and single-instance deployments
pub struct InMemorySessionStore {
    sessions: Arc<DashMap<Uuid, CheckInSession>>,
    messages: Arc<DashMap<Uuid, Vec<ConversationMessage>>>,
    records: Arc<DashMap<Uuid, HealthRecord>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            messages: Arc::new(DashMap::new()),
            records: Arc::new(DashMap::new()),
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self, session: CheckInSession) -> Result<(), StoreError> {
        match self.sessions.entry(session.id) {
            Entry::Occupied(_) => Err(StoreError::Backend(format!(
                "session {} already exists",
                session.id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(session);
                Ok(())
            }
        }
    }

    async fn load(&self, session_id: Uuid) -> Result<CheckInSession, StoreError> {
        self.sessions
            .get(&session_id)
            .map(|entry| entry.value().clone())
            .ok_or(StoreError::NotFound(session_id))
    }

    async fn compare_and_swap(
        &self,
        expected_version: u64,
        mut updated: CheckInSession,
    ) -> Result<CheckInSession, StoreError> {
        let mut current = self
            .sessions
            .get_mut(&updated.id)
            .ok_or(StoreError::NotFound(updated.id))?;

        if current.version != expected_version {
            return Err(StoreError::ConcurrentModification(updated.id));
        }

        updated.version = expected_version + 1;
        *current = updated.clone();
        Ok(updated)
    }

    async fn compare_and_swap_with_message(
        &self,
        expected_version: u64,
        mut updated: CheckInSession,
        message: ConversationMessage,
    ) -> Result<CheckInSession, StoreError> {
        // Lock order is sessions then messages; nothing takes them the other way.
        let mut current = self
            .sessions
            .get_mut(&updated.id)
            .ok_or(StoreError::NotFound(updated.id))?;

        if current.version != expected_version {
            return Err(StoreError::ConcurrentModification(updated.id));
        }
        if message.session_id != updated.id {
            return Err(StoreError::Backend(format!(
                "message for session {} written with session {}",
                message.session_id, updated.id
            )));
        }

        self.messages
            .entry(message.session_id)
            .or_default()
            .push(message);
        updated.version = expected_version + 1;
        *current = updated.clone();
        Ok(updated)
    }

    async fn append_message(&self, message: ConversationMessage) -> Result<(), StoreError> {
        if !self.sessions.contains_key(&message.session_id) {
            return Err(StoreError::NotFound(message.session_id));
        }
        self.messages
            .entry(message.session_id)
            .or_default()
            .push(message);
        Ok(())
    }

    async fn load_messages(
        &self,
        session_id: Uuid,
    ) -> Result<Vec<ConversationMessage>, StoreError> {
        if !self.sessions.contains_key(&session_id) {
            return Err(StoreError::NotFound(session_id));
        }
        Ok(self
            .messages
            .get(&session_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }

    async fn list_active(&self) -> Result<Vec<CheckInSession>, StoreError> {
        Ok(self
            .sessions
            .iter()
            .filter(|entry| entry.value().is_active())
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn insert_health_record(&self, record: HealthRecord) -> Result<HealthRecord, StoreError> {
        match self.records.entry(record.session_id) {
            Entry::Occupied(existing) => Ok(existing.get().clone()),
            Entry::Vacant(slot) => Ok(slot.insert(record).value().clone()),
        }
    }

    async fn load_health_record(
        &self,
        session_id: Uuid,
    ) -> Result<Option<HealthRecord>, StoreError> {
        Ok(self
            .records
            .get(&session_id)
            .map(|entry| entry.value().clone()))
    }
}
