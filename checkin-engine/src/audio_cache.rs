use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::OnceCell;
use uuid::Uuid;

type Slot = Arc<OnceCell<Arc<Vec<u8>>>>;

/// Synthesized question audio, keyed by (session, question)
///
/// Concurrent lookups for the same key share a single synthesis: the first
/// caller runs it and the rest wait on the same cell. A failed synthesis
/// leaves the cell empty so the next caller tries again.
#[derive(Default)]
pub struct AudioCache {
    slots: DashMap<(Uuid, usize), Slot>,
}

impl AudioCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_synthesize<F, Fut, E>(
        &self,
        session_id: Uuid,
        question_index: usize,
        synthesize: F,
    ) -> Result<Arc<Vec<u8>>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<u8>, E>>,
    {
        // Clone the cell out so no map shard lock is held across the await.
        let slot = self
            .slots
            .entry((session_id, question_index))
            .or_default()
            .value()
            .clone();

        slot.get_or_try_init(|| async move { synthesize().await.map(Arc::new) })
            .await
            .cloned()
    }

    pub fn get(&self, session_id: Uuid, question_index: usize) -> Option<Arc<Vec<u8>>> {
        self.slots
            .get(&(session_id, question_index))
            .and_then(|slot| slot.get().cloned())
    }

    /// Drop every entry belonging to `session_id`.
    pub fn evict_session(&self, session_id: Uuid) {
        self.slots.retain(|(id, _), _| *id != session_id);
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
