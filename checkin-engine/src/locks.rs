use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// Per-session async mutexes
///
/// Mutating operations on one session serialize here; different sessions
/// never contend.
#[derive(Default)]
pub struct SessionLocks {
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, session_id: Uuid) -> OwnedMutexGuard<()> {
        // The map guard must be dropped before awaiting the mutex.
        let lock = self.locks.entry(session_id).or_default().value().clone();
        lock.lock_owned().await
    }

    /// Forget the lock for a session that reached a terminal state.
    ///
    /// Holders keep their guard; a later `acquire` just gets a fresh mutex,
    /// which is harmless because the session no longer accepts mutations.
    pub fn evict(&self, session_id: Uuid) {
        self.locks.remove(&session_id);
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_session_serializes() {
        let locks = Arc::new(SessionLocks::new());
        let id = Uuid::new_v4();

        let guard = locks.acquire(id).await;
        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(id).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
    }

    #[tokio::test]
    async fn test_different_sessions_do_not_contend() {
        let locks = SessionLocks::new();
        let _first = locks.acquire(Uuid::new_v4()).await;
        let second = tokio::time::timeout(Duration::from_millis(50), locks.acquire(Uuid::new_v4())).await;
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn test_evict_removes_entry() {
        let locks = SessionLocks::new();
        let id = Uuid::new_v4();
        drop(locks.acquire(id).await);
        assert_eq!(locks.len(), 1);
        locks.evict(id);
        assert!(locks.is_empty());
    }
}
