//! Short-lived issuance sessions.
//!
//! `prepare` salts and commits a cohort; the records stay here until `publish` consumes
//! them or the session expires. Nothing in a session is ever written to disk.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use uuid::Uuid;
use zk_credentials::{BatchMetadata, Record};

#[derive(Clone, Debug)]
pub struct PreparedBatch {
    pub records: Vec<Record>,
    pub metadata: BatchMetadata,
}

struct Entry {
    batch: PreparedBatch,
    created: Instant,
}

#[derive(Clone)]
pub struct SessionStore {
    ttl: Duration,
    inner: Arc<Mutex<HashMap<Uuid, Entry>>>,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, inner: Arc::new(Mutex::new(HashMap::new())) }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, Entry>> {
        // A panic while holding the lock cannot leave a half-written entry behind.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn insert(&self, batch: PreparedBatch) -> Uuid {
        let id = Uuid::new_v4();
        let mut sessions = self.lock();
        let ttl = self.ttl;
        sessions.retain(|_, e| e.created.elapsed() < ttl);
        sessions.insert(id, Entry { batch, created: Instant::now() });
        id
    }

    /// Remove and return a live session. Expired sessions are dropped and reported as absent.
    pub fn take(&self, id: &Uuid) -> Option<PreparedBatch> {
        let entry = self.lock().remove(id)?;
        if entry.created.elapsed() < self.ttl {
            Some(entry.batch)
        } else {
            tracing::debug!(session = %id, "session expired");
            None
        }
    }

    /// Put a taken session back under its id, with a fresh TTL, after a failed publish.
    pub fn restore(&self, id: Uuid, batch: PreparedBatch) {
        self.lock().insert(id, Entry { batch, created: Instant::now() });
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zk_credentials::Salt;

    fn prepared() -> PreparedBatch {
        PreparedBatch {
            records: vec![Record::new("s-1", &[70, 80], Salt([1u8; 32])).unwrap()],
            metadata: BatchMetadata {
                institution: "Example University".into(),
                course: "BSc Physics".into(),
                year: 2025,
                total_students: 1,
            },
        }
    }

    #[test]
    fn take_consumes_the_session() {
        let store = SessionStore::new(Duration::from_secs(60));
        let id = store.insert(prepared());
        assert_eq!(store.len(), 1);

        let batch = store.take(&id).unwrap();
        assert_eq!(batch.records[0].student_id(), "s-1");
        assert!(store.take(&id).is_none());
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn expired_sessions_are_absent() {
        let store = SessionStore::new(Duration::ZERO);
        let id = store.insert(prepared());
        assert!(store.take(&id).is_none());
    }

    #[test]
    fn insert_prunes_expired_sessions() {
        let store = SessionStore::new(Duration::ZERO);
        store.insert(prepared());
        store.insert(prepared());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn restored_sessions_can_be_taken_again() {
        let store = SessionStore::new(Duration::from_secs(60));
        let id = store.insert(prepared());
        let batch = store.take(&id).unwrap();

        store.restore(id, batch);
        assert_eq!(store.take(&id).unwrap().records[0].student_id(), "s-1");
    }

    #[test]
    fn clones_share_state() {
        let store = SessionStore::new(Duration::from_secs(60));
        let id = store.clone().insert(prepared());
        assert!(store.take(&id).is_some());
    }
}
