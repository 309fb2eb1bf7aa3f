//! Store double for engine tests: counts successful writes and can be told to
//! fail the next few requests.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::catalog::InstrumentId;
use crate::models::progress::{NewProgress, ProgressPatch, ProgressRecord, ProgressState};
use crate::sync::store::{InMemoryProgressStore, ProgressStore};
use crate::sync::PersistenceError;

#[derive(Default)]
pub struct RecordingStore {
    inner: InMemoryProgressStore,
    fetches: AtomicUsize,
    creates: AtomicUsize,
    updates: AtomicUsize,
    failures: AtomicU32,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `n` requests (of any kind) fail with a 503.
    pub fn fail_next(&self, n: u32) {
        self.failures.store(n, Ordering::SeqCst);
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.creates() + self.updates()
    }

    /// Inserts a record directly, bypassing the counters. Returns its id.
    pub async fn seed(&self, subject_id: &str, instrument: InstrumentId, state: ProgressState) -> String {
        let draft = NewProgress {
            subject_id: subject_id.to_string(),
            instrument,
            state,
        };
        self.inner
            .create(&draft)
            .await
            .ok()
            .and_then(|r| r.id)
            .unwrap_or_default()
    }

    /// Changes a stored record as another device would, bypassing the counters.
    pub async fn edit_remotely(&self, id: &str, patch: &ProgressPatch) {
        let _ = self.inner.update(id, patch).await;
    }

    pub async fn latest(&self, subject_id: &str, instrument: InstrumentId) -> Option<ProgressRecord> {
        self.inner.fetch(subject_id, instrument).await.ok().flatten()
    }

    fn injected_failure(&self) -> Result<(), PersistenceError> {
        let failed = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(PersistenceError::Api {
                status: 503,
                message: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ProgressStore for RecordingStore {
    async fn fetch(
        &self,
        subject_id: &str,
        instrument: InstrumentId,
    ) -> Result<Option<ProgressRecord>, PersistenceError> {
        self.injected_failure()?;
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch(subject_id, instrument).await
    }

    async fn create(&self, draft: &NewProgress) -> Result<ProgressRecord, PersistenceError> {
        self.injected_failure()?;
        let record = self.inner.create(draft).await?;
        self.creates.fetch_add(1, Ordering::SeqCst);
        Ok(record)
    }

    async fn update(
        &self,
        id: &str,
        patch: &ProgressPatch,
    ) -> Result<ProgressRecord, PersistenceError> {
        self.injected_failure()?;
        let record = self.inner.update(id, patch).await?;
        self.updates.fetch_add(1, Ordering::SeqCst);
        Ok(record)
    }
}
