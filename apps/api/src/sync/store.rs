use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::catalog::InstrumentId;
use crate::models::progress::{NewProgress, ProgressPatch, ProgressRecord};
use crate::sync::PersistenceError;

/// The remote progress API as the engine sees it.
///
/// Implemented by `HttpProgressStore` (production) and
/// `InMemoryProgressStore` (local development and tests).
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// `GET /progress?subjectId=..&instrument=..`; `None` on 404.
    async fn fetch(
        &self,
        subject_id: &str,
        instrument: InstrumentId,
    ) -> Result<Option<ProgressRecord>, PersistenceError>;

    /// `POST /progress`.
    async fn create(&self, draft: &NewProgress) -> Result<ProgressRecord, PersistenceError>;

    /// `PUT /progress/{id}`.
    async fn update(
        &self,
        id: &str,
        patch: &ProgressPatch,
    ) -> Result<ProgressRecord, PersistenceError>;
}

/// Process-local store used when no progress API is configured.
#[derive(Default)]
pub struct InMemoryProgressStore {
    records: Mutex<HashMap<String, ProgressRecord>>,
}

impl InMemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProgressStore for InMemoryProgressStore {
    async fn fetch(
        &self,
        subject_id: &str,
        instrument: InstrumentId,
    ) -> Result<Option<ProgressRecord>, PersistenceError> {
        let records = self.records.lock().await;
        Ok(records
            .values()
            .find(|r| r.subject_id == subject_id && r.instrument == instrument)
            .cloned())
    }

    async fn create(&self, draft: &NewProgress) -> Result<ProgressRecord, PersistenceError> {
        let id = Uuid::new_v4().to_string();
        let record = ProgressRecord {
            id: Some(id.clone()),
            subject_id: draft.subject_id.clone(),
            instrument: draft.instrument,
            state: draft.state.clone(),
            updated_at: Some(Utc::now()),
        };
        self.records.lock().await.insert(id, record.clone());
        Ok(record)
    }

    async fn update(
        &self,
        id: &str,
        patch: &ProgressPatch,
    ) -> Result<ProgressRecord, PersistenceError> {
        let mut records = self.records.lock().await;
        let record = records
            .get_mut(id)
            .ok_or_else(|| PersistenceError::NotFound(id.to_string()))?;
        patch.apply_to(&mut record.state);
        record.updated_at = Some(Utc::now());
        Ok(record.clone())
    }
}
