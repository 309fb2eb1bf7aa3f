//! Resumption: fetching the stored record for a subject, and the periodic
//! refresh that re-runs reconciliation while a session is open.

use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, warn};

use crate::catalog::InstrumentId;
use crate::models::progress::ProgressRecord;
use crate::sync::store::ProgressStore;
use crate::sync::PersistenceError;

#[derive(Clone)]
pub struct ResumptionLoader {
    store: Arc<dyn ProgressStore>,
    instrument: InstrumentId,
}

impl ResumptionLoader {
    pub fn new(store: Arc<dyn ProgressStore>, instrument: InstrumentId) -> Self {
        Self { store, instrument }
    }

    /// The stored record for `subject_id`, or `None` if nothing was saved yet.
    pub async fn hydrate(&self, subject_id: &str) -> Result<Option<ProgressRecord>, PersistenceError> {
        let record = self.store.fetch(subject_id, self.instrument).await?;
        debug!(
            "Hydrated {} on {}: {}",
            subject_id,
            self.instrument,
            match &record {
                Some(r) => format!("index {} terminal {}", r.state.current_index, r.state.terminal),
                None => "no stored progress".to_string(),
            }
        );
        Ok(record)
    }
}

/// Something that can re-fetch and reconcile its own state.
#[async_trait]
pub trait Resync: Send + Sync + 'static {
    async fn resync(&self) -> Result<(), PersistenceError>;
}

/// Stops a background loop (resync, idle sweep) when dropped.
pub struct TaskGuard(JoinHandle<()>);

impl From<JoinHandle<()>> for TaskGuard {
    fn from(handle: JoinHandle<()>) -> Self {
        Self(handle)
    }
}

impl TaskGuard {
    pub fn stop(&self) {
        self.0.abort();
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Calls `resync` on `target` every `every`, starting one period from now.
/// Holds only a weak reference: once the target is dropped the loop ends and
/// nothing is applied to it.
pub fn spawn_resync<T: Resync>(target: Weak<T>, every: Duration) -> TaskGuard {
    let handle = tokio::spawn(async move {
        let mut ticker = time::interval_at(time::Instant::now() + every, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let Some(target) = target.upgrade() else {
                debug!("Resync target dropped; stopping");
                break;
            };
            if let Err(e) = target.resync().await {
                warn!("Periodic progress refresh failed: {e}");
            }
        }
    });
    TaskGuard(handle)
}
