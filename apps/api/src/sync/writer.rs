//! Coalescing writer: one per session. Bursts of local changes collapse into
//! a single trailing-edge write of the latest state; a flush writes
//! immediately. A single task performs every write, so at most one request is
//! in flight and writes reach the store in the order they were issued.

use std::future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use crate::catalog::InstrumentId;
use crate::models::progress::{NewProgress, ProgressPatch, ProgressRecord, ProgressState};
use crate::sync::store::ProgressStore;
use crate::sync::PersistenceError;

/// What the writer knows about the remote record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteIdentity {
    /// Nothing stored yet: the next write creates the record.
    Absent,
    Known(String),
}

/// Which record this writer owns.
#[derive(Debug, Clone)]
pub struct WriteTarget {
    pub subject_id: String,
    pub instrument: InstrumentId,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    pub remote_id: Option<String>,
    /// Highest local revision the store has acknowledged.
    pub synced_revision: u64,
    pub writes: u64,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone)]
struct Pending {
    revision: u64,
    state: ProgressState,
}

enum Command {
    Flush(oneshot::Sender<Result<(), PersistenceError>>),
    Adopt(String),
}

pub struct CoalescingWriter {
    pending: watch::Sender<Option<Pending>>,
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<SyncStatus>,
    task: JoinHandle<()>,
}

impl CoalescingWriter {
    /// Spawns the writer task. `synced_revision` is the revision the store is
    /// already known to hold (the hydrated state).
    pub fn spawn(
        store: Arc<dyn ProgressStore>,
        target: WriteTarget,
        identity: RemoteIdentity,
        window: Duration,
        synced_revision: u64,
    ) -> Self {
        let (pending_tx, pending_rx) = watch::channel(None);
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let initial = SyncStatus {
            remote_id: match &identity {
                RemoteIdentity::Known(id) => Some(id.clone()),
                _ => None,
            },
            synced_revision,
            ..SyncStatus::default()
        };
        let (status_tx, status_rx) = watch::channel(initial);

        let worker = Worker {
            store,
            target,
            identity,
            window,
            pending: pending_rx,
            commands: command_rx,
            status: status_tx,
        };
        let task = tokio::spawn(worker.run());

        Self {
            pending: pending_tx,
            commands: command_tx,
            status: status_rx,
            task,
        }
    }

    /// Queues `state` as the latest version. Replaces anything not yet
    /// written and restarts the debounce window.
    pub fn schedule(&self, revision: u64, state: ProgressState) {
        self.pending.send_replace(Some(Pending { revision, state }));
    }

    /// Writes the latest queued state now and waits for the result.
    pub async fn flush(&self) -> Result<(), PersistenceError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(Command::Flush(reply_tx))
            .map_err(|_| PersistenceError::WriterClosed)?;
        reply_rx.await.map_err(|_| PersistenceError::WriterClosed)?
    }

    /// Records an id learned from a fetch so later writes update it.
    pub fn adopt_identity(&self, id: String) {
        if self.commands.send(Command::Adopt(id)).is_err() {
            debug!("Progress writer closed before identity could be adopted");
        }
    }

    pub fn status(&self) -> SyncStatus {
        self.status.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

struct Worker {
    store: Arc<dyn ProgressStore>,
    target: WriteTarget,
    identity: RemoteIdentity,
    window: Duration,
    pending: watch::Receiver<Option<Pending>>,
    commands: mpsc::UnboundedReceiver<Command>,
    status: watch::Sender<SyncStatus>,
}

impl Worker {
    async fn run(mut self) {
        let mut deadline: Option<Instant> = None;

        loop {
            tokio::select! {
                changed = self.pending.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    deadline = Some(Instant::now() + self.window);
                }
                command = self.commands.recv() => match command {
                    Some(Command::Flush(reply)) => {
                        deadline = None;
                        let result = self.write_latest().await;
                        let _ = reply.send(result);
                    }
                    Some(Command::Adopt(id)) => {
                        self.identity = RemoteIdentity::Known(id.clone());
                        self.status.send_modify(|s| s.remote_id = Some(id));
                    }
                    None => break,
                },
                () = sleep_until(deadline) => {
                    deadline = None;
                    // Failures are recorded in the status; the next change retries.
                    let _ = self.write_latest().await;
                }
            }
        }

        // The session is gone; persist whatever it left behind.
        if let Err(e) = self.write_latest().await {
            warn!(
                "Dropping unsaved progress for {} on {}: {e}",
                self.target.subject_id, self.target.instrument
            );
        }
    }

    /// Writes the most recent pending state if the store has not seen it yet.
    async fn write_latest(&mut self) -> Result<(), PersistenceError> {
        let latest = self.pending.borrow_and_update().clone();
        let Some(pending) = latest else {
            return Ok(());
        };
        if pending.revision <= self.status.borrow().synced_revision {
            return Ok(());
        }

        match self.persist(&pending.state).await {
            Ok(record) => {
                let id = record.id.ok_or(PersistenceError::MissingIdentity)?;
                debug!(
                    "Persisted revision {} of {} on {} as {id}",
                    pending.revision, self.target.subject_id, self.target.instrument
                );
                self.identity = RemoteIdentity::Known(id.clone());
                self.status.send_modify(|s| {
                    s.remote_id = Some(id);
                    s.synced_revision = s.synced_revision.max(pending.revision);
                    s.writes += 1;
                    s.last_error = None;
                });
                Ok(())
            }
            Err(e) => {
                warn!(
                    "Saving progress for {} on {} failed: {e}",
                    self.target.subject_id, self.target.instrument
                );
                self.status
                    .send_modify(|s| s.last_error = Some(e.to_string()));
                Err(e)
            }
        }
    }

    async fn persist(&self, state: &ProgressState) -> Result<ProgressRecord, PersistenceError> {
        match &self.identity {
            RemoteIdentity::Known(id) => self.store.update(id, &ProgressPatch::from(state)).await,
            RemoteIdentity::Absent => {
                let draft = NewProgress {
                    subject_id: self.target.subject_id.clone(),
                    instrument: self.target.instrument,
                    state: state.clone(),
                };
                let record = self.store.create(&draft).await?;
                info!(
                    "Created progress record for {} on {}",
                    self.target.subject_id, self.target.instrument
                );
                Ok(record)
            }
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => future::pending().await,
    }
}
