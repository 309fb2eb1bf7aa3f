//! Live sessions keyed by (instrument, subject). Each instrument has its own
//! category type, so sessions are held behind a small closed enum.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::catalog::{
    chaside, holland, project_kit, ChasideArea, GateName, InstrumentId, RiasecCategory,
    SubQuestionnaire, Unscored,
};
use crate::engine::error::{EngineError, ValidationError};
use crate::engine::gates::GateAnswer;
use crate::engine::progression::{CompiledView, QuestionView, Reconciliation};
use crate::engine::session::{ActionReport, Session, SessionEvent, SessionSettings, SessionSnapshot};
use crate::sync::{PersistenceError, ProgressStore, TaskGuard};

#[derive(Clone)]
pub enum AnySession {
    Holland(Arc<Session<RiasecCategory>>),
    Chaside(Arc<Session<ChasideArea>>),
    ProjectKit(Arc<Session<Unscored>>),
}

macro_rules! dispatch {
    ($session:expr, $s:ident => $body:expr) => {
        match $session {
            AnySession::Holland($s) => $body,
            AnySession::Chaside($s) => $body,
            AnySession::ProjectKit($s) => $body,
        }
    };
}

impl AnySession {
    pub async fn open(
        instrument: InstrumentId,
        subject_id: &str,
        store: Arc<dyn ProgressStore>,
        settings: &SessionSettings,
    ) -> Result<Self, EngineError> {
        Ok(match instrument {
            InstrumentId::Holland => AnySession::Holland(
                Session::open(holland::instrument(), subject_id, store, settings).await?,
            ),
            InstrumentId::Chaside => AnySession::Chaside(
                Session::open(chaside::instrument(), subject_id, store, settings).await?,
            ),
            InstrumentId::ProjectKit => AnySession::ProjectKit(
                Session::open(project_kit::instrument(), subject_id, store, settings).await?,
            ),
        })
    }

    pub fn instrument_id(&self) -> InstrumentId {
        dispatch!(self, s => s.instrument_id())
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<SessionEvent> {
        dispatch!(self, s => s.subscribe())
    }

    pub fn questionnaire(&self, gate: GateName) -> Option<&'static SubQuestionnaire> {
        dispatch!(self, s => s.questionnaire(gate))
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        dispatch!(self, s => s.snapshot().await)
    }

    pub async fn current_question(&self) -> Option<QuestionView> {
        dispatch!(self, s => s.current_question().await)
    }

    pub async fn result(&self) -> Option<CompiledView> {
        dispatch!(self, s => s.result().await)
    }

    pub async fn submit_answer(&self, weight: u8) -> Result<ActionReport, ValidationError> {
        dispatch!(self, s => s.submit_answer(weight).await)
    }

    pub async fn next(&self) -> Result<ActionReport, ValidationError> {
        dispatch!(self, s => s.next().await)
    }

    pub async fn go_to_previous(&self) -> Result<ActionReport, ValidationError> {
        dispatch!(self, s => s.go_to_previous().await)
    }

    pub async fn complete_gate(
        &self,
        gate: GateName,
        answers: &[GateAnswer],
    ) -> Result<ActionReport, ValidationError> {
        dispatch!(self, s => s.complete_gate(gate, answers).await)
    }

    pub async fn restart(&self) -> Result<ActionReport, ValidationError> {
        dispatch!(self, s => s.restart().await)
    }

    pub async fn refresh(&self) -> Result<Reconciliation, PersistenceError> {
        dispatch!(self, s => s.refresh().await)
    }

    pub async fn close(&self) -> Result<(), PersistenceError> {
        dispatch!(self, s => s.close().await)
    }
}

type SessionKey = (InstrumentId, String);

struct Entry {
    session: AnySession,
    last_active: Instant,
}

pub struct SessionRegistry {
    store: Arc<dyn ProgressStore>,
    settings: SessionSettings,
    sessions: RwLock<HashMap<SessionKey, Entry>>,
    sweeper: OnceLock<TaskGuard>,
}

impl SessionRegistry {
    pub fn new(store: Arc<dyn ProgressStore>, settings: SessionSettings) -> Self {
        Self {
            store,
            settings,
            sessions: RwLock::new(HashMap::new()),
            sweeper: OnceLock::new(),
        }
    }

    /// Returns the live session for the pair, opening (and hydrating) one if
    /// needed. Opening twice yields the same session.
    pub async fn open(
        &self,
        instrument: InstrumentId,
        subject_id: &str,
    ) -> Result<AnySession, EngineError> {
        if let Some(existing) = self.get(instrument, subject_id).await {
            return Ok(existing);
        }

        // Hydrate without holding the lock; a concurrent open of the same
        // pair keeps whichever session was registered first.
        let opened =
            AnySession::open(instrument, subject_id, self.store.clone(), &self.settings).await?;
        let key = (instrument, subject_id.trim().to_string());
        let mut sessions = self.sessions.write().await;
        let entry = sessions.entry(key).or_insert(Entry {
            session: opened,
            last_active: Instant::now(),
        });
        Ok(entry.session.clone())
    }

    /// The live session for the pair, marking it as active.
    pub async fn get(&self, instrument: InstrumentId, subject_id: &str) -> Option<AnySession> {
        let key = (instrument, subject_id.trim().to_string());
        let mut sessions = self.sessions.write().await;
        let entry = sessions.get_mut(&key)?;
        entry.last_active = Instant::now();
        Some(entry.session.clone())
    }

    /// Flushes and forgets a session. `Ok(false)` if none was open.
    pub async fn close(
        &self,
        instrument: InstrumentId,
        subject_id: &str,
    ) -> Result<bool, PersistenceError> {
        let key = (instrument, subject_id.trim().to_string());
        let removed = self.sessions.write().await.remove(&key);
        match removed {
            Some(entry) => {
                entry.session.close().await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Closes and drops every session idle for at least `ttl`. Returns how
    /// many were removed.
    pub async fn sweep_idle(&self, ttl: Duration) -> usize {
        let now = Instant::now();
        let expired: Vec<(SessionKey, AnySession)> = {
            let mut sessions = self.sessions.write().await;
            let keys: Vec<SessionKey> = sessions
                .iter()
                .filter(|(_, entry)| now.duration_since(entry.last_active) >= ttl)
                .map(|(key, _)| key.clone())
                .collect();
            keys.into_iter()
                .filter_map(|key| sessions.remove(&key).map(|entry| (key, entry.session)))
                .collect()
        };

        for ((instrument, subject_id), session) in &expired {
            if let Err(e) = session.close().await {
                warn!("Could not save idle {instrument} session for {subject_id}: {e}");
            }
        }
        if !expired.is_empty() {
            info!("Closed {} idle sessions", expired.len());
        }
        expired.len()
    }

    /// Starts the background sweep for `settings.idle_timeout`. No-op when the
    /// timeout is zero or a sweep is already running. The task holds only a
    /// weak reference and stops with the registry.
    pub fn start_idle_sweep(self: &Arc<Self>) {
        let ttl = self.settings.idle_timeout;
        if ttl.is_zero() || self.sweeper.get().is_some() {
            return;
        }
        let every = (ttl / 2).max(Duration::from_secs(1));
        let registry: Weak<Self> = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + every, every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let Some(registry) = registry.upgrade() else {
                    debug!("Session registry dropped; stopping idle sweep");
                    break;
                };
                registry.sweep_idle(ttl).await;
            }
        });
        let _ = self.sweeper.set(TaskGuard::from(handle));
    }

    pub async fn close_all(&self) {
        let sessions: Vec<_> = self.sessions.write().await.drain().collect();
        info!("Closing {} open sessions", sessions.len());
        for ((instrument, subject_id), entry) in sessions {
            if let Err(e) = entry.session.close().await {
                warn!("Could not save {instrument} progress for {subject_id} on shutdown: {e}");
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}
