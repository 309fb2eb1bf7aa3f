//! One live engine instance: a subject working through one instrument.
//!
//! The session owns the synchronous [`Progression`] behind a mutex, a
//! [`CoalescingWriter`] that persists it, and a periodic resync task. Actions
//! never wait on the network except when the assessment completes, which
//! flushes so the final answer is not lost.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::catalog::{Category, GateName, Instrument, InstrumentId, SubQuestionnaire};
use crate::engine::error::{EngineError, ValidationError};
use crate::engine::gates::GateAnswer;
use crate::engine::progression::{
    CompiledView, Outcome, Progression, QuestionView, Reconciliation, Snapshot,
};
use crate::engine::scoring::RetreatPolicy;
use crate::sync::loader::{spawn_resync, Resync};
use crate::sync::{
    CoalescingWriter, PersistenceError, ProgressStore, RemoteIdentity, ResumptionLoader,
    TaskGuard, SyncStatus, WriteTarget,
};

const EVENT_CAPACITY: usize = 16;

#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Quiet period before a burst of changes is written.
    pub debounce: Duration,
    /// Period of the background refresh. Zero disables it.
    pub resync_interval: Duration,
    pub retreat_policy: RetreatPolicy,
    /// Sessions untouched for this long are saved and dropped. Zero keeps
    /// them until closed.
    pub idle_timeout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(100),
            resync_interval: Duration::from_secs(300),
            retreat_policy: RetreatPolicy::Exact,
            idle_timeout: Duration::from_secs(1800),
        }
    }
}

/// Pushed to subscribers as the session moves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    GateRequired { gate: GateName },
    Completed { result: CompiledView },
    SyncFailed { message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub subject_id: String,
    #[serde(flatten)]
    pub progress: Snapshot,
    pub sync: SyncStatus,
    /// Last failed refresh, cleared by the next successful one.
    pub fetch_error: Option<String>,
}

/// Response to every action: the resulting state plus anything the rendering
/// layer has to react to.
#[derive(Debug, Clone, Serialize)]
pub struct ActionReport {
    pub snapshot: SessionSnapshot,
    pub gate_required: Option<GateName>,
    pub completed: Option<CompiledView>,
    pub sync_error: Option<String>,
}

struct Inner<C: Category> {
    progression: Progression<C>,
    fetch_error: Option<String>,
}

pub struct Session<C: Category> {
    subject_id: String,
    instrument: Arc<Instrument<C>>,
    inner: Mutex<Inner<C>>,
    writer: CoalescingWriter,
    loader: ResumptionLoader,
    events: broadcast::Sender<SessionEvent>,
    resync: OnceLock<TaskGuard>,
}

impl<C: Category> Session<C> {
    /// Hydrates the stored record for `subject_id` and starts the session at
    /// the resumed position. Fails if the store cannot be read, since starting
    /// blind would overwrite stored progress with the first save.
    pub async fn open(
        instrument: Instrument<C>,
        subject_id: &str,
        store: Arc<dyn ProgressStore>,
        settings: &SessionSettings,
    ) -> Result<Arc<Self>, EngineError> {
        let subject_id = subject_id.trim();
        if subject_id.is_empty() {
            return Err(EngineError::Config("subject id is missing".to_string()));
        }
        if instrument.len() == 0 {
            return Err(EngineError::Config(format!(
                "instrument {} has no steps",
                instrument.id
            )));
        }

        let instrument = Arc::new(instrument);
        let loader = ResumptionLoader::new(store.clone(), instrument.id);
        let mut progression = Progression::new(instrument.clone(), settings.retreat_policy);

        let identity = match loader.hydrate(subject_id).await? {
            Some(record) => {
                progression.reconcile(&record, progression.revision());
                match record.id {
                    Some(id) => RemoteIdentity::Known(id),
                    None => return Err(PersistenceError::MissingIdentity.into()),
                }
            }
            None => RemoteIdentity::Absent,
        };
        progression.start();

        let writer = CoalescingWriter::spawn(
            store,
            WriteTarget {
                subject_id: subject_id.to_string(),
                instrument: instrument.id,
            },
            identity,
            settings.debounce,
            progression.revision(),
        );

        info!(
            "Opened {} session for {} at step {} of {}{}",
            instrument.id,
            subject_id,
            progression.index(),
            instrument.len(),
            if progression.is_terminal() { " (completed)" } else { "" }
        );

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let session = Arc::new(Self {
            subject_id: subject_id.to_string(),
            instrument,
            inner: Mutex::new(Inner {
                progression,
                fetch_error: None,
            }),
            writer,
            loader,
            events,
            resync: OnceLock::new(),
        });

        if !settings.resync_interval.is_zero() {
            let guard = spawn_resync(Arc::downgrade(&session), settings.resync_interval);
            let _ = session.resync.set(guard);
        }
        Ok(session)
    }

    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    pub fn instrument_id(&self) -> InstrumentId {
        self.instrument.id
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// The step to render, or `None` while a questionnaire is open or after
    /// completion.
    pub async fn current_question(&self) -> Option<QuestionView> {
        self.inner.lock().await.progression.current_question()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let inner = self.inner.lock().await;
        self.snapshot_of(&inner)
    }

    pub async fn result(&self) -> Option<CompiledView> {
        let inner = self.inner.lock().await;
        inner.progression.compiled_result().map(|r| r.view())
    }

    /// Items of a questionnaire this instrument gates on.
    pub fn questionnaire(&self, gate: GateName) -> Option<&'static SubQuestionnaire> {
        self.instrument
            .gates()
            .iter()
            .any(|d| d.gate == gate)
            .then(|| gate.questionnaire())
    }

    pub async fn submit_answer(&self, weight: u8) -> Result<ActionReport, ValidationError> {
        self.act(|p| p.submit_answer(weight)).await
    }

    pub async fn next(&self) -> Result<ActionReport, ValidationError> {
        self.act(Progression::next).await
    }

    pub async fn go_to_previous(&self) -> Result<ActionReport, ValidationError> {
        self.act(Progression::go_to_previous).await
    }

    pub async fn complete_gate(
        &self,
        gate: GateName,
        answers: &[GateAnswer],
    ) -> Result<ActionReport, ValidationError> {
        self.act(|p| p.complete_gate(gate, answers)).await
    }

    pub async fn restart(&self) -> Result<ActionReport, ValidationError> {
        self.act(|p| Ok(p.restart())).await
    }

    /// Re-reads the stored record and reconciles against it. Called on a timer
    /// and when the rendering layer regains visibility. Local state the store
    /// has not acknowledged (e.g. a failed final save) is queued again.
    pub async fn refresh(&self) -> Result<Reconciliation, PersistenceError> {
        // The fetch may return after local changes or after a write issued
        // before it started; either way the fetched position is stale.
        let started_revision = self.inner.lock().await.progression.revision();
        let settled_at_start = self.writer.status().synced_revision >= started_revision;

        let fetched = self.loader.hydrate(&self.subject_id).await;
        let mut inner = self.inner.lock().await;
        let record = match fetched {
            Ok(record) => record,
            Err(e) => {
                inner.fetch_error = Some(e.to_string());
                return Err(e);
            }
        };
        inner.fetch_error = None;

        let status = self.writer.status();
        let mut report = Reconciliation::default();
        if let Some(record) = record {
            if status.remote_id.is_none() {
                if let Some(id) = &record.id {
                    self.writer.adopt_identity(id.clone());
                }
            }
            let synced = if settled_at_start {
                status.synced_revision.min(started_revision)
            } else {
                0
            };
            report = inner.progression.reconcile(&record, synced);
        }

        let progression = &inner.progression;
        if progression.revision() > status.synced_revision {
            self.writer.schedule(progression.revision(), progression.to_state());
        }
        debug!(
            "Refreshed {} on {}: {:?}",
            self.subject_id, self.instrument.id, report
        );
        Ok(report)
    }

    /// Writes anything pending and stops the background refresh.
    pub async fn close(&self) -> Result<(), PersistenceError> {
        if let Some(guard) = self.resync.get() {
            guard.stop();
        }
        self.writer.flush().await?;
        info!("Closed {} session for {}", self.instrument.id, self.subject_id);
        Ok(())
    }

    async fn act<F>(&self, action: F) -> Result<ActionReport, ValidationError>
    where
        F: FnOnce(&mut Progression<C>) -> Result<Outcome<C>, ValidationError>,
    {
        let (outcome, progress, fetch_error) = {
            let mut inner = self.inner.lock().await;
            let outcome = action(&mut inner.progression)?;
            // An unchanged action still retries a save the store never took.
            let unsaved = inner.progression.revision() > self.writer.status().synced_revision;
            if outcome.changed() || unsaved {
                let progression = &inner.progression;
                self.writer.schedule(progression.revision(), progression.to_state());
            }
            (outcome, inner.progression.snapshot(), inner.fetch_error.clone())
        };

        let mut report = ActionReport {
            snapshot: SessionSnapshot {
                subject_id: self.subject_id.clone(),
                progress,
                sync: SyncStatus::default(),
                fetch_error,
            },
            gate_required: None,
            completed: None,
            sync_error: None,
        };

        match outcome {
            Outcome::GateRequired(gate) => {
                report.gate_required = Some(gate);
                self.emit(SessionEvent::GateRequired { gate });
            }
            Outcome::Completed(result) => {
                let view = result.view();
                info!(
                    "{} completed {} with dominant {:?}",
                    self.subject_id, self.instrument.id, view.dominant
                );
                report.completed = Some(view.clone());
                self.emit(SessionEvent::Completed { result: view });
                if let Err(e) = self.writer.flush().await {
                    warn!(
                        "Final save for {} on {} failed: {e}",
                        self.subject_id, self.instrument.id
                    );
                    self.emit(SessionEvent::SyncFailed {
                        message: e.to_string(),
                    });
                }
            }
            Outcome::Moved { .. } | Outcome::Unchanged => {}
        }

        report.snapshot.sync = self.writer.status();
        report.sync_error = report.snapshot.sync.last_error.clone();
        Ok(report)
    }

    fn snapshot_of(&self, inner: &Inner<C>) -> SessionSnapshot {
        SessionSnapshot {
            subject_id: self.subject_id.clone(),
            progress: inner.progression.snapshot(),
            sync: self.writer.status(),
            fetch_error: inner.fetch_error.clone(),
        }
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine; HTTP callers read the action report instead.
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl<C: Category> Resync for Session<C> {
    async fn resync(&self) -> Result<(), PersistenceError> {
        self.refresh().await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{holland, project_kit, RiasecCategory, Unscored};
    use crate::engine::flow::FlowState;
    use crate::models::progress::{ProgressPatch, ProgressState};
    use crate::catalog::InstrumentId as Id;
    use crate::models::progress::{NewProgress, ProgressRecord};
    use crate::sync::testing::RecordingStore;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::Notify;
    use tokio::time;

    /// Reads the record immediately but holds the response until released,
    /// like a slow network round trip.
    #[derive(Default)]
    struct HeldFetchStore {
        inner: RecordingStore,
        hold: AtomicBool,
        release: Notify,
    }

    #[async_trait]
    impl ProgressStore for HeldFetchStore {
        async fn fetch(
            &self,
            subject_id: &str,
            instrument: Id,
        ) -> Result<Option<ProgressRecord>, PersistenceError> {
            let record = self.inner.fetch(subject_id, instrument).await;
            if self.hold.load(Ordering::SeqCst) {
                self.release.notified().await;
            }
            record
        }

        async fn create(&self, draft: &NewProgress) -> Result<ProgressRecord, PersistenceError> {
            self.inner.create(draft).await
        }

        async fn update(
            &self,
            id: &str,
            patch: &ProgressPatch,
        ) -> Result<ProgressRecord, PersistenceError> {
            self.inner.update(id, patch).await
        }
    }

    async fn open_held(store: &Arc<HeldFetchStore>) -> Arc<Session<RiasecCategory>> {
        store
            .inner
            .seed("user-1", Id::Holland, ProgressState::default())
            .await;
        Session::open(holland::instrument(), "user-1", store.clone(), &settings())
            .await
            .unwrap()
    }

    fn settings() -> SessionSettings {
        SessionSettings::default()
    }

    async fn open_holland(store: &Arc<RecordingStore>) -> Arc<Session<RiasecCategory>> {
        Session::open(holland::instrument(), "user-1", store.clone(), &settings())
            .await
            .unwrap()
    }

    async fn open_kit(store: &Arc<RecordingStore>) -> Arc<Session<Unscored>> {
        Session::open(project_kit::instrument(), "user-1", store.clone(), &settings())
            .await
            .unwrap()
    }

    fn answers_for(gate: GateName) -> Vec<GateAnswer> {
        (0..gate.questionnaire().items.len())
            .map(|item| GateAnswer { item, weight: 4 })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_answers_coalesce_into_one_write() {
        let store = Arc::new(RecordingStore::new());
        let session = open_holland(&store).await;
        for _ in 0..5 {
            session.submit_answer(4).await.unwrap();
        }
        assert_eq!(store.writes(), 0);
        time::sleep(Duration::from_millis(250)).await;

        assert_eq!(store.creates(), 1);
        assert_eq!(store.updates(), 0);
        let saved = store.latest("user-1", InstrumentId::Holland).await.unwrap();
        assert_eq!(saved.state.current_index, 5);
        assert_eq!(saved.state.answers[..5], [Some(4); 5]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_completion_flushes_once_and_later_answers_write_nothing() {
        let store = Arc::new(RecordingStore::new());
        let session = open_holland(&store).await;
        let mut events = session.subscribe();

        let mut last = None;
        for _ in 0..54 {
            last = Some(session.submit_answer(3).await.unwrap());
        }
        let report = last.unwrap();
        let completed = report.completed.unwrap();
        assert_eq!(completed.dominant, Some("R"));
        assert!(report.snapshot.progress.terminal);
        // Flushed before the report was returned.
        assert_eq!(store.creates(), 1);
        let saved = store.latest("user-1", InstrumentId::Holland).await.unwrap();
        assert!(saved.state.terminal);

        let again = session.submit_answer(5).await.unwrap();
        assert!(again.completed.is_none());
        time::sleep(Duration::from_millis(500)).await;
        assert_eq!(store.writes(), 1);
        assert_eq!(store.creates(), 1);

        assert!(matches!(
            events.recv().await.unwrap(),
            SessionEvent::Completed { .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_round_trip() {
        let store = Arc::new(RecordingStore::new());
        let first = open_holland(&store).await;
        for weight in [5, 1, 4, 2, 3, 5, 5] {
            first.submit_answer(weight).await.unwrap();
        }
        first.close().await.unwrap();
        let before = first.snapshot().await;

        let resumed = open_holland(&store).await;
        let after = resumed.snapshot().await;
        assert_eq!(after.progress.index, 7);
        assert_eq!(after.progress.scores, before.progress.scores);
        assert_eq!(after.progress.flags, before.progress.flags);
        assert_eq!(after.sync.remote_id, before.sync.remote_id);

        // Exact reversal survives the reload.
        resumed.go_to_previous().await.unwrap();
        let back = resumed.snapshot().await;
        let realistic = back
            .progress
            .scores
            .iter()
            .find(|s| s.category == RiasecCategory::Realistic.key())
            .unwrap();
        assert_eq!(realistic.score, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_resumes_terminal_record() {
        let store = Arc::new(RecordingStore::new());
        let mut scores = std::collections::BTreeMap::new();
        scores.insert("S".to_string(), 30);
        store
            .seed(
                "user-1",
                InstrumentId::Holland,
                ProgressState {
                    current_index: 53,
                    terminal: true,
                    scores,
                    ..Default::default()
                },
            )
            .await;
        let session = open_holland(&store).await;
        assert!(session.current_question().await.is_none());
        let result = session.result().await.unwrap();
        assert_eq!(result.dominant, Some("S"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_fails_when_store_unreachable() {
        let store = Arc::new(RecordingStore::new());
        store.fail_next(1);
        let opened =
            Session::open(holland::instrument(), "user-1", store.clone(), &settings()).await;
        assert!(matches!(opened, Err(EngineError::Persistence(_))));
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test]
    async fn test_open_rejects_missing_subject() {
        let store = Arc::new(RecordingStore::new());
        let opened = Session::open(holland::instrument(), "  ", store, &settings()).await;
        assert!(matches!(opened, Err(EngineError::Config(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_save_keeps_local_state_and_recovers() {
        let store = Arc::new(RecordingStore::new());
        let session = open_holland(&store).await;
        store.fail_next(1);
        session.submit_answer(4).await.unwrap();
        time::sleep(Duration::from_millis(250)).await;

        let snap = session.snapshot().await;
        assert_eq!(snap.progress.index, 1);
        assert!(snap.sync.last_error.is_some());

        let report = session.submit_answer(2).await.unwrap();
        assert!(report.sync_error.is_some());
        time::sleep(Duration::from_millis(250)).await;
        let snap = session.snapshot().await;
        assert!(snap.sync.last_error.is_none());
        assert_eq!(store.creates(), 1);
        let saved = store.latest("user-1", InstrumentId::Holland).await.unwrap();
        assert_eq!(saved.state.current_index, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gate_flow_and_rejected_completion() {
        let store = Arc::new(RecordingStore::new());
        let session = open_kit(&store).await;
        let mut events = session.subscribe();

        let report = session.next().await.unwrap();
        assert_eq!(report.gate_required, Some(GateName::Q1));
        assert_eq!(
            events.recv().await.unwrap(),
            SessionEvent::GateRequired { gate: GateName::Q1 }
        );
        time::sleep(Duration::from_millis(250)).await;
        let settled = store.writes();

        let partial = &answers_for(GateName::Q1)[..2];
        let err = session.complete_gate(GateName::Q1, partial).await.unwrap_err();
        assert!(matches!(err, ValidationError::IncompleteQuestionnaire { .. }));
        time::sleep(Duration::from_millis(250)).await;
        assert_eq!(store.writes(), settled);
        assert!(!session.snapshot().await.progress.flags["q1Completed"]);

        let done = session
            .complete_gate(GateName::Q1, &answers_for(GateName::Q1))
            .await
            .unwrap();
        assert_eq!(done.snapshot.progress.state, FlowState::InStep { index: 1 });
        time::sleep(Duration::from_millis(250)).await;
        let saved = store.latest("user-1", InstrumentId::ProjectKit).await.unwrap();
        assert_eq!(saved.state.completion_flags.get("q1Completed"), Some(&true));
        assert_eq!(saved.state.current_index, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_persists_forced_flags() {
        let store = Arc::new(RecordingStore::new());
        let session = open_kit(&store).await;
        session.restart().await.unwrap();
        time::sleep(Duration::from_millis(250)).await;

        let saved = store.latest("user-1", InstrumentId::ProjectKit).await.unwrap();
        assert_eq!(saved.state.current_index, 0);
        assert!(GateName::ALL
            .iter()
            .all(|g| saved.state.completion_flags.get(g.flag_key()) == Some(&true)));
        assert!(session.next().await.unwrap().gate_required.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_does_not_regress_unsynced_answers() {
        let store = Arc::new(RecordingStore::new());
        store
            .seed("user-1", InstrumentId::Holland, ProgressState::default())
            .await;
        let session = open_holland(&store).await;
        for _ in 0..3 {
            session.submit_answer(3).await.unwrap();
        }
        let report = session.refresh().await.unwrap();
        assert!(report.conflict);
        assert_eq!(session.snapshot().await.progress.index, 3);

        time::sleep(Duration::from_millis(250)).await;
        let saved = store.latest("user-1", InstrumentId::Holland).await.unwrap();
        assert_eq!(saved.state.current_index, 3);
        assert_eq!(store.creates(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_adopts_remote_progress_when_settled() {
        let store = Arc::new(RecordingStore::new());
        let session = open_holland(&store).await;
        session.submit_answer(2).await.unwrap();
        time::sleep(Duration::from_millis(250)).await;

        let id = session.snapshot().await.sync.remote_id.unwrap();
        let patch = ProgressPatch {
            current_index: Some(10),
            ..Default::default()
        };
        store.edit_remotely(&id, &patch).await;

        let report = session.refresh().await.unwrap();
        assert!(report.position_adopted);
        assert_eq!(session.snapshot().await.progress.index, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_failure_is_reported_not_fatal() {
        let store = Arc::new(RecordingStore::new());
        let session = open_holland(&store).await;
        store.fail_next(1);
        assert!(session.refresh().await.is_err());
        let snap = session.snapshot().await;
        assert!(snap.fetch_error.is_some());

        session.submit_answer(3).await.unwrap();
        session.refresh().await.unwrap();
        assert!(session.snapshot().await.fetch_error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_flushes_pending_answer() {
        let store = Arc::new(RecordingStore::new());
        let session = open_holland(&store).await;
        session.submit_answer(5).await.unwrap();
        session.close().await.unwrap();
        assert_eq!(store.writes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_questionnaire_only_for_configured_gates() {
        let store = Arc::new(RecordingStore::new());
        let kit = open_kit(&store).await;
        assert_eq!(kit.questionnaire(GateName::Q2).unwrap().gate, GateName::Q2);
        let holland = open_holland(&store).await;
        assert!(holland.questionnaire(GateName::Q1).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_fetch_does_not_undo_answers_made_while_it_was_in_flight() {
        let store = Arc::new(HeldFetchStore::default());
        let session = open_held(&store).await;

        store.hold.store(true, Ordering::SeqCst);
        let refreshing = tokio::spawn({
            let session = session.clone();
            async move { session.refresh().await }
        });
        time::sleep(Duration::from_millis(1)).await;

        for _ in 0..3 {
            session.submit_answer(4).await.unwrap();
        }
        time::sleep(Duration::from_millis(250)).await;
        let saved = store.inner.latest("user-1", Id::Holland).await.unwrap();
        assert_eq!(saved.state.current_index, 3);

        store.release.notify_one();
        let report = refreshing.await.unwrap().unwrap();
        assert!(!report.position_adopted);

        let snap = session.snapshot().await;
        assert_eq!(snap.progress.index, 3);
        assert_eq!(snap.progress.scores.iter().map(|s| s.score).sum::<u32>(), 12);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_fetch_ignored_when_write_was_pending_at_start() {
        let store = Arc::new(HeldFetchStore::default());
        let session = open_held(&store).await;
        for _ in 0..3 {
            session.submit_answer(2).await.unwrap();
        }

        // Fetch reads the old record before the debounced write lands.
        store.hold.store(true, Ordering::SeqCst);
        let refreshing = tokio::spawn({
            let session = session.clone();
            async move { session.refresh().await }
        });
        time::sleep(Duration::from_millis(250)).await;
        assert_eq!(session.snapshot().await.sync.synced_revision, 3);

        store.release.notify_one();
        let report = refreshing.await.unwrap().unwrap();
        assert!(!report.position_adopted);
        assert_eq!(session.snapshot().await.progress.index, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_final_save_is_retried_by_resync() {
        let store = Arc::new(RecordingStore::new());
        let fast_resync = SessionSettings {
            resync_interval: Duration::from_secs(1),
            ..SessionSettings::default()
        };
        let session = Session::open(holland::instrument(), "user-1", store.clone(), &fast_resync)
            .await
            .unwrap();
        for _ in 0..53 {
            session.submit_answer(3).await.unwrap();
        }
        store.fail_next(1);
        let report = session.submit_answer(3).await.unwrap();
        assert!(report.completed.is_some());
        assert!(report.sync_error.is_some());
        assert!(store.latest("user-1", Id::Holland).await.is_none());

        time::sleep(Duration::from_secs(3)).await;
        let saved = store.latest("user-1", Id::Holland).await.unwrap();
        assert!(saved.state.terminal);
        assert_eq!(store.creates(), 1);
        assert!(session.snapshot().await.sync.last_error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_final_save_is_retried_on_next_action() {
        let store = Arc::new(RecordingStore::new());
        let session = open_holland(&store).await;
        for _ in 0..53 {
            session.submit_answer(5).await.unwrap();
        }
        store.fail_next(1);
        session.submit_answer(5).await.unwrap();

        let again = session.submit_answer(1).await.unwrap();
        assert!(again.completed.is_none());
        time::sleep(Duration::from_millis(250)).await;
        let saved = store.latest("user-1", Id::Holland).await.unwrap();
        assert!(saved.state.terminal);
        assert_eq!(saved.state.current_index, 53);
    }
}
