use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::catalog::{GateName, InstrumentId, SubQuestionnaire};
use crate::engine::flow::FlowState;
use crate::engine::progression::Reconciliation;
use crate::engine::{
    ActionReport, AnySession, CompiledView, GateAnswer, QuestionView, SessionSnapshot,
};
use crate::errors::AppError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct SessionPath {
    pub instrument: String,
    pub subject: String,
}

impl SessionPath {
    fn instrument(&self) -> Result<InstrumentId, AppError> {
        self.instrument.parse().map_err(AppError::Config)
    }
}

#[derive(Deserialize)]
pub struct GatePath {
    pub instrument: String,
    pub subject: String,
    pub gate: String,
}

#[derive(Deserialize)]
pub struct AnswerRequest {
    pub weight: u8,
}

#[derive(Deserialize)]
pub struct GateCompletionRequest {
    pub answers: Vec<GateAnswer>,
}

#[derive(Serialize)]
pub struct CurrentQuestionResponse {
    pub state: FlowState,
    pub question: Option<QuestionView>,
    pub result: Option<CompiledView>,
}

#[derive(Serialize)]
pub struct RefreshResponse {
    /// `None` when the store could not be read; see `snapshot.fetch_error`.
    pub reconciliation: Option<Reconciliation>,
    pub snapshot: SessionSnapshot,
}

async fn live_session(state: &AppState, path: &SessionPath) -> Result<AnySession, AppError> {
    let instrument = path.instrument()?;
    state
        .sessions
        .get(instrument, &path.subject)
        .await
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "No open {instrument} session for '{}'",
                path.subject
            ))
        })
}

/// POST /api/v1/sessions/:instrument/:subject
pub async fn handle_open(
    State(state): State<AppState>,
    Path(path): Path<SessionPath>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let instrument = path.instrument()?;
    let session = state.sessions.open(instrument, &path.subject).await?;
    Ok(Json(session.snapshot().await))
}

/// GET /api/v1/sessions/:instrument/:subject
pub async fn handle_snapshot(
    State(state): State<AppState>,
    Path(path): Path<SessionPath>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let session = live_session(&state, &path).await?;
    Ok(Json(session.snapshot().await))
}

/// DELETE /api/v1/sessions/:instrument/:subject
pub async fn handle_close(
    State(state): State<AppState>,
    Path(path): Path<SessionPath>,
) -> Result<StatusCode, AppError> {
    let instrument = path.instrument()?;
    if state.sessions.close(instrument, &path.subject).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!(
            "No open {instrument} session for '{}'",
            path.subject
        )))
    }
}

/// GET /api/v1/sessions/:instrument/:subject/question
pub async fn handle_current_question(
    State(state): State<AppState>,
    Path(path): Path<SessionPath>,
) -> Result<Json<CurrentQuestionResponse>, AppError> {
    let session = live_session(&state, &path).await?;
    let snapshot = session.snapshot().await;
    Ok(Json(CurrentQuestionResponse {
        state: snapshot.progress.state,
        question: session.current_question().await,
        result: session.result().await,
    }))
}

/// POST /api/v1/sessions/:instrument/:subject/answer
pub async fn handle_answer(
    State(state): State<AppState>,
    Path(path): Path<SessionPath>,
    payload: Result<Json<AnswerRequest>, JsonRejection>,
) -> Result<Json<ActionReport>, AppError> {
    let Json(req) = payload?;
    let session = live_session(&state, &path).await?;
    Ok(Json(session.submit_answer(req.weight).await?))
}

/// POST /api/v1/sessions/:instrument/:subject/next
pub async fn handle_next(
    State(state): State<AppState>,
    Path(path): Path<SessionPath>,
) -> Result<Json<ActionReport>, AppError> {
    let session = live_session(&state, &path).await?;
    Ok(Json(session.next().await?))
}

/// POST /api/v1/sessions/:instrument/:subject/previous
pub async fn handle_previous(
    State(state): State<AppState>,
    Path(path): Path<SessionPath>,
) -> Result<Json<ActionReport>, AppError> {
    let session = live_session(&state, &path).await?;
    Ok(Json(session.go_to_previous().await?))
}

/// GET /api/v1/sessions/:instrument/:subject/gates/:gate
pub async fn handle_get_questionnaire(
    State(state): State<AppState>,
    Path(path): Path<GatePath>,
) -> Result<Json<&'static SubQuestionnaire>, AppError> {
    let (session, gate) = gate_session(&state, path).await?;
    session
        .questionnaire(gate)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Questionnaire {gate} is not part of this instrument")))
}

/// POST /api/v1/sessions/:instrument/:subject/gates/:gate
pub async fn handle_complete_gate(
    State(state): State<AppState>,
    Path(path): Path<GatePath>,
    payload: Result<Json<GateCompletionRequest>, JsonRejection>,
) -> Result<Json<ActionReport>, AppError> {
    let Json(req) = payload?;
    let (session, gate) = gate_session(&state, path).await?;
    Ok(Json(session.complete_gate(gate, &req.answers).await?))
}

/// POST /api/v1/sessions/:instrument/:subject/restart
pub async fn handle_restart(
    State(state): State<AppState>,
    Path(path): Path<SessionPath>,
) -> Result<Json<ActionReport>, AppError> {
    let session = live_session(&state, &path).await?;
    Ok(Json(session.restart().await?))
}

/// POST /api/v1/sessions/:instrument/:subject/refresh
/// Sent by the rendering layer when it becomes visible again. A failed fetch
/// is reported in the snapshot rather than as an error.
pub async fn handle_refresh(
    State(state): State<AppState>,
    Path(path): Path<SessionPath>,
) -> Result<Json<RefreshResponse>, AppError> {
    let session = live_session(&state, &path).await?;
    let reconciliation = session.refresh().await.ok();
    Ok(Json(RefreshResponse {
        reconciliation,
        snapshot: session.snapshot().await,
    }))
}

async fn gate_session(state: &AppState, path: GatePath) -> Result<(AnySession, GateName), AppError> {
    let gate = GateName::from_key(&path.gate)
        .ok_or_else(|| AppError::NotFound(format!("Unknown questionnaire '{}'", path.gate)))?;
    let session_path = SessionPath {
        instrument: path.instrument,
        subject: path.subject,
    };
    let session = live_session(state, &session_path).await?;
    Ok((session, gate))
}
