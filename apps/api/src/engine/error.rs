use thiserror::Error;

use crate::catalog::GateName;
use crate::sync::PersistenceError;

/// Local rejection of an action. Never reaches the network and never changes
/// session state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("answer all questions: questionnaire {gate} expects {expected} answers, got {received}")]
    IncompleteQuestionnaire {
        gate: GateName,
        expected: usize,
        received: usize,
    },

    #[error("questionnaire {gate} has no item {item}")]
    UnknownItem { gate: GateName, item: usize },

    #[error("item {item} of questionnaire {gate} was answered more than once")]
    DuplicateItem { gate: GateName, item: usize },

    #[error("weight {weight} is outside the 1-5 answer scale")]
    WeightOutOfRange { weight: u8 },

    #[error("questionnaire {gate} is not pending")]
    GateNotPending { gate: GateName },

    #[error("questionnaire {gate} must be completed first")]
    GatePending { gate: GateName },

    #[error("step {index} requires a weighted answer")]
    AnswerRequired { index: usize },

    #[error("step {index} does not take a weighted answer")]
    UnscoredStep { index: usize },

    #[error("session has not started")]
    NotStarted,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// Unrecoverable setup problem; the session cannot run.
    #[error("configuration error: {0}")]
    Config(String),
}
