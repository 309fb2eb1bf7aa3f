use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::InstrumentId;

/// Progress record as held by the remote progress API. `id` is absent until
/// the first create succeeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub subject_id: String,
    pub instrument: InstrumentId,
    #[serde(flatten)]
    pub state: ProgressState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// The mutable part of a progress record: everything the engine writes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressState {
    #[serde(default)]
    pub current_index: usize,
    #[serde(default)]
    pub scores: BTreeMap<String, u32>,
    #[serde(default)]
    pub completion_flags: BTreeMap<String, bool>,
    #[serde(default)]
    pub terminal: bool,
    /// Weight applied for each question, by index. Older records lack it.
    #[serde(default)]
    pub answers: Vec<Option<u8>>,
}

/// Body of `POST /progress`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProgress {
    pub subject_id: String,
    pub instrument: InstrumentId,
    #[serde(flatten)]
    pub state: ProgressState,
}

/// Body of `PUT /progress/{id}`. Absent fields are left untouched remotely.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scores: Option<BTreeMap<String, u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_flags: Option<BTreeMap<String, bool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminal: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answers: Option<Vec<Option<u8>>>,
}

impl From<&ProgressState> for ProgressPatch {
    fn from(state: &ProgressState) -> Self {
        Self {
            current_index: Some(state.current_index),
            scores: Some(state.scores.clone()),
            completion_flags: Some(state.completion_flags.clone()),
            terminal: Some(state.terminal),
            answers: Some(state.answers.clone()),
        }
    }
}

impl ProgressPatch {
    /// Applies the present fields onto `state`.
    pub fn apply_to(&self, state: &mut ProgressState) {
        if let Some(index) = self.current_index {
            state.current_index = index;
        }
        if let Some(scores) = &self.scores {
            state.scores = scores.clone();
        }
        if let Some(flags) = &self.completion_flags {
            state.completion_flags = flags.clone();
        }
        if let Some(terminal) = self.terminal {
            state.terminal = terminal;
        }
        if let Some(answers) = &self.answers {
            state.answers = answers.clone();
        }
    }
}
