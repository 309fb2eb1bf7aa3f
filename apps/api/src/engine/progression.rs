#![allow(dead_code)]

//! Synchronous progression core: sequencing, scoring, gating and
//! reconciliation for one subject on one instrument.
//!
//! Every local mutation bumps `revision`. The persistence layer acknowledges
//! revisions as they are written, which is how reconciliation tells a settled
//! session from one with writes still pending.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::catalog::{Category, GateName, Instrument, InstrumentId, Step, MAX_WEIGHT, MIN_WEIGHT};
use crate::engine::error::ValidationError;
use crate::engine::flow::{transition, FlowContext, FlowEvent, FlowState};
use crate::engine::gates::{GateAnswer, GateEvaluator, GateFlags};
use crate::engine::scoring::{CategoryScore, RetreatPolicy, ScoreAccumulator, ScoreVector};
use crate::engine::sequencer::QuestionSequencer;
use crate::models::progress::{ProgressRecord, ProgressState};

/// Terminal result handed to downstream consumers (AI recommendations, charts).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledResult<C: Category> {
    pub dominant: Option<C>,
    pub scores: ScoreVector<C>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompiledView {
    pub dominant: Option<&'static str>,
    pub scores: Vec<CategoryScore>,
}

impl<C: Category> CompiledResult<C> {
    pub fn view(&self) -> CompiledView {
        CompiledView {
            dominant: self.dominant.map(Category::key),
            scores: self.scores.to_list(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<C: Category> {
    Moved { from: usize, to: usize },
    GateRequired(GateName),
    Completed(CompiledResult<C>),
    /// Nothing changed (e.g. an answer after the end); nothing to persist.
    Unchanged,
}

impl<C: Category> Outcome<C> {
    pub fn changed(&self) -> bool {
        !matches!(self, Outcome::Unchanged)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionView {
    pub index: usize,
    pub total: usize,
    pub category: Option<&'static str>,
    pub scored: bool,
    pub prompt: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub instrument: InstrumentId,
    pub state: FlowState,
    pub index: usize,
    pub total: usize,
    pub scores: Vec<CategoryScore>,
    pub flags: BTreeMap<&'static str, bool>,
    pub terminal: bool,
    pub revision: u64,
}

/// What reconciling against a fetched record did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    pub flags_merged: bool,
    pub position_adopted: bool,
    /// Remote position differed but local state was kept.
    pub conflict: bool,
    /// Local flags are ahead of the remote record and should be written back.
    pub needs_push: bool,
}

pub struct Progression<C: Category> {
    instrument: Arc<Instrument<C>>,
    sequencer: QuestionSequencer,
    accumulator: ScoreAccumulator<C>,
    gates: GateEvaluator,
    policy: RetreatPolicy,
    state: FlowState,
    scores: ScoreVector<C>,
    answers: Vec<Option<u8>>,
    flags: GateFlags,
    revision: u64,
}

impl<C: Category> Progression<C> {
    pub fn new(instrument: Arc<Instrument<C>>, policy: RetreatPolicy) -> Self {
        let len = instrument.len();
        Self {
            sequencer: QuestionSequencer::new(len),
            accumulator: ScoreAccumulator::for_instrument(&instrument),
            gates: GateEvaluator::new(instrument.gates()),
            instrument,
            policy,
            state: FlowState::Idle,
            scores: ScoreVector::zeroed(),
            answers: vec![None; len],
            flags: GateFlags::default(),
            revision: 0,
        }
    }

    pub fn state(&self) -> FlowState {
        self.state
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn scores(&self) -> &ScoreVector<C> {
        &self.scores
    }

    pub fn flags(&self) -> &GateFlags {
        &self.flags
    }

    pub fn index(&self) -> usize {
        self.state.index(&self.sequencer)
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn gates(&self) -> &GateEvaluator {
        &self.gates
    }

    /// Leaves `Idle` at the current position. No-op once running.
    pub fn start(&mut self) -> FlowState {
        let event = FlowEvent::Start {
            index: 0,
            terminal: false,
        };
        if let Ok(next) = self.step(event) {
            self.state = next;
        }
        self.state
    }

    /// The step to render, if the session is sitting on one.
    pub fn current_step(&self) -> Option<&Step<C>> {
        match self.state {
            FlowState::InStep { index } => self.instrument.step(index),
            _ => None,
        }
    }

    pub fn current_question(&self) -> Option<QuestionView> {
        self.current_step().map(|step| QuestionView {
            index: step.index,
            total: self.instrument.len(),
            category: step.category.map(Category::key),
            scored: step.is_scored(),
            prompt: step.prompt,
        })
    }

    pub fn submit_answer(&mut self, weight: u8) -> Result<Outcome<C>, ValidationError> {
        let index = match self.state {
            FlowState::Terminal => return Ok(Outcome::Unchanged),
            FlowState::Idle => return Err(ValidationError::NotStarted),
            FlowState::InGate { gate, .. } => return Err(ValidationError::GatePending { gate }),
            FlowState::InStep { index } => index,
        };
        let category = self
            .instrument
            .step(index)
            .and_then(|s| s.category)
            .ok_or(ValidationError::UnscoredStep { index })?;
        if !(MIN_WEIGHT..=MAX_WEIGHT).contains(&weight) {
            return Err(ValidationError::WeightOutOfRange { weight });
        }

        let next = self.step(FlowEvent::Next)?;
        if self.policy == RetreatPolicy::Exact {
            if let Some(stale) = self.answers[index].take() {
                self.scores = self.accumulator.reverse(&self.scores, category, stale);
            }
        }
        self.scores = self.accumulator.apply(&self.scores, category, weight);
        self.answers[index] = Some(weight);
        Ok(self.commit(index, next))
    }

    /// Advances past a content step. Scored steps must be answered instead.
    pub fn next(&mut self) -> Result<Outcome<C>, ValidationError> {
        if let FlowState::InStep { index } = self.state {
            if self.instrument.step(index).is_some_and(Step::is_scored) {
                return Err(ValidationError::AnswerRequired { index });
            }
        }
        if self.is_terminal() {
            return Ok(Outcome::Unchanged);
        }
        let from = self.index();
        let next = self.step(FlowEvent::Next)?;
        Ok(self.commit(from, next))
    }

    pub fn go_to_previous(&mut self) -> Result<Outcome<C>, ValidationError> {
        let state = self.state;
        let from = match state {
            FlowState::Idle => return Err(ValidationError::NotStarted),
            FlowState::Terminal | FlowState::InStep { index: 0 } => return Ok(Outcome::Unchanged),
            FlowState::InGate { from, .. } => from,
            FlowState::InStep { index } => {
                self.unanswer(self.sequencer.retreat(index));
                index
            }
        };
        let next = self.step(FlowEvent::Previous)?;
        Ok(self.commit(from, next))
    }

    /// Validates the questionnaire answers, marks the gate done and moves to
    /// its resume step. On error nothing changes.
    pub fn complete_gate(
        &mut self,
        gate: GateName,
        answers: &[GateAnswer],
    ) -> Result<Outcome<C>, ValidationError> {
        let from = match self.state {
            FlowState::InGate { gate: pending, from } if pending == gate => from,
            _ => return Err(ValidationError::GateNotPending { gate }),
        };
        self.gates.validate(gate, answers)?;
        let next = self.step(FlowEvent::GateCompleted(gate))?;
        self.flags.mark(gate);
        Ok(self.commit(from, next))
    }

    /// Back to the first step with a clean score. Every gate is marked done
    /// so completed questionnaires are not asked again.
    pub fn restart(&mut self) -> Outcome<C> {
        let from = self.index();
        self.scores = ScoreVector::zeroed();
        self.answers = vec![None; self.instrument.len()];
        self.flags = GateFlags::all_of(self.gates.gates());
        self.state = FlowState::InStep { index: 0 };
        self.revision += 1;
        Outcome::Moved { from, to: 0 }
    }

    pub fn compiled_result(&self) -> Option<CompiledResult<C>> {
        self.is_terminal().then(|| CompiledResult {
            dominant: self.scores.dominant(),
            scores: self.scores.clone(),
        })
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            instrument: self.instrument.id,
            state: self.state,
            index: self.index(),
            total: self.instrument.len(),
            scores: self.scores.to_list(),
            flags: self
                .gates
                .gates()
                .map(|g| (g.flag_key(), self.flags.is_completed(g)))
                .collect(),
            terminal: self.is_terminal(),
            revision: self.revision,
        }
    }

    /// The record body for the current local state.
    pub fn to_state(&self) -> ProgressState {
        ProgressState {
            current_index: self.index(),
            scores: self.scores.to_map(),
            completion_flags: self.gates.flags_to_map(&self.flags),
            terminal: self.is_terminal(),
            answers: self.answers.clone(),
        }
    }

    /// Merges a fetched record into local state. Flags always merge. The
    /// position (index, scores, answers, terminal) is taken from the remote
    /// record only when no questionnaire is open and every local revision has
    /// been acknowledged by the writer (`synced_revision`).
    pub fn reconcile(&mut self, remote: &ProgressRecord, synced_revision: u64) -> Reconciliation {
        let remote_flags = GateFlags::from_map(&remote.state.completion_flags);
        let mut outcome = Reconciliation {
            flags_merged: self.flags.merge(&remote_flags),
            ..Reconciliation::default()
        };
        outcome.needs_push = self.flags != remote_flags;

        let remote_state = self.remote_position(&remote.state);
        let remote_scores = self.accumulator.from_map(&remote.state.scores);
        let diverged = remote_state != self.state || remote_scores != self.scores;
        let in_gate = matches!(self.state, FlowState::InGate { .. });
        let unsynced = self.revision > synced_revision;

        if diverged && (in_gate || unsynced) {
            debug!(
                instrument = %self.instrument.id,
                local = ?self.state,
                remote = ?remote_state,
                in_gate,
                unsynced,
                "Keeping local position over fetched record"
            );
            outcome.conflict = true;
        } else if diverged {
            self.state = remote_state;
            self.scores = remote_scores;
            self.answers = vec![None; self.instrument.len()];
            for (slot, stored) in self.answers.iter_mut().zip(&remote.state.answers) {
                *slot = stored.filter(|w| (MIN_WEIGHT..=MAX_WEIGHT).contains(w));
            }
            outcome.position_adopted = true;
        }

        // Merged flags the store lacks make a new local version to write back.
        if outcome.needs_push {
            self.revision += 1;
        }
        outcome
    }

    fn remote_position(&self, remote: &ProgressState) -> FlowState {
        if remote.terminal {
            FlowState::Terminal
        } else {
            FlowState::InStep {
                index: self.sequencer.clamp(remote.current_index),
            }
        }
    }

    /// Reverses the score of the question at `index` when leaving it via
    /// "previous".
    fn unanswer(&mut self, index: usize) {
        let Some(category) = self.instrument.step(index).and_then(|s| s.category) else {
            return;
        };
        let stored = self.answers[index].take();
        let weight = match (self.policy, stored) {
            (RetreatPolicy::Exact, Some(weight)) => weight,
            (RetreatPolicy::Exact, None) => {
                warn!(
                    instrument = %self.instrument.id,
                    index,
                    "No stored weight for question; reversing a single point"
                );
                1
            }
            (RetreatPolicy::FixedUnit, _) => 1,
        };
        self.scores = self.accumulator.reverse(&self.scores, category, weight);
    }

    fn step(&self, event: FlowEvent) -> Result<FlowState, ValidationError> {
        let ctx = FlowContext {
            sequencer: &self.sequencer,
            gates: &self.gates,
            flags: &self.flags,
        };
        transition(self.state, event, &ctx)
    }

    fn commit(&mut self, from: usize, next: FlowState) -> Outcome<C> {
        self.state = next;
        self.revision += 1;
        match next {
            FlowState::Terminal => Outcome::Completed(CompiledResult {
                dominant: self.scores.dominant(),
                scores: self.scores.clone(),
            }),
            FlowState::InGate { gate, .. } => Outcome::GateRequired(gate),
            _ => Outcome::Moved {
                from,
                to: self.index(),
            },
        }
    }
}
