//! The progression state machine. Every position change goes through
//! [`transition`]; nothing else assigns a `FlowState`.

use serde::Serialize;

use crate::catalog::GateName;
use crate::engine::error::ValidationError;
use crate::engine::gates::{GateEvaluator, GateFlags, NextStep};
use crate::engine::sequencer::QuestionSequencer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FlowState {
    Idle,
    InStep { index: usize },
    /// Questionnaire `gate` intercepted "next" from step `from`.
    InGate { gate: GateName, from: usize },
    Terminal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowEvent {
    /// Enter the sequence at a stored position.
    Start { index: usize, terminal: bool },
    Next,
    Previous,
    GateCompleted(GateName),
    Restart,
}

pub struct FlowContext<'a> {
    pub sequencer: &'a QuestionSequencer,
    pub gates: &'a GateEvaluator,
    pub flags: &'a GateFlags,
}

impl FlowState {
    /// Position reported to the rendering layer and written to storage.
    pub fn index(&self, sequencer: &QuestionSequencer) -> usize {
        match *self {
            FlowState::Idle => 0,
            FlowState::InStep { index } => index,
            FlowState::InGate { from, .. } => from,
            FlowState::Terminal => sequencer.last_index(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, FlowState::Terminal)
    }
}

pub fn transition(
    state: FlowState,
    event: FlowEvent,
    ctx: &FlowContext<'_>,
) -> Result<FlowState, ValidationError> {
    use FlowEvent as E;
    use FlowState as S;

    match (state, event) {
        (S::Idle, E::Start { terminal: true, .. }) => Ok(S::Terminal),
        (S::Idle, E::Start { index, .. }) => Ok(S::InStep {
            index: ctx.sequencer.clamp(index),
        }),
        // Already running: a late start is ignored.
        (current, E::Start { .. }) => Ok(current),

        (_, E::Restart) => Ok(S::InStep { index: 0 }),

        (S::Idle, _) => Err(ValidationError::NotStarted),

        (S::InStep { index }, E::Next) if ctx.sequencer.is_last(index) => Ok(S::Terminal),
        (S::InStep { index }, E::Next) => {
            match ctx
                .gates
                .next_allowed_step(index, ctx.flags, ctx.sequencer)
            {
                NextStep::Gate(gate) => Ok(S::InGate { gate, from: index }),
                NextStep::Step(next) => Ok(S::InStep { index: next }),
            }
        }
        (S::InGate { gate, .. }, E::Next) => Err(ValidationError::GatePending { gate }),
        (S::Terminal, E::Next) => Ok(S::Terminal),

        (S::InStep { index }, E::Previous) => Ok(S::InStep {
            index: ctx.sequencer.retreat(index),
        }),
        (S::InGate { from, .. }, E::Previous) => Ok(S::InStep { index: from }),
        (S::Terminal, E::Previous) => Ok(S::Terminal),

        (S::InGate { gate, .. }, E::GateCompleted(done)) if gate == done => {
            let target = ctx
                .gates
                .resume_target(gate)
                .ok_or(ValidationError::GateNotPending { gate })?;
            Ok(S::InStep {
                index: ctx.sequencer.clamp(target),
            })
        }
        (_, E::GateCompleted(gate)) => Err(ValidationError::GateNotPending { gate }),
    }
}
