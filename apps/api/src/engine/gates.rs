use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;

use crate::catalog::{GateDefinition, GateName, MAX_WEIGHT, MIN_WEIGHT};
use crate::engine::error::ValidationError;
use crate::engine::sequencer::QuestionSequencer;

/// Completed gates. Monotonic within a session: flags are only ever added,
/// except by an explicit restart, which sets all of them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GateFlags {
    completed: BTreeSet<GateName>,
}

impl GateFlags {
    pub fn all_of(gates: impl IntoIterator<Item = GateName>) -> Self {
        Self {
            completed: gates.into_iter().collect(),
        }
    }

    pub fn is_completed(&self, gate: GateName) -> bool {
        self.completed.contains(&gate)
    }

    pub fn mark(&mut self, gate: GateName) {
        self.completed.insert(gate);
    }

    /// Union with `other`. Returns true if anything was added.
    pub fn merge(&mut self, other: &GateFlags) -> bool {
        let before = self.completed.len();
        self.completed.extend(other.completed.iter().copied());
        self.completed.len() != before
    }

    /// Reads `completionFlags` from a stored record. Unknown keys are ignored.
    pub fn from_map(map: &BTreeMap<String, bool>) -> Self {
        Self {
            completed: map
                .iter()
                .filter(|(_, done)| **done)
                .filter_map(|(key, _)| GateName::from_flag_key(key))
                .collect(),
        }
    }
}

/// One answer to a gate questionnaire item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct GateAnswer {
    pub item: usize,
    pub weight: u8,
}

/// Where "next" leads from a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextStep {
    Step(usize),
    Gate(GateName),
}

#[derive(Debug, Clone)]
pub struct GateEvaluator {
    definitions: Vec<GateDefinition>,
}

impl GateEvaluator {
    pub fn new(definitions: &[GateDefinition]) -> Self {
        Self {
            definitions: definitions.to_vec(),
        }
    }

    pub fn gates(&self) -> impl Iterator<Item = GateName> + '_ {
        self.definitions.iter().map(|d| d.gate)
    }

    pub fn has_gate(&self, gate: GateName) -> bool {
        self.definition(gate).is_some()
    }

    pub fn definition(&self, gate: GateName) -> Option<&GateDefinition> {
        self.definitions.iter().find(|d| d.gate == gate)
    }

    /// The gate guarding `step`, if it has one and it is still incomplete.
    pub fn should_intercept(&self, step: usize, flags: &GateFlags) -> Option<GateName> {
        self.definitions
            .iter()
            .find(|d| d.before_step == step && !flags.is_completed(d.gate))
            .map(|d| d.gate)
    }

    /// Where a completed gate lands. Not necessarily its guarded step.
    pub fn resume_target(&self, gate: GateName) -> Option<usize> {
        self.definition(gate).map(|d| d.resume_at)
    }

    pub fn next_allowed_step(
        &self,
        current: usize,
        flags: &GateFlags,
        sequencer: &QuestionSequencer,
    ) -> NextStep {
        let candidate = sequencer.advance(current);
        match self.should_intercept(candidate, flags) {
            Some(gate) if candidate != current => NextStep::Gate(gate),
            _ => NextStep::Step(candidate),
        }
    }

    /// One flag per configured gate, as written to `completionFlags`.
    pub fn flags_to_map(&self, flags: &GateFlags) -> BTreeMap<String, bool> {
        self.gates()
            .map(|g| (g.flag_key().to_string(), flags.is_completed(g)))
            .collect()
    }

    /// A questionnaire is complete when every item is answered exactly once on
    /// the 1-5 scale.
    pub fn validate(&self, gate: GateName, answers: &[GateAnswer]) -> Result<(), ValidationError> {
        let expected = gate.questionnaire().items.len();
        let mut seen = BTreeSet::new();
        for answer in answers {
            if answer.item >= expected {
                return Err(ValidationError::UnknownItem {
                    gate,
                    item: answer.item,
                });
            }
            if !(MIN_WEIGHT..=MAX_WEIGHT).contains(&answer.weight) {
                return Err(ValidationError::WeightOutOfRange {
                    weight: answer.weight,
                });
            }
            if !seen.insert(answer.item) {
                return Err(ValidationError::DuplicateItem {
                    gate,
                    item: answer.item,
                });
            }
        }
        if seen.len() != expected {
            return Err(ValidationError::IncompleteQuestionnaire {
                gate,
                expected,
                received: seen.len(),
            });
        }
        Ok(())
    }
}
