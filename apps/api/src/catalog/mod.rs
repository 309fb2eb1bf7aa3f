// Instrument catalog: the static step sequences each assessment runs through.
// Sequences are fixed at compile time; nothing here is mutated at runtime.

pub mod chaside;
pub mod holland;
pub mod project_kit;
pub mod questionnaires;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use chaside::ChasideArea;
pub use holland::RiasecCategory;
pub use questionnaires::{GateDefinition, GateName, SubQuestionnaire};

/// Smallest answer weight accepted on a scored step or gate item.
pub const MIN_WEIGHT: u8 = 1;
/// Largest answer weight accepted on a scored step or gate item.
pub const MAX_WEIGHT: u8 = 5;

/// A closed set of score categories. `ALL` fixes the enum order, which is also
/// the tie-break order when picking a dominant category.
pub trait Category: Copy + Eq + fmt::Debug + Send + Sync + 'static {
    const ALL: &'static [Self];

    /// Stable key used on the wire (`scores` map of a progress record).
    fn key(self) -> &'static str;

    /// Position of this category inside `ALL`.
    fn position(self) -> usize;

    fn from_key(key: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.key() == key)
    }
}

/// Category type for instruments whose steps carry no score (Project Kit).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Unscored {}

impl Category for Unscored {
    const ALL: &'static [Self] = &[];

    fn key(self) -> &'static str {
        match self {}
    }

    fn position(self) -> usize {
        match self {}
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentId {
    Holland,
    Chaside,
    ProjectKit,
}

impl InstrumentId {
    pub const ALL: [InstrumentId; 3] = [
        InstrumentId::Holland,
        InstrumentId::Chaside,
        InstrumentId::ProjectKit,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            InstrumentId::Holland => "holland",
            InstrumentId::Chaside => "chaside",
            InstrumentId::ProjectKit => "project_kit",
        }
    }
}

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstrumentId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        InstrumentId::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| format!("unknown instrument '{s}'"))
    }
}

/// One position in an instrument's sequence. Scored steps carry a category;
/// content steps (Project Kit) carry none and are passed with "next".
#[derive(Debug, Clone)]
pub struct Step<C: Category> {
    pub index: usize,
    pub category: Option<C>,
    pub prompt: &'static str,
}

impl<C: Category> Step<C> {
    pub fn is_scored(&self) -> bool {
        self.category.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct Instrument<C: Category> {
    pub id: InstrumentId,
    pub title: &'static str,
    steps: Vec<Step<C>>,
    gates: Vec<GateDefinition>,
}

impl<C: Category> Instrument<C> {
    /// Builds an instrument from prompts in sequence order. Indices are
    /// assigned here so they always match the position in the sequence.
    pub fn new(
        id: InstrumentId,
        title: &'static str,
        prompts: impl IntoIterator<Item = (Option<C>, &'static str)>,
        gates: Vec<GateDefinition>,
    ) -> Self {
        let steps = prompts
            .into_iter()
            .enumerate()
            .map(|(index, (category, prompt))| Step {
                index,
                category,
                prompt,
            })
            .collect();
        Self {
            id,
            title,
            steps,
            gates,
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn step(&self, index: usize) -> Option<&Step<C>> {
        self.steps.get(index)
    }

    pub fn steps(&self) -> &[Step<C>] {
        &self.steps
    }

    pub fn gates(&self) -> &[GateDefinition] {
        &self.gates
    }

    pub fn questions_in(&self, category: C) -> usize {
        self.steps
            .iter()
            .filter(|s| s.category == Some(category))
            .count()
    }

    /// Highest score a category can legitimately reach.
    pub fn ceiling(&self, category: C) -> u32 {
        self.questions_in(category) as u32 * u32::from(MAX_WEIGHT)
    }
}

/// Interleaves per-category item banks round by round, so consecutive
/// questions rotate through the categories in enum order.
pub(crate) fn interleave<C: Category>(
    banks: &[(C, &'static [&'static str])],
) -> Vec<(Option<C>, &'static str)> {
    let rounds = banks.iter().map(|(_, items)| items.len()).max().unwrap_or(0);
    let mut out = Vec::new();
    for round in 0..rounds {
        for (category, items) in banks {
            if let Some(prompt) = items.get(round) {
                out.push((Some(*category), *prompt));
            }
        }
    }
    out
}
