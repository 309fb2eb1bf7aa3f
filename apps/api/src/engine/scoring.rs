#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

use serde::Serialize;

use crate::catalog::{Category, Instrument};

/// How "previous" undoes the score of the question being un-answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetreatPolicy {
    /// Subtract exactly the weight that was applied for that question.
    #[default]
    Exact,
    /// Subtract 1 regardless of the weight applied (legacy behaviour).
    FixedUnit,
}

impl RetreatPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            RetreatPolicy::Exact => "exact",
            RetreatPolicy::FixedUnit => "fixed_unit",
        }
    }
}

impl fmt::Display for RetreatPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RetreatPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exact" => Ok(RetreatPolicy::Exact),
            "fixed_unit" => Ok(RetreatPolicy::FixedUnit),
            other => Err(format!(
                "unknown retreat scoring '{other}' (expected 'exact' or 'fixed_unit')"
            )),
        }
    }
}

/// One accumulator per category, stored in enum order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreVector<C: Category> {
    values: Vec<u32>,
    _category: PhantomData<C>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryScore {
    pub category: &'static str,
    pub score: u32,
}

impl<C: Category> ScoreVector<C> {
    pub fn zeroed() -> Self {
        Self {
            values: vec![0; C::ALL.len()],
            _category: PhantomData,
        }
    }

    pub fn get(&self, category: C) -> u32 {
        self.values[category.position()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (C, u32)> + '_ {
        C::ALL.iter().copied().zip(self.values.iter().copied())
    }

    pub fn total(&self) -> u32 {
        self.values.iter().sum()
    }

    /// Highest-scoring category; ties go to the earliest in enum order.
    pub fn dominant(&self) -> Option<C> {
        let mut best: Option<(C, u32)> = None;
        for (category, value) in self.iter() {
            match best {
                Some((_, top)) if value <= top => {}
                _ => best = Some((category, value)),
            }
        }
        best.map(|(category, _)| category)
    }

    pub fn to_map(&self) -> BTreeMap<String, u32> {
        self.iter()
            .map(|(category, value)| (category.key().to_string(), value))
            .collect()
    }

    pub fn to_list(&self) -> Vec<CategoryScore> {
        self.iter()
            .map(|(category, score)| CategoryScore {
                category: category.key(),
                score,
            })
            .collect()
    }
}

/// Applies and reverses answer weights, keeping each category inside
/// `0..=questions_in_category * MAX_WEIGHT`.
#[derive(Debug, Clone)]
pub struct ScoreAccumulator<C: Category> {
    ceilings: Vec<u32>,
    _category: PhantomData<C>,
}

impl<C: Category> ScoreAccumulator<C> {
    pub fn for_instrument(instrument: &Instrument<C>) -> Self {
        Self {
            ceilings: C::ALL.iter().map(|c| instrument.ceiling(*c)).collect(),
            _category: PhantomData,
        }
    }

    pub fn ceiling(&self, category: C) -> u32 {
        self.ceilings[category.position()]
    }

    pub fn apply(&self, scores: &ScoreVector<C>, category: C, weight: u8) -> ScoreVector<C> {
        let mut next = scores.clone();
        let slot = &mut next.values[category.position()];
        *slot = slot
            .saturating_add(u32::from(weight))
            .min(self.ceiling(category));
        next
    }

    pub fn reverse(&self, scores: &ScoreVector<C>, category: C, weight: u8) -> ScoreVector<C> {
        let mut next = scores.clone();
        let slot = &mut next.values[category.position()];
        *slot = slot.saturating_sub(u32::from(weight));
        next
    }

    /// Rebuilds a vector from a stored map. Unknown keys are ignored, missing
    /// keys read as zero, and out-of-range values are clamped.
    pub fn from_map(&self, map: &BTreeMap<String, u32>) -> ScoreVector<C> {
        let mut scores = ScoreVector::zeroed();
        for (key, value) in map {
            if let Some(category) = C::from_key(key) {
                scores.values[category.position()] = (*value).min(self.ceiling(category));
            }
        }
        scores
    }
}
