//! Gate sub-questionnaires. The set of gates is closed: each variant maps to
//! one questionnaire and one completion flag on the progress record.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateName {
    Q1,
    Q2,
    Q3,
}

impl GateName {
    pub const ALL: [GateName; 3] = [GateName::Q1, GateName::Q2, GateName::Q3];

    pub fn key(self) -> &'static str {
        match self {
            GateName::Q1 => "q1",
            GateName::Q2 => "q2",
            GateName::Q3 => "q3",
        }
    }

    /// Name of the boolean in a progress record's `completionFlags`.
    pub fn flag_key(self) -> &'static str {
        match self {
            GateName::Q1 => "q1Completed",
            GateName::Q2 => "q2Completed",
            GateName::Q3 => "q3Completed",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|g| g.key() == key)
    }

    pub fn from_flag_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|g| g.flag_key() == key)
    }

    pub fn questionnaire(self) -> &'static SubQuestionnaire {
        match self {
            GateName::Q1 => &SELF_ESTEEM,
            GateName::Q2 => &VALUES,
            GateName::Q3 => &DECISION_READINESS,
        }
    }
}

impl fmt::Display for GateName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Serialize)]
pub struct SubQuestionnaire {
    pub gate: GateName,
    pub title: &'static str,
    pub items: &'static [&'static str],
}

/// "Before entering `before_step`, questionnaire `gate` must be complete;
/// once it is, continue at `resume_at`."
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateDefinition {
    pub gate: GateName,
    pub before_step: usize,
    pub resume_at: usize,
}

static SELF_ESTEEM: SubQuestionnaire = SubQuestionnaire {
    gate: GateName::Q1,
    title: "Self-esteem check-in",
    items: &[
        "I feel that I have a number of good qualities.",
        "I am able to do things as well as most other people.",
        "I take a positive attitude toward myself.",
        "I feel I am a person of worth.",
        "On the whole, I am satisfied with myself.",
    ],
};

static VALUES: SubQuestionnaire = SubQuestionnaire {
    gate: GateName::Q2,
    title: "Work values inventory",
    items: &[
        "Earning a high income is important to me.",
        "I want a job that helps other people.",
        "Job stability matters more to me than variety.",
        "I want to keep learning throughout my career.",
        "Having free time for family and friends is essential.",
        "I want recognition for the work I do.",
    ],
};

static DECISION_READINESS: SubQuestionnaire = SubQuestionnaire {
    gate: GateName::Q3,
    title: "Decision readiness",
    items: &[
        "I know which options I am choosing between.",
        "I have compared the pros and cons of each option.",
        "I have talked about my choice with people I trust.",
        "I feel ready to commit to a decision.",
    ],
};
