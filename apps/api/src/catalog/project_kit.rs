//! Project Kit: the six-step guided life-project program. Steps are content
//! pages with no score; three of them sit behind mandatory questionnaires.

use super::questionnaires::{GateDefinition, GateName};
use super::{Instrument, InstrumentId, Unscored};

const STEPS: [&str; 6] = [
    "Who am I? Describe your personality, history and what matters to you.",
    "My strengths: list the abilities others recognise in you.",
    "My environment: map the people and resources around you.",
    "My options: shortlist the study and work paths you are considering.",
    "My decision: weigh your options and choose one.",
    "My action plan: set goals, deadlines and first steps.",
];

pub fn instrument() -> Instrument<Unscored> {
    let gates = vec![
        GateDefinition {
            gate: GateName::Q1,
            before_step: 1,
            resume_at: 1,
        },
        GateDefinition {
            gate: GateName::Q2,
            before_step: 3,
            resume_at: 3,
        },
        // The decision questionnaire already covers step 4's reflection, so
        // completing it lands on the action plan.
        GateDefinition {
            gate: GateName::Q3,
            before_step: 4,
            resume_at: 5,
        },
    ];
    Instrument::new(
        InstrumentId::ProjectKit,
        "Life project kit",
        STEPS.into_iter().map(|prompt| (None, prompt)),
        gates,
    )
}
