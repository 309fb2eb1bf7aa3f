//! CHASIDE vocational inventory: seven areas, five statements each.

use super::{interleave, Category, Instrument, InstrumentId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChasideArea {
    /// C: administrative and accounting
    Administrative,
    /// H: humanities and social sciences
    Humanities,
    /// A: arts
    Artistic,
    /// S: health sciences
    Health,
    /// I: engineering and technical studies
    Technical,
    /// D: defence and security
    Defense,
    /// E: exact and agricultural sciences
    Exact,
}

impl Category for ChasideArea {
    const ALL: &'static [Self] = &[
        ChasideArea::Administrative,
        ChasideArea::Humanities,
        ChasideArea::Artistic,
        ChasideArea::Health,
        ChasideArea::Technical,
        ChasideArea::Defense,
        ChasideArea::Exact,
    ];

    fn key(self) -> &'static str {
        match self {
            ChasideArea::Administrative => "C",
            ChasideArea::Humanities => "H",
            ChasideArea::Artistic => "A",
            ChasideArea::Health => "S",
            ChasideArea::Technical => "I",
            ChasideArea::Defense => "D",
            ChasideArea::Exact => "E",
        }
    }

    fn position(self) -> usize {
        self as usize
    }
}

const ADMINISTRATIVE: &[&str] = &[
    "I would accept a job managing the accounts of a company.",
    "I am organised with my money and keep track of expenses.",
    "I would like to plan the budget of an organisation.",
    "I enjoy filling in forms and keeping files in order.",
    "I am good at following rules and procedures.",
];

const HUMANITIES: &[&str] = &[
    "I like reading about history and different cultures.",
    "I would enjoy studying how societies are organised.",
    "I like debating ideas and defending my arguments.",
    "I would enjoy working as a journalist or a lawyer.",
    "I am interested in languages and how people communicate.",
];

const ARTISTIC: &[&str] = &[
    "I would enjoy designing clothes, sets or objects.",
    "I spend free time drawing, writing or making music.",
    "I would like to study fine arts or design.",
    "I notice colours, shapes and sounds others overlook.",
    "I would enjoy working in film, theatre or advertising.",
];

const HEALTH: &[&str] = &[
    "I would like to work curing or preventing illness.",
    "I am interested in how the human body works.",
    "I stay calm when someone near me gets hurt.",
    "I would enjoy studying medicine, nursing or nutrition.",
    "I like learning about healthy habits and first aid.",
];

const TECHNICAL: &[&str] = &[
    "I would enjoy designing machines or buildings.",
    "I like understanding how electronic devices work inside.",
    "I would like to study an engineering degree.",
    "I enjoy technical drawing or computer modelling.",
    "I like finding practical solutions to technical problems.",
];

const DEFENSE: &[&str] = &[
    "I would like a career protecting people and property.",
    "I handle pressure and emergencies well.",
    "I would enjoy training in a disciplined environment.",
    "I am interested in security, rescue or civil protection.",
    "I would accept working irregular hours to serve my community.",
];

const EXACT: &[&str] = &[
    "I enjoy solving problems with mathematics.",
    "I would like to work on farms, forests or the environment.",
    "I am curious about chemistry, physics or biology.",
    "I would enjoy improving crops or caring for livestock.",
    "I like carrying out precise measurements.",
];

pub fn instrument() -> Instrument<ChasideArea> {
    let banks = [
        (ChasideArea::Administrative, ADMINISTRATIVE),
        (ChasideArea::Humanities, HUMANITIES),
        (ChasideArea::Artistic, ARTISTIC),
        (ChasideArea::Health, HEALTH),
        (ChasideArea::Technical, TECHNICAL),
        (ChasideArea::Defense, DEFENSE),
        (ChasideArea::Exact, EXACT),
    ];
    Instrument::new(
        InstrumentId::Chaside,
        "CHASIDE vocational inventory",
        interleave(&banks),
        Vec::new(),
    )
}
