//! Holland / RIASEC interest inventory: 6 categories x 9 statements, answered
//! on a 1-5 agreement scale.

use super::{interleave, Category, Instrument, InstrumentId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RiasecCategory {
    Realistic,
    Investigative,
    Artistic,
    Social,
    Enterprising,
    Conventional,
}

impl Category for RiasecCategory {
    const ALL: &'static [Self] = &[
        RiasecCategory::Realistic,
        RiasecCategory::Investigative,
        RiasecCategory::Artistic,
        RiasecCategory::Social,
        RiasecCategory::Enterprising,
        RiasecCategory::Conventional,
    ];

    fn key(self) -> &'static str {
        match self {
            RiasecCategory::Realistic => "R",
            RiasecCategory::Investigative => "I",
            RiasecCategory::Artistic => "A",
            RiasecCategory::Social => "S",
            RiasecCategory::Enterprising => "E",
            RiasecCategory::Conventional => "C",
        }
    }

    fn position(self) -> usize {
        self as usize
    }
}

const REALISTIC: &[&str] = &[
    "I enjoy repairing electrical or mechanical devices.",
    "I like building things with my hands.",
    "I would enjoy working outdoors most of the day.",
    "I like operating tools and machinery.",
    "I enjoy taking care of plants or animals.",
    "I prefer practical tasks with visible results.",
    "I would like to work in construction or manufacturing.",
    "I enjoy assembling furniture or equipment from instructions.",
    "I like physical activities that require coordination.",
];

const INVESTIGATIVE: &[&str] = &[
    "I enjoy solving math or logic puzzles.",
    "I like understanding how natural phenomena work.",
    "I would enjoy running experiments in a laboratory.",
    "I like reading about scientific discoveries.",
    "I enjoy analysing data to find patterns.",
    "I like asking questions until I understand a problem fully.",
    "I would enjoy researching a topic for months.",
    "I like working out problems on my own.",
    "I enjoy learning how computers and software work.",
];

const ARTISTIC: &[&str] = &[
    "I enjoy drawing, painting or designing.",
    "I like writing stories, poems or songs.",
    "I would enjoy acting or performing in front of people.",
    "I like playing a musical instrument.",
    "I enjoy decorating spaces or choosing styles.",
    "I prefer tasks where I can express my own ideas.",
    "I like photography or making videos.",
    "I enjoy visiting museums, concerts or the theatre.",
    "I like inventing new ways of doing things.",
];

const SOCIAL: &[&str] = &[
    "I enjoy helping people solve personal problems.",
    "I like teaching or explaining things to others.",
    "I would enjoy working in a hospital or clinic.",
    "I like volunteering for community causes.",
    "I enjoy working as part of a team.",
    "I like listening to how other people feel.",
    "I would enjoy caring for children or the elderly.",
    "I like mediating when friends disagree.",
    "I enjoy organising activities that bring people together.",
];

const ENTERPRISING: &[&str] = &[
    "I enjoy leading a group towards a goal.",
    "I like persuading people to support my ideas.",
    "I would enjoy starting my own business.",
    "I like selling products or services.",
    "I enjoy taking risks to reach ambitious targets.",
    "I like negotiating agreements.",
    "I would enjoy managing a team or a project.",
    "I like speaking in public.",
    "I enjoy competing to be the best.",
];

const CONVENTIONAL: &[&str] = &[
    "I enjoy keeping records organised and up to date.",
    "I like following clear procedures.",
    "I would enjoy working with numbers and budgets.",
    "I like checking documents for errors.",
    "I enjoy planning schedules in detail.",
    "I like using spreadsheets and office software.",
    "I would enjoy working in an office with defined tasks.",
    "I like classifying and filing information.",
    "I enjoy tasks that require precision and order.",
];

pub fn instrument() -> Instrument<RiasecCategory> {
    let banks = [
        (RiasecCategory::Realistic, REALISTIC),
        (RiasecCategory::Investigative, INVESTIGATIVE),
        (RiasecCategory::Artistic, ARTISTIC),
        (RiasecCategory::Social, SOCIAL),
        (RiasecCategory::Enterprising, ENTERPRISING),
        (RiasecCategory::Conventional, CONVENTIONAL),
    ];
    Instrument::new(
        InstrumentId::Holland,
        "Holland interest inventory",
        interleave(&banks),
        Vec::new(),
    )
}
