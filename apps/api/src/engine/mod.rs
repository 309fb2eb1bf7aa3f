// Progression engine: sequencing, scoring, gating and the async session that
// persists it.

pub mod error;
pub mod flow;
pub mod gates;
pub mod progression;
pub mod registry;
pub mod scoring;
pub mod sequencer;
pub mod session;

pub use error::{EngineError, ValidationError};
pub use gates::GateAnswer;
pub use progression::{CompiledView, Progression, QuestionView, Snapshot};
pub use registry::{AnySession, SessionRegistry};
pub use scoring::RetreatPolicy;
pub use session::{ActionReport, Session, SessionEvent, SessionSettings, SessionSnapshot};
