pub mod base;
pub mod fact;

pub use base::{ConnectionCandidate, ConnectionKind, KbSnapshot, KnowledgeBase};
pub use fact::{
    Fact, FactClaim, Gap, GapKind, Inconsistency, InconsistencyKind, ReconciliationStatus,
};
