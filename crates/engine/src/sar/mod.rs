pub mod controller;
pub mod state;

pub use controller::{SarController, SarDecision, SarRunContext, SarThresholds};
pub use state::{CompletionReason, IterationRecord, SarPhase, SarState};
