pub mod degree;
pub mod screening;
pub mod store;

pub use degree::{
    BranchOutcome, BranchStatus, DegreeOrchestrator, InvestigationParams, InvestigationResult,
};
pub use screening::{
    ScreeningPhase, ScreeningRequest, ScreeningResult, ScreeningService, ScreeningStatus,
};
pub use store::{MemoryScreeningStateStore, ScreeningCheckpoint, ScreeningStateStore};
