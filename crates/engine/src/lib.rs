//! The investigation engine: compliance evaluation, entity resolution, the
//! Search-Assess-Refine loop, degree orchestration, the risk pipeline and
//! profile versioning.

pub mod assessor;
pub mod compliance;
pub mod entity;
pub mod knowledge;
pub mod orchestrator;
pub mod planner;
pub mod profile;
pub mod risk;
pub mod sar;

pub use compliance::{ComplianceEvaluator, ComplianceRule, MemoryComplianceRuleStore, Ruleset};
pub use entity::{EntityOperations, EntityResolver, EntityStore, MemoryEntityStore, Subject, SubjectIdentifiers};
pub use knowledge::{Fact, KnowledgeBase};
pub use orchestrator::{
    DegreeOrchestrator, MemoryScreeningStateStore, ScreeningPhase, ScreeningRequest,
    ScreeningService, ScreeningStateStore, ScreeningStatus,
};
pub use profile::{delta, EvolutionSignal, MemoryProfileStore, Profile, ProfileDelta, ProfilePublisher, ProfileStore};
pub use risk::{ComprehensiveRiskAssessment, Finding, Recommendation, RiskLevel, RiskPipeline};
pub use sar::{CompletionReason, SarController, SarPhase, SarState};
