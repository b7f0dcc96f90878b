pub mod model;
pub mod resolver;
pub mod store;

pub use model::{
    hash_identifier, EntityOperation, EntityOperationKind, EntityRecord, Subject, SubjectIdentifiers,
};
pub use resolver::{composite_score, normalized_similarity, EntityResolver, ResolutionOutcome};
pub use store::{EntityOperations, EntityStore, MemoryEntityStore};
