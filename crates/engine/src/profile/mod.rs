pub mod delta;
pub mod model;
pub mod store;

pub use delta::{delta, ChangedFinding, EvolutionSignal, ProfileDelta};
pub use model::{EntityEdge, EntityGraph, Profile};
pub use store::{MemoryProfileStore, ProfilePublisher, ProfileStore};
