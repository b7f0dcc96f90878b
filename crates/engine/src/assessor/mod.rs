pub mod confidence;
pub mod ingest;
pub mod inconsistency;

pub use confidence::{assess, expected_attributes, Assessment};
pub use inconsistency::detect_inconsistencies;
pub use ingest::facts_from_response;
