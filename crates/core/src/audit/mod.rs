pub mod chain;
pub mod event;
pub mod logger;
pub mod store;

pub use chain::{chain_hash, verify_chain, ChainBreak};
pub use event::{AuditEvent, AuditEventBuilder, EventOutcome, EventSeverity, EventType};
pub use logger::AuditLogger;
pub use store::{AuditFilter, AuditStore, MemoryAuditStore};
