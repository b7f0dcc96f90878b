pub mod audit;
pub mod config;
pub mod context;
pub mod error;
pub mod metrics;
pub mod types;

pub use audit::{AuditEvent, AuditLogger, AuditStore, MemoryAuditStore};
pub use config::{EngineConfig, GatewayConfig, ScreeningConfig};
pub use context::RequestContext;
pub use error::{Error, ErrorCode, ErrorContext, ErrorKind, Result};
pub use metrics::{MetricsRegistry, ScreeningMetrics};
pub use types::*;

// Re-export commonly used types from dependencies
pub use chrono::{DateTime, Utc};
pub use uuid::Uuid;
