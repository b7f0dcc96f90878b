//! # Error Handling Framework
//!
//! Structured error management for the screening platform:
//!
//! - **Stable error codes** grouped by numeric range (`ErrorCode`)
//! - **Taxonomy kinds** surfaced to callers: validation, permission,
//!   compliance_violation, provider, system (`ErrorKind`)
//! - **Rich context**: every error carries the correlation id of the request
//!   that produced it (`ErrorContext`)
//! - **Severity classification** and retryability used by the gateway's
//!   retry policy and the audit log
//!
//! Compliance violations are never silently suppressed: they surface as
//! errors here and are additionally written to the audit stream by the
//! compliance gate.

pub mod codes;
pub mod context;
pub mod framework;

pub use codes::{ErrorCode, ErrorKind};
pub use context::ErrorContext;
pub use framework::{Error, ErrorSeverity, Result};
