use super::{ErrorCode, ErrorContext, ErrorKind};
use crate::context::RequestContext;
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

pub type Result<T> = std::result::Result<T, Error>;

/// Severity levels for errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    /// Low priority errors that don't affect system functionality
    Low,
    /// Medium priority errors that may degrade a screening
    Medium,
    /// High priority errors that affect core functionality
    High,
    /// Critical errors that require immediate attention
    Critical,
}

/// Main error type for the screening platform.
#[derive(Debug, ThisError, Clone)]
#[error("{}", display_message(.code, .message, .details))]
pub struct Error {
    /// Standardized error code
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Optional detailed description
    pub details: Option<String>,
    /// Error context for debugging; carries the correlation id
    pub context: ErrorContext,
    /// Error severity
    pub severity: ErrorSeverity,
    /// Optional cause chain
    #[source]
    pub cause: Option<Box<Error>>,
}

fn display_message(code: &ErrorCode, message: &str, details: &Option<String>) -> String {
    match details {
        Some(details) => format!("[{}] {}: {}", code, message, details),
        None => format!("[{}] {}", code, message),
    }
}

impl Error {
    /// Create a new error
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            context: ErrorContext::new(),
            severity: Self::default_severity_for_code(code),
            cause: None,
        }
    }

    /// Create error with details
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Set error context
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = context;
        self
    }

    /// Scope the error to a request, filling correlation and tenant ids.
    pub fn in_request(mut self, ctx: &RequestContext) -> Self {
        self.context.correlation_id = Some(ctx.correlation_id.clone());
        self.context.tenant_id = Some(ctx.tenant_id.to_string());
        self
    }

    /// Set error severity
    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.severity = severity;
        self
    }

    /// Chain with another error as cause
    pub fn with_cause(mut self, cause: Error) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Add trace to context
    pub fn add_trace(mut self, trace: impl Into<String>) -> Self {
        self.context = self.context.add_trace(trace.into());
        self
    }

    /// Add metadata to context
    pub fn add_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.context.add_metadata(key.into(), value);
        self
    }

    /// Taxonomy kind of this error.
    pub fn kind(&self) -> ErrorKind {
        self.code.kind()
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }

    /// Check if should be logged as error level
    pub fn should_log_as_error(&self) -> bool {
        self.code.should_log_as_error()
            || matches!(self.severity, ErrorSeverity::High | ErrorSeverity::Critical)
    }

    /// Get default severity for error code
    fn default_severity_for_code(code: ErrorCode) -> ErrorSeverity {
        match code {
            ErrorCode::ValidationFailed
            | ErrorCode::InvalidInput
            | ErrorCode::MissingRequiredField
            | ErrorCode::ValueOutOfRange
            | ErrorCode::TierDegreeIncompatible
            | ErrorCode::ResourceNotFound => ErrorSeverity::Low,

            ErrorCode::ResourceAlreadyExists
            | ErrorCode::PermissionDenied
            | ErrorCode::ConsentMissing
            | ErrorCode::RateLimitExceeded
            | ErrorCode::ProviderRateLimited
            | ErrorCode::ProviderTimeout
            | ErrorCode::Cancelled
            | ErrorCode::CacheError => ErrorSeverity::Medium,

            ErrorCode::ProviderError
            | ErrorCode::ProviderAuthFailed
            | ErrorCode::ProviderInvalidRequest
            | ErrorCode::ProviderDataError
            | ErrorCode::ProvidersExhausted
            | ErrorCode::CircuitOpen
            | ErrorCode::ServiceUnavailable
            | ErrorCode::Timeout
            | ErrorCode::TenantMismatch
            | ErrorCode::ComplianceViolation
            | ErrorCode::CheckNotPermitted
            | ErrorCode::LookbackExceeded
            | ErrorCode::ResourceExhausted
            | ErrorCode::MonitoringError
            | ErrorCode::ScheduleError => ErrorSeverity::High,

            ErrorCode::InternalError
            | ErrorCode::ConfigurationError
            | ErrorCode::StorageError
            | ErrorCode::SerializationError
            | ErrorCode::ConcurrencyLimitExceeded
            | ErrorCode::ResourceLocked
            | ErrorCode::VersionConflict => ErrorSeverity::Critical,
        }
    }
}

impl Serialize for Error {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        #[derive(Serialize)]
        struct ErrorSer {
            code: ErrorCode,
            kind: ErrorKind,
            message: String,
            details: Option<String>,
            context: ErrorContext,
            severity: ErrorSeverity,
        }

        let error_ser = ErrorSer {
            code: self.code,
            kind: self.kind(),
            message: self.message.clone(),
            details: self.details.clone(),
            context: self.context.clone(),
            severity: self.severity,
        };

        error_ser.serialize(serializer)
    }
}

// Convenience constructors for common errors
impl Error {
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationFailed, message)
    }

    pub fn permission(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::PermissionDenied, message)
    }

    pub fn compliance(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ComplianceViolation, message)
    }

    pub fn provider(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ProviderError, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ResourceNotFound, message)
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::StorageError, message)
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Cancelled, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Timeout, message)
    }
}

// Implement From for common error types
impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::new(ErrorCode::SerializationError, err.to_string())
            .add_trace("serde_json::Error conversion")
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Self::new(ErrorCode::ConfigurationError, err.to_string())
            .add_trace("config::ConfigError conversion")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TenantId;
    use crate::types::Jurisdiction;

    #[test]
    fn error_carries_correlation_id() {
        let ctx = RequestContext::new(TenantId::new(), Jurisdiction::Us);
        let err = Error::validation("consent_ref missing").in_request(&ctx);

        assert_eq!(err.context.correlation_id.as_deref(), Some(ctx.correlation_id.as_str()));
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn compliance_errors_are_high_severity_and_not_retryable() {
        let err = Error::new(ErrorCode::CheckNotPermitted, "criminal blocked in EU");
        assert_eq!(err.severity, ErrorSeverity::High);
        assert!(!err.is_retryable());
        assert!(err.should_log_as_error());
    }

    #[test]
    fn cause_chain() {
        let root = Error::provider("connection reset");
        let err = Error::new(ErrorCode::ProvidersExhausted, "all providers failed")
            .with_cause(root);
        assert!(err.cause.is_some());
        assert_eq!(err.cause.as_ref().unwrap().code, ErrorCode::ProviderError);

        // The cause surfaces through the standard error source chain.
        let source = std::error::Error::source(&err).expect("source present");
        assert!(source.to_string().contains("connection reset"));
    }

    #[test]
    fn display_includes_code_and_optional_details() {
        let plain = Error::validation("bad input");
        assert_eq!(plain.to_string(), "[ValidationFailed] bad input");

        let detailed = Error::validation("bad input").with_details("dob is malformed");
        assert_eq!(
            detailed.to_string(),
            "[ValidationFailed] bad input: dob is malformed"
        );
    }
}
