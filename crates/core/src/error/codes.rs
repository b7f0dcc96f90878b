use serde::{Deserialize, Serialize};
use std::fmt;

/// High-level error kinds surfaced to callers. Every `ErrorCode` maps into
/// exactly one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Permission,
    ComplianceViolation,
    Provider,
    System,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Validation => write!(f, "validation"),
            ErrorKind::Permission => write!(f, "permission"),
            ErrorKind::ComplianceViolation => write!(f, "compliance_violation"),
            ErrorKind::Provider => write!(f, "provider"),
            ErrorKind::System => write!(f, "system"),
        }
    }
}

/// Standardized error codes for the screening platform.
/// Codes are stable across releases; numeric ranges group related failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // General System Errors (1000-1999)
    InternalError = 1000,
    ConfigurationError = 1001,
    ServiceUnavailable = 1002,
    Timeout = 1003,
    ResourceExhausted = 1004,
    Cancelled = 1005,
    SerializationError = 1006,

    // Provider & Outbound Call Errors (3000-3999)
    ProviderError = 3000,
    ProviderTimeout = 3001,
    ProviderRateLimited = 3002,
    ProviderAuthFailed = 3003,
    ProviderInvalidRequest = 3004,
    ProviderDataError = 3005,
    ProvidersExhausted = 3006,
    CircuitOpen = 3007,

    // Permission Errors (4000-4999)
    PermissionDenied = 4000,
    TenantMismatch = 4001,
    ConsentMissing = 4002,

    // Input Validation Errors (5000-5999)
    ValidationFailed = 5000,
    InvalidInput = 5001,
    MissingRequiredField = 5002,
    ValueOutOfRange = 5003,
    TierDegreeIncompatible = 5004,

    // Resource Management Errors (6000-6999)
    ResourceNotFound = 6000,
    ResourceAlreadyExists = 6001,
    ResourceLocked = 6002,
    VersionConflict = 6003,

    // Rate Limiting & Throttling Errors (7000-7999)
    RateLimitExceeded = 7000,
    ConcurrencyLimitExceeded = 7001,

    // Cache & Storage Errors (8000-8999)
    StorageError = 8000,
    CacheError = 8001,

    // Compliance & Monitoring Errors (9000-9999)
    ComplianceViolation = 9000,
    CheckNotPermitted = 9001,
    LookbackExceeded = 9002,
    MonitoringError = 9003,
    ScheduleError = 9004,
}

impl ErrorCode {
    /// Map this code into the platform error taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ErrorCode::ValidationFailed
            | ErrorCode::InvalidInput
            | ErrorCode::MissingRequiredField
            | ErrorCode::ValueOutOfRange
            | ErrorCode::TierDegreeIncompatible => ErrorKind::Validation,

            ErrorCode::PermissionDenied
            | ErrorCode::TenantMismatch
            | ErrorCode::ConsentMissing => ErrorKind::Permission,

            ErrorCode::ComplianceViolation
            | ErrorCode::CheckNotPermitted
            | ErrorCode::LookbackExceeded => ErrorKind::ComplianceViolation,

            ErrorCode::ProviderError
            | ErrorCode::ProviderTimeout
            | ErrorCode::ProviderRateLimited
            | ErrorCode::ProviderAuthFailed
            | ErrorCode::ProviderInvalidRequest
            | ErrorCode::ProviderDataError
            | ErrorCode::ProvidersExhausted
            | ErrorCode::CircuitOpen
            | ErrorCode::RateLimitExceeded
            | ErrorCode::ConcurrencyLimitExceeded => ErrorKind::Provider,

            ErrorCode::InternalError
            | ErrorCode::ConfigurationError
            | ErrorCode::ServiceUnavailable
            | ErrorCode::Timeout
            | ErrorCode::ResourceExhausted
            | ErrorCode::Cancelled
            | ErrorCode::SerializationError
            | ErrorCode::ResourceNotFound
            | ErrorCode::ResourceAlreadyExists
            | ErrorCode::ResourceLocked
            | ErrorCode::VersionConflict
            | ErrorCode::StorageError
            | ErrorCode::CacheError
            | ErrorCode::MonitoringError
            | ErrorCode::ScheduleError => ErrorKind::System,
        }
    }

    /// Get error category for metrics and logging
    pub fn category(&self) -> &'static str {
        match self {
            ErrorCode::InternalError
            | ErrorCode::ConfigurationError
            | ErrorCode::ServiceUnavailable
            | ErrorCode::Timeout
            | ErrorCode::ResourceExhausted
            | ErrorCode::Cancelled
            | ErrorCode::SerializationError => "system",

            ErrorCode::ProviderError
            | ErrorCode::ProviderTimeout
            | ErrorCode::ProviderRateLimited
            | ErrorCode::ProviderAuthFailed
            | ErrorCode::ProviderInvalidRequest
            | ErrorCode::ProviderDataError
            | ErrorCode::ProvidersExhausted
            | ErrorCode::CircuitOpen => "provider",

            ErrorCode::PermissionDenied
            | ErrorCode::TenantMismatch
            | ErrorCode::ConsentMissing => "permission",

            ErrorCode::ValidationFailed
            | ErrorCode::InvalidInput
            | ErrorCode::MissingRequiredField
            | ErrorCode::ValueOutOfRange
            | ErrorCode::TierDegreeIncompatible => "validation",

            ErrorCode::ResourceNotFound
            | ErrorCode::ResourceAlreadyExists
            | ErrorCode::ResourceLocked
            | ErrorCode::VersionConflict => "resource",

            ErrorCode::RateLimitExceeded
            | ErrorCode::ConcurrencyLimitExceeded => "rate_limit",

            ErrorCode::StorageError | ErrorCode::CacheError => "storage",

            ErrorCode::ComplianceViolation
            | ErrorCode::CheckNotPermitted
            | ErrorCode::LookbackExceeded => "compliance",

            ErrorCode::MonitoringError | ErrorCode::ScheduleError => "monitoring",
        }
    }

    /// Check if an operation failing with this code should be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCode::ServiceUnavailable
                | ErrorCode::Timeout
                | ErrorCode::ProviderTimeout
                | ErrorCode::ProviderRateLimited
                | ErrorCode::ResourceExhausted
                | ErrorCode::CacheError
        )
    }

    /// Check if error should be logged at error level
    pub fn should_log_as_error(&self) -> bool {
        !matches!(
            self,
            ErrorCode::ValidationFailed
                | ErrorCode::InvalidInput
                | ErrorCode::MissingRequiredField
                | ErrorCode::ValueOutOfRange
                | ErrorCode::TierDegreeIncompatible
                | ErrorCode::ResourceNotFound
                | ErrorCode::PermissionDenied
                | ErrorCode::RateLimitExceeded
                | ErrorCode::ProviderRateLimited
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_code_maps_to_a_single_kind() {
        assert_eq!(ErrorCode::ValidationFailed.kind(), ErrorKind::Validation);
        assert_eq!(ErrorCode::ConsentMissing.kind(), ErrorKind::Permission);
        assert_eq!(
            ErrorCode::CheckNotPermitted.kind(),
            ErrorKind::ComplianceViolation
        );
        assert_eq!(ErrorCode::CircuitOpen.kind(), ErrorKind::Provider);
        assert_eq!(ErrorCode::StorageError.kind(), ErrorKind::System);
    }

    #[test]
    fn retryable_codes() {
        assert!(ErrorCode::ProviderTimeout.is_retryable());
        assert!(ErrorCode::ProviderRateLimited.is_retryable());
        assert!(!ErrorCode::ProviderAuthFailed.is_retryable());
        assert!(!ErrorCode::ComplianceViolation.is_retryable());
    }
}
