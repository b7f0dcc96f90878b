use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use screening_core::context::RequestContext;
use screening_core::error::{Error, ErrorCode};
use screening_core::types::{CheckType, ProviderId, ScreeningTier};

/// How much weight the assessor gives facts from a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceAuthority {
    /// Subject-supplied data relayed without verification
    SelfReported,
    /// Secondary source that can corroborate other claims
    Corroborative,
    /// System of record (court registry, government database)
    Authoritative,
}

/// A single check request dispatched to a provider.
///
/// Params are kept in a `BTreeMap` so normalization and cache fingerprints
/// are order-stable regardless of how the planner assembled them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderRequest {
    pub check_type: CheckType,
    pub params: BTreeMap<String, String>,
    pub tier: ScreeningTier,
}

impl ProviderRequest {
    pub fn new(check_type: CheckType, tier: ScreeningTier) -> Self {
        Self {
            check_type,
            params: BTreeMap::new(),
            tier,
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

/// One record returned by a provider: a bag of structured attributes plus a
/// reference back into the provider's own system for evidencing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRecord {
    pub attributes: BTreeMap<String, serde_json::Value>,
    pub source_ref: String,
}

impl ProviderRecord {
    pub fn new(source_ref: impl Into<String>) -> Self {
        Self {
            attributes: BTreeMap::new(),
            source_ref: source_ref.into(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }
}

/// Successful provider response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    pub provider_id: ProviderId,
    pub check_type: CheckType,
    pub authority: SourceAuthority,
    pub records: Vec<ProviderRecord>,
    pub retrieved_at: DateTime<Utc>,
}

/// Classification of a failure used by the retry policy: only transient and
/// temporary failures are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorClass {
    Transient,
    Temporary,
    Permanent,
    Fatal,
}

/// Failure kinds a provider adapter may surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    RateLimited {
        /// Server-suggested delay before retrying, if present
        retry_after: Option<Duration>,
    },
    Auth,
    InvalidRequest,
    Timeout,
    ServiceUnavailable,
    Data,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind:?}: {message}")]
pub struct ProviderFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl ProviderFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Timeout, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(FailureKind::ServiceUnavailable, message)
    }

    pub fn rate_limited(retry_after: Option<Duration>, message: impl Into<String>) -> Self {
        Self::new(FailureKind::RateLimited { retry_after }, message)
    }

    pub fn class(&self) -> ErrorClass {
        match self.kind {
            FailureKind::Timeout | FailureKind::ServiceUnavailable => ErrorClass::Transient,
            FailureKind::RateLimited { .. } => ErrorClass::Temporary,
            FailureKind::InvalidRequest | FailureKind::Data => ErrorClass::Permanent,
            FailureKind::Auth => ErrorClass::Fatal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self.class(), ErrorClass::Transient | ErrorClass::Temporary)
    }

    /// Server-suggested retry delay, when the failure carries one.
    pub fn retry_after(&self) -> Option<Duration> {
        match self.kind {
            FailureKind::RateLimited { retry_after } => retry_after,
            _ => None,
        }
    }
}

impl From<ProviderFailure> for Error {
    fn from(failure: ProviderFailure) -> Self {
        let code = match failure.kind {
            FailureKind::RateLimited { .. } => ErrorCode::ProviderRateLimited,
            FailureKind::Auth => ErrorCode::ProviderAuthFailed,
            FailureKind::InvalidRequest => ErrorCode::ProviderInvalidRequest,
            FailureKind::Timeout => ErrorCode::ProviderTimeout,
            FailureKind::ServiceUnavailable => ErrorCode::ServiceUnavailable,
            FailureKind::Data => ErrorCode::ProviderDataError,
        };
        Error::new(code, failure.message)
    }
}

/// Capability interface implemented by each external data provider adapter.
///
/// A provider declares the subset of checks it supports; the gateway
/// dispatches by check type and never routes a request a provider cannot
/// serve.
#[async_trait]
pub trait Provider: Send + Sync {
    fn id(&self) -> &ProviderId;

    fn supported_checks(&self) -> &[CheckType];

    fn authority(&self) -> SourceAuthority {
        SourceAuthority::Corroborative
    }

    async fn execute(
        &self,
        ctx: &RequestContext,
        request: &ProviderRequest,
    ) -> Result<ProviderResponse, ProviderFailure>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_classes() {
        assert_eq!(
            ProviderFailure::timeout("t").class(),
            ErrorClass::Transient
        );
        assert_eq!(
            ProviderFailure::rate_limited(None, "r").class(),
            ErrorClass::Temporary
        );
        assert_eq!(
            ProviderFailure::new(FailureKind::InvalidRequest, "i").class(),
            ErrorClass::Permanent
        );
        assert_eq!(
            ProviderFailure::new(FailureKind::Auth, "a").class(),
            ErrorClass::Fatal
        );
    }

    #[test]
    fn only_transient_and_temporary_retry() {
        assert!(ProviderFailure::unavailable("s").is_retryable());
        assert!(ProviderFailure::rate_limited(None, "r").is_retryable());
        assert!(!ProviderFailure::new(FailureKind::Data, "d").is_retryable());
        assert!(!ProviderFailure::new(FailureKind::Auth, "a").is_retryable());
    }

    #[test]
    fn retry_after_is_surfaced() {
        let failure = ProviderFailure::rate_limited(Some(Duration::from_secs(7)), "slow down");
        assert_eq!(failure.retry_after(), Some(Duration::from_secs(7)));
        assert_eq!(ProviderFailure::timeout("t").retry_after(), None);
    }
}
