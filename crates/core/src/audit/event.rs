use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Severity levels for audit events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSeverity {
    Info,
    Warning,
    Critical,
}

/// Event types emitted across the investigation pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    // Screening lifecycle
    ScreeningInitiated,
    ScreeningCompleted,
    ScreeningCancelled,
    ScreeningFailed,
    ScreeningCheckpointed,

    // SAR loop
    SarTransition,
    SarIterationCompleted,

    // Compliance
    RulesetEvaluated,
    ComplianceGateDenied,

    // Provider gateway
    ProviderCallSucceeded,
    ProviderCallFailed,
    ProviderFallback,
    CircuitStateChanged,
    CacheDecision,

    // Risk pipeline
    RiskAssessed,
    ProfileVersioned,

    // Entity lifecycle
    EntityResolved,
    EntityMerged,
    EntitySplit,

    // Monitoring
    MonitoringScheduled,
    MonitoringExecuted,
    VigilanceChanged,
    AlertEmitted,
    LifecycleEventReceived,

    // Custom events (for operational extensions)
    Custom(String),
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventType::Custom(name) => write!(f, "CUSTOM_{}", name.to_uppercase()),
            _ => write!(f, "{:?}", self),
        }
    }
}

/// Operation outcome enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventOutcome {
    Success,
    Failure,
    Partial,
    Denied,
}

impl std::fmt::Display for EventOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventOutcome::Success => write!(f, "success"),
            EventOutcome::Failure => write!(f, "failure"),
            EventOutcome::Partial => write!(f, "partial"),
            EventOutcome::Denied => write!(f, "denied"),
        }
    }
}

/// Core audit event structure.
///
/// Events are append-only. `prev_hash`/`hash` are filled by the store at
/// append time: each event is chained to the prior event for the same tenant
/// so tampering breaks the chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique identifier for this event
    pub id: String,
    /// Event type
    pub event_type: EventType,
    /// Event severity
    pub severity: EventSeverity,
    /// Timestamp when event occurred
    pub timestamp: DateTime<Utc>,
    /// Correlation id of the request that produced the event
    pub correlation_id: Option<String>,
    /// Tenant context
    pub tenant_id: Option<String>,
    /// Acting user, when a human initiated the operation
    pub actor_id: Option<String>,
    /// Resource being acted upon
    pub resource_type: Option<String>,
    /// ID of the resource
    pub resource_id: Option<String>,
    /// Human-readable description
    pub description: String,
    /// Structured metadata
    pub metadata: HashMap<String, serde_json::Value>,
    /// Operation outcome
    pub outcome: EventOutcome,
    /// Hash of the previous event in this tenant's chain
    pub prev_hash: Option<String>,
    /// Hash of this event (over prev_hash + canonical payload)
    pub hash: Option<String>,
}

/// Builder for creating audit events
pub struct AuditEventBuilder {
    event: AuditEvent,
}

impl AuditEventBuilder {
    pub fn new(event_type: EventType, description: impl Into<String>) -> Self {
        Self {
            event: AuditEvent {
                id: Uuid::new_v4().to_string(),
                event_type,
                severity: EventSeverity::Info,
                timestamp: Utc::now(),
                correlation_id: None,
                tenant_id: None,
                actor_id: None,
                resource_type: None,
                resource_id: None,
                description: description.into(),
                metadata: HashMap::new(),
                outcome: EventOutcome::Success,
                prev_hash: None,
                hash: None,
            },
        }
    }

    pub fn severity(mut self, severity: EventSeverity) -> Self {
        self.event.severity = severity;
        self
    }

    pub fn correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.event.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.event.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn actor_id(mut self, actor_id: impl Into<String>) -> Self {
        self.event.actor_id = Some(actor_id.into());
        self
    }

    pub fn resource(
        mut self,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        self.event.resource_type = Some(resource_type.into());
        self.event.resource_id = Some(resource_id.into());
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.event.metadata.insert(key.into(), value);
        self
    }

    pub fn outcome(mut self, outcome: EventOutcome) -> Self {
        self.event.outcome = outcome;
        self
    }

    pub fn build(self) -> AuditEvent {
        self.event
    }
}

impl AuditEvent {
    /// Create a new builder
    pub fn builder(event_type: EventType, description: impl Into<String>) -> AuditEventBuilder {
        AuditEventBuilder::new(event_type, description)
    }

    /// Get event category for grouping
    pub fn category(&self) -> &'static str {
        match &self.event_type {
            EventType::ScreeningInitiated
            | EventType::ScreeningCompleted
            | EventType::ScreeningCancelled
            | EventType::ScreeningFailed
            | EventType::ScreeningCheckpointed => "screening",

            EventType::SarTransition | EventType::SarIterationCompleted => "sar",

            EventType::RulesetEvaluated | EventType::ComplianceGateDenied => "compliance",

            EventType::ProviderCallSucceeded
            | EventType::ProviderCallFailed
            | EventType::ProviderFallback
            | EventType::CircuitStateChanged
            | EventType::CacheDecision => "gateway",

            EventType::RiskAssessed | EventType::ProfileVersioned => "risk",

            EventType::EntityResolved | EventType::EntityMerged | EventType::EntitySplit => {
                "entity"
            }

            EventType::MonitoringScheduled
            | EventType::MonitoringExecuted
            | EventType::VigilanceChanged
            | EventType::AlertEmitted
            | EventType::LifecycleEventReceived => "monitoring",

            EventType::Custom(_) => "custom",
        }
    }
}

impl std::fmt::Display for EventSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}
