use std::sync::Arc;
use tracing::{error, info, warn};

use super::event::{AuditEvent, EventOutcome, EventSeverity, EventType};
use super::store::AuditStore;
use crate::context::RequestContext;
use crate::error::Result;

/// High-level audit logger used by the SAR controller, compliance gate,
/// provider gateway, risk aggregator and monitoring scheduler.
///
/// Events are written to the backing store (where they get hash-chained) and
/// duplicated into structured logging at a severity-mapped level.
#[derive(Clone)]
pub struct AuditLogger {
    store: Arc<dyn AuditStore>,
}

impl AuditLogger {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn AuditStore> {
        &self.store
    }

    /// Log an audit event scoped to a request context.
    pub async fn log_event(&self, ctx: &RequestContext, mut event: AuditEvent) -> Result<()> {
        if event.correlation_id.is_none() {
            event.correlation_id = Some(ctx.correlation_id.clone());
        }
        if event.tenant_id.is_none() {
            event.tenant_id = Some(ctx.tenant_id.to_string());
        }
        if event.actor_id.is_none() {
            event.actor_id = ctx.user_id.clone();
        }

        match event.severity {
            EventSeverity::Info => {
                info!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    correlation_id = ?event.correlation_id,
                    resource = ?event.resource_type,
                    description = %event.description,
                    "Audit event"
                );
            }
            EventSeverity::Warning => {
                warn!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    correlation_id = ?event.correlation_id,
                    resource = ?event.resource_type,
                    description = %event.description,
                    "Audit event (warning)"
                );
            }
            EventSeverity::Critical => {
                error!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    correlation_id = ?event.correlation_id,
                    resource = ?event.resource_type,
                    description = %event.description,
                    metadata = ?event.metadata,
                    "Critical audit event"
                );
            }
        }

        match self.store.append(event).await {
            Ok(_) => Ok(()),
            Err(e) => {
                // An unauditable operation is a serious integrity concern.
                error!(error = %e, "Failed to store audit event");
                Err(e)
            }
        }
    }

    /// Log a SAR state transition.
    pub async fn log_sar_transition(
        &self,
        ctx: &RequestContext,
        info_type: &str,
        old_phase: &str,
        new_phase: &str,
        reason: &str,
        iteration: u32,
        cumulative_facts: usize,
    ) -> Result<()> {
        let event = AuditEvent::builder(
            EventType::SarTransition,
            format!("{}: {} -> {} ({})", info_type, old_phase, new_phase, reason),
        )
        .resource("info_type", info_type)
        .metadata("old_phase", serde_json::Value::String(old_phase.to_string()))
        .metadata("new_phase", serde_json::Value::String(new_phase.to_string()))
        .metadata("reason", serde_json::Value::String(reason.to_string()))
        .metadata("iteration", serde_json::json!(iteration))
        .metadata("cumulative_facts", serde_json::json!(cumulative_facts))
        .build();

        self.log_event(ctx, event).await
    }

    /// Log a compliance gate denial. Never suppressed.
    pub async fn log_compliance_denied(
        &self,
        ctx: &RequestContext,
        check_type: &str,
        jurisdiction: &str,
    ) -> Result<()> {
        let event = AuditEvent::builder(
            EventType::ComplianceGateDenied,
            format!("check {} not permitted in {}", check_type, jurisdiction),
        )
        .severity(EventSeverity::Warning)
        .outcome(EventOutcome::Denied)
        .resource("check_type", check_type)
        .metadata(
            "jurisdiction",
            serde_json::Value::String(jurisdiction.to_string()),
        )
        .build();

        self.log_event(ctx, event).await
    }

    /// Log a provider call outcome.
    pub async fn log_provider_call(
        &self,
        ctx: &RequestContext,
        provider_id: &str,
        check_type: &str,
        success: bool,
        detail: Option<&str>,
    ) -> Result<()> {
        let (event_type, outcome, severity) = if success {
            (
                EventType::ProviderCallSucceeded,
                EventOutcome::Success,
                EventSeverity::Info,
            )
        } else {
            (
                EventType::ProviderCallFailed,
                EventOutcome::Failure,
                EventSeverity::Warning,
            )
        };

        let mut builder = AuditEvent::builder(
            event_type,
            format!("provider {} {} call", provider_id, check_type),
        )
        .severity(severity)
        .outcome(outcome)
        .resource("provider", provider_id)
        .metadata(
            "check_type",
            serde_json::Value::String(check_type.to_string()),
        );

        if let Some(detail) = detail {
            builder = builder.metadata("detail", serde_json::Value::String(detail.to_string()));
        }

        self.log_event(ctx, builder.build()).await
    }

    /// Log a circuit breaker state change.
    pub async fn log_circuit_transition(
        &self,
        ctx: &RequestContext,
        provider_id: &str,
        old_state: &str,
        new_state: &str,
    ) -> Result<()> {
        let event = AuditEvent::builder(
            EventType::CircuitStateChanged,
            format!("provider {}: {} -> {}", provider_id, old_state, new_state),
        )
        .severity(if new_state == "open" {
            EventSeverity::Warning
        } else {
            EventSeverity::Info
        })
        .resource("provider", provider_id)
        .metadata("old_state", serde_json::Value::String(old_state.to_string()))
        .metadata("new_state", serde_json::Value::String(new_state.to_string()))
        .build();

        self.log_event(ctx, event).await
    }

    /// Log a completed risk assessment.
    pub async fn log_risk_assessed(
        &self,
        ctx: &RequestContext,
        entity_id: &str,
        final_score: f64,
        recommendation: &str,
    ) -> Result<()> {
        let event = AuditEvent::builder(
            EventType::RiskAssessed,
            format!(
                "entity {} scored {:.1} ({})",
                entity_id, final_score, recommendation
            ),
        )
        .resource("entity", entity_id)
        .metadata("final_score", serde_json::json!(final_score))
        .metadata(
            "recommendation",
            serde_json::Value::String(recommendation.to_string()),
        )
        .build();

        self.log_event(ctx, event).await
    }

    /// Log an emitted alert.
    pub async fn log_alert(
        &self,
        ctx: &RequestContext,
        entity_id: &str,
        alert_kind: &str,
        alert_severity: &str,
    ) -> Result<()> {
        let event = AuditEvent::builder(
            EventType::AlertEmitted,
            format!("{} alert for entity {}", alert_kind, entity_id),
        )
        .severity(if alert_severity == "high" {
            EventSeverity::Critical
        } else {
            EventSeverity::Warning
        })
        .resource("entity", entity_id)
        .metadata("alert_kind", serde_json::Value::String(alert_kind.to_string()))
        .metadata(
            "alert_severity",
            serde_json::Value::String(alert_severity.to_string()),
        )
        .build();

        self.log_event(ctx, event).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::store::{AuditFilter, AuditStore as _, MemoryAuditStore};
    use crate::types::TenantId;
    use crate::types::Jurisdiction;

    #[tokio::test]
    async fn context_fields_are_applied() {
        let store = Arc::new(MemoryAuditStore::new());
        let logger = AuditLogger::new(store.clone());
        let ctx = RequestContext::new(TenantId::new(), Jurisdiction::Us).with_user_id("analyst-1");

        logger
            .log_sar_transition(&ctx, "identity", "search", "assess", "iteration_done", 1, 3)
            .await
            .unwrap();

        let events = store
            .events_for_tenant(&ctx.tenant_id.to_string(), &AuditFilter::default())
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].correlation_id.as_deref(),
            Some(ctx.correlation_id.as_str())
        );
        assert_eq!(events[0].actor_id.as_deref(), Some("analyst-1"));
    }

    #[tokio::test]
    async fn compliance_denial_is_recorded_as_denied() {
        let store = Arc::new(MemoryAuditStore::new());
        let logger = AuditLogger::new(store.clone());
        let ctx = RequestContext::new(TenantId::new(), Jurisdiction::Eu);

        logger
            .log_compliance_denied(&ctx, "criminal", "eu")
            .await
            .unwrap();

        let events = store
            .events_for_tenant(&ctx.tenant_id.to_string(), &AuditFilter::default())
            .await
            .unwrap();
        assert_eq!(events[0].outcome, EventOutcome::Denied);
    }
}
