use chrono::Utc;
use dashmap::DashSet;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use screening_core::audit::{AuditEvent, AuditLogger, EventType};
use screening_core::context::RequestContext;
use screening_core::error::Result;
use screening_core::types::EntityId;

use crate::vigilance::{default_vigilance, MonitoringStore};

/// Inbound lifecycle events from the employer system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LifecycleEventKind {
    HireInitiated,
    ConsentGranted,
    PositionChanged { new_role: screening_core::types::RoleCategory },
    EmployeeTerminated,
    RehireInitiated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleEvent {
    /// Idempotency key: the same event id processed twice is a no-op.
    pub event_id: Uuid,
    pub entity_id: EntityId,
    pub kind: LifecycleEventKind,
}

/// What the caller should do next in response to an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleAction {
    CreatePendingScreening,
    StartScreening,
    ReevaluateVigilance,
    CancelMonitoring,
    ResumeOrRescreen,
    /// Duplicate event id; nothing happened
    AlreadyProcessed,
}

/// Maps lifecycle events onto monitoring state changes. Processing is
/// idempotent on `event_id`.
pub struct LifecycleHandler {
    store: Arc<dyn MonitoringStore>,
    audit: AuditLogger,
    processed: DashSet<Uuid>,
}

impl LifecycleHandler {
    pub fn new(store: Arc<dyn MonitoringStore>, audit: AuditLogger) -> Self {
        Self {
            store,
            audit,
            processed: DashSet::new(),
        }
    }

    pub async fn handle(
        &self,
        ctx: &RequestContext,
        event: LifecycleEvent,
    ) -> Result<LifecycleAction> {
        if !self.processed.insert(event.event_id) {
            debug!(event = %event.event_id, "Duplicate lifecycle event ignored");
            return Ok(LifecycleAction::AlreadyProcessed);
        }

        let action = match &event.kind {
            LifecycleEventKind::HireInitiated => LifecycleAction::CreatePendingScreening,
            LifecycleEventKind::ConsentGranted => LifecycleAction::StartScreening,
            LifecycleEventKind::PositionChanged { new_role } => {
                if let Some(mut config) = self.store.get(ctx, event.entity_id).await? {
                    config.role_category = *new_role;
                    config.vigilance = default_vigilance(*new_role);
                    // The cadence change takes effect from now; the next
                    // check moves earlier if the new level is tighter.
                    let candidate = Utc::now() + config.vigilance.interval();
                    if candidate < config.next_check_at {
                        config.next_check_at = candidate;
                    }
                    self.store.upsert(ctx, config).await?;
                }
                LifecycleAction::ReevaluateVigilance
            }
            LifecycleEventKind::EmployeeTerminated => {
                self.store.deactivate(ctx, event.entity_id).await?;
                info!(entity = %event.entity_id, "Monitoring cancelled after termination");
                LifecycleAction::CancelMonitoring
            }
            LifecycleEventKind::RehireInitiated => {
                if let Some(mut config) = self.store.get(ctx, event.entity_id).await? {
                    config.active = true;
                    self.store.upsert(ctx, config).await?;
                }
                LifecycleAction::ResumeOrRescreen
            }
        };

        let audit_event = AuditEvent::builder(
            EventType::LifecycleEventReceived,
            format!("lifecycle event {:?} -> {:?}", event.kind, action),
        )
        .resource("entity", event.entity_id.to_string())
        .metadata("event_id", serde_json::json!(event.event_id.to_string()))
        .build();
        self.audit.log_event(ctx, audit_event).await?;

        Ok(action)
    }
}
