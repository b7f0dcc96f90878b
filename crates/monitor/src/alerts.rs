use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;
use uuid::Uuid;

use screening_core::audit::AuditLogger;
use screening_core::context::RequestContext;
use screening_core::error::Result;
use screening_core::types::EntityId;
use screening_engine::profile::EvolutionSignal;

/// Outbound alert kinds emitted by the engine and monitoring loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    ScreeningComplete,
    ReviewRequired,
    AlertGenerated,
    AdverseActionPending,
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AlertKind::ScreeningComplete => "screening_complete",
            AlertKind::ReviewRequired => "review_required",
            AlertKind::AlertGenerated => "alert_generated",
            AlertKind::AdverseActionPending => "adverse_action_pending",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertSeverity::Low => write!(f, "low"),
            AlertSeverity::Medium => write!(f, "medium"),
            AlertSeverity::High => write!(f, "high"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub entity_id: EntityId,
    pub kind: AlertKind,
    pub severity: AlertSeverity,
    pub message: String,
    pub signals: Vec<EvolutionSignal>,
    pub created_at: DateTime<Utc>,
}

impl Alert {
    pub fn new(
        entity_id: EntityId,
        kind: AlertKind,
        severity: AlertSeverity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            entity_id,
            kind,
            severity,
            message: message.into(),
            signals: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_signals(mut self, signals: Vec<EvolutionSignal>) -> Self {
        self.signals = signals;
        self
    }
}

/// Alert severity derived from the evolution signals on a delta.
pub fn severity_for_signals(signals: &[EvolutionSignal]) -> AlertSeverity {
    if signals.contains(&EvolutionSignal::RiskEscalation)
        || signals.contains(&EvolutionSignal::CriticalFindingsSurge)
    {
        AlertSeverity::High
    } else if signals.contains(&EvolutionSignal::NetworkExpansion) {
        AlertSeverity::Medium
    } else {
        AlertSeverity::Low
    }
}

/// Delivery state tracked per alert.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DeliveryTracking {
    pub delivered: bool,
    pub failed: bool,
    pub retry_count: u32,
}

/// Notification adapter. The core has no opinion on transport; adapters
/// implement this seam.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, ctx: &RequestContext, alert: &Alert) -> Result<()>;
}

/// In-memory notifier collecting alerts, used by default wiring and tests.
pub struct MemoryNotifier {
    delivered: Mutex<Vec<Alert>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self {
            delivered: Mutex::new(Vec::new()),
        }
    }

    pub async fn alerts(&self) -> Vec<Alert> {
        self.delivered.lock().await.clone()
    }
}

impl Default for MemoryNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    async fn notify(&self, _ctx: &RequestContext, alert: &Alert) -> Result<()> {
        self.delivered.lock().await.push(alert.clone());
        Ok(())
    }
}

const MAX_DELIVERY_ATTEMPTS: u32 = 3;

/// Dispatches alerts through the notifier with bounded redelivery and
/// audit coverage.
pub struct AlertDispatcher {
    notifier: Arc<dyn Notifier>,
    audit: AuditLogger,
}

impl AlertDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>, audit: AuditLogger) -> Self {
        Self { notifier, audit }
    }

    pub async fn dispatch(&self, ctx: &RequestContext, alert: Alert) -> Result<DeliveryTracking> {
        let mut tracking = DeliveryTracking::default();

        loop {
            match self.notifier.notify(ctx, &alert).await {
                Ok(()) => {
                    tracking.delivered = true;
                    break;
                }
                Err(error) => {
                    tracking.retry_count += 1;
                    warn!(
                        alert = %alert.id,
                        attempt = tracking.retry_count,
                        error = %error,
                        "Alert delivery failed"
                    );
                    if tracking.retry_count >= MAX_DELIVERY_ATTEMPTS {
                        tracking.failed = true;
                        break;
                    }
                }
            }
        }

        self.audit
            .log_alert(
                ctx,
                &alert.entity_id.to_string(),
                &alert.kind.to_string(),
                &alert.severity.to_string(),
            )
            .await?;

        Ok(tracking)
    }
}
