use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::time::Duration;
use tracing::{error, info, warn};

use screening_core::audit::{AuditEvent, AuditLogger, EventType};
use screening_core::config::MonitoringSettings;
use screening_core::context::RequestContext;
use screening_core::error::Result;
use screening_core::types::{Degree, ScreeningTier};
use screening_engine::orchestrator::ScreeningService;
use screening_engine::profile::{delta, ProfileDelta, ProfileStore};

use crate::alerts::{severity_for_signals, Alert, AlertDispatcher, AlertKind};
use crate::vigilance::{effective_vigilance, MonitoringConfig, MonitoringStore};

/// Executes monitoring passes: re-investigate due entities, diff against
/// their baseline profiles, alert on evolution signals and advance the
/// schedule. Shared by the polling scheduler and operational tooling.
#[derive(Clone)]
pub struct MonitoringRunner {
    settings: MonitoringSettings,
    store: Arc<dyn MonitoringStore>,
    profiles: Arc<dyn ProfileStore>,
    screening: Arc<ScreeningService>,
    dispatcher: Arc<AlertDispatcher>,
    audit: AuditLogger,
}

impl MonitoringRunner {
    pub fn new(
        settings: MonitoringSettings,
        store: Arc<dyn MonitoringStore>,
        profiles: Arc<dyn ProfileStore>,
        screening: Arc<ScreeningService>,
        dispatcher: Arc<AlertDispatcher>,
        audit: AuditLogger,
    ) -> Self {
        Self {
            settings,
            store,
            profiles,
            screening,
            dispatcher,
            audit,
        }
    }

    /// One monitoring pass over every due config, with bounded parallelism.
    /// Returns the number of successful executions; failed runs stay due
    /// and are retried on the next pass.
    pub async fn run_due_once(&self) -> Result<usize> {
        let due = self.store.due(Utc::now()).await?;
        if due.is_empty() {
            return Ok(0);
        }
        info!(count = due.len(), "Executing due monitoring configs");

        let limit = Arc::new(Semaphore::new(self.settings.max_concurrent_runs));
        let futures = due.iter().map(|config| {
            let limit = Arc::clone(&limit);
            async move {
                let _permit = limit.acquire_owned().await.expect("semaphore not closed");
                self.execute_config(config).await
            }
        });

        let results = futures::future::join_all(futures).await;
        let mut executed = 0usize;
        for result in results {
            match result {
                Ok(()) => executed += 1,
                Err(e) => warn!(error = %e, "Monitoring run failed; will retry next cycle"),
            }
        }
        Ok(executed)
    }

    /// Re-investigate one entity and process the resulting delta.
    async fn execute_config(&self, config: &MonitoringConfig) -> Result<()> {
        let ctx = RequestContext::new(config.tenant_id, config.jurisdiction.clone());

        // V1 and V3 rerun the stored full configuration; V2 runs the
        // delta-only pass over the high-risk source subset.
        let (tier, degree) = if config.vigilance.is_full_rerun() {
            (config.tier, config.degree)
        } else {
            (ScreeningTier::Standard, Degree::D1)
        };

        let baseline = self
            .profiles
            .get(&ctx, config.entity_id, config.baseline_profile_version)
            .await?;

        let new_profile = self
            .screening
            .rescreen_entity(
                &ctx,
                config.entity_id,
                &config.identifiers,
                config.role_category,
                tier,
                degree,
            )
            .await?;

        if let Some(baseline) = &baseline {
            let profile_delta = delta(baseline, &new_profile);
            self.emit_alerts(&ctx, config, &profile_delta).await?;
        }

        let mut updated = config.clone();
        updated.baseline_profile_version = new_profile.version;
        updated.vigilance = effective_vigilance(config.role_category, new_profile.risk_score);
        // next_check_at strictly increases across executions.
        let candidate = Utc::now() + updated.vigilance.interval();
        updated.next_check_at = if candidate > config.next_check_at {
            candidate
        } else {
            config.next_check_at + updated.vigilance.interval()
        };
        self.store.upsert(&ctx, updated).await?;

        let event = AuditEvent::builder(
            EventType::MonitoringExecuted,
            format!(
                "monitoring run for entity {} produced profile {}",
                config.entity_id, new_profile.version
            ),
        )
        .resource("entity", config.entity_id.to_string())
        .metadata("vigilance", serde_json::json!(config.vigilance.to_string()))
        .metadata("risk_score", serde_json::json!(new_profile.risk_score))
        .build();
        self.audit.log_event(&ctx, event).await?;

        Ok(())
    }

    async fn emit_alerts(
        &self,
        ctx: &RequestContext,
        config: &MonitoringConfig,
        profile_delta: &ProfileDelta,
    ) -> Result<()> {
        if profile_delta.is_empty() || profile_delta.evolution_signals.is_empty() {
            return Ok(());
        }

        let severity = severity_for_signals(&profile_delta.evolution_signals);
        let alert = Alert::new(
            config.entity_id,
            AlertKind::AlertGenerated,
            severity,
            format!(
                "profile moved {} -> {}: {} new finding(s), risk change {:+.1}",
                profile_delta.old_version,
                profile_delta.new_version,
                profile_delta.new_findings.len(),
                profile_delta.risk_score_change
            ),
        )
        .with_signals(profile_delta.evolution_signals.clone());

        self.dispatcher.dispatch(ctx, alert).await?;
        Ok(())
    }
}

/// Polling loop around the runner: ticks on an interval, drains due
/// configs, and stops gracefully on shutdown signal. Monitoring cancels at
/// investigation boundaries — an in-flight run completes before the loop
/// exits.
pub struct MonitoringScheduler {
    runner: MonitoringRunner,
    poll_interval: Duration,
    shutdown_tx: Option<mpsc::Sender<()>>,
}

impl MonitoringScheduler {
    pub fn new(runner: MonitoringRunner, settings: MonitoringSettings) -> Self {
        Self {
            runner,
            poll_interval: Duration::from_secs(settings.poll_interval_secs),
            shutdown_tx: None,
        }
    }

    /// Start the scheduler (non-blocking).
    pub fn start(&mut self) {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        self.shutdown_tx = Some(shutdown_tx);

        let runner = self.runner.clone();
        let poll_interval = self.poll_interval;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(poll_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            info!("Monitoring scheduler started");

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Monitoring scheduler shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        if let Err(e) = runner.run_due_once().await {
                            error!(error = %e, "Monitoring pass failed");
                        }
                    }
                }
            }
        });
    }

    /// Request a graceful stop; the current pass completes.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }
    }
}
