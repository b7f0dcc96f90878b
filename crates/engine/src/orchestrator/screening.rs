use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{watch, RwLock, Semaphore};
use tokio::time::{Duration, Instant};
use tracing::{error, info};
use validator::Validate;

use screening_core::audit::{AuditEvent, AuditLogger, EventType};
use screening_core::config::EngineConfig;
use screening_core::context::RequestContext;
use screening_core::error::{Error, ErrorCode, Result};
use screening_core::types::{
    Degree, EntityId, ProfileVersion, RoleCategory, ScreeningId, ScreeningTier,
};
use screening_gateway::ProviderGateway;

use crate::compliance::ComplianceEvaluator;
use crate::entity::{EntityResolver, EntityStore, Subject, SubjectIdentifiers};
use crate::profile::{Profile, ProfilePublisher};
use crate::risk::{ComprehensiveRiskAssessment, ConnectionRisk, RiskPipeline};
use crate::sar::SarState;

use super::degree::{BranchStatus, DegreeOrchestrator, InvestigationParams};
use super::store::{ScreeningCheckpoint, ScreeningStateStore};

/// Lifecycle phase of a screening as reported by `get_screening`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreeningPhase {
    Pending,
    Foundation,
    Records,
    Intelligence,
    NetworkExpansion,
    RiskAssessment,
    Completed,
    Cancelled,
    Failed,
}

impl ScreeningPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ScreeningPhase::Completed | ScreeningPhase::Cancelled | ScreeningPhase::Failed
        )
    }

    fn progress_percent(&self) -> u8 {
        match self {
            ScreeningPhase::Pending => 0,
            ScreeningPhase::Foundation => 15,
            ScreeningPhase::Records => 45,
            ScreeningPhase::Intelligence => 65,
            ScreeningPhase::NetworkExpansion => 80,
            ScreeningPhase::RiskAssessment => 95,
            ScreeningPhase::Completed | ScreeningPhase::Cancelled | ScreeningPhase::Failed => 100,
        }
    }
}

/// Inbound screening request.
#[derive(Debug, Clone, Validate, Serialize, Deserialize)]
pub struct ScreeningRequest {
    #[validate(length(min = 1, message = "consent reference is required"))]
    pub consent_ref: String,
    #[validate(length(min = 1, message = "subject name is required"))]
    pub full_name: String,
    pub dob: Option<NaiveDate>,
    pub national_id: Option<String>,
    pub addresses: Vec<String>,
    pub tier: ScreeningTier,
    pub degree: Degree,
    pub role_category: RoleCategory,
}

impl ScreeningRequest {
    fn identifiers(&self) -> SubjectIdentifiers {
        let mut identifiers = SubjectIdentifiers::new(self.full_name.clone());
        if let Some(dob) = self.dob {
            identifiers = identifiers.with_dob(dob);
        }
        if let Some(national_id) = &self.national_id {
            identifiers = identifiers.with_national_id(national_id);
        }
        for address in &self.addresses {
            identifiers = identifiers.with_address(address.clone());
        }
        identifiers
    }
}

/// Final result surfaced once a screening completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreeningResult {
    pub entity_id: EntityId,
    pub profile_version: ProfileVersion,
    pub assessment: ComprehensiveRiskAssessment,
    pub sar_states: Vec<SarState>,
    pub degraded: bool,
}

/// Status view returned by `get_screening`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreeningStatus {
    pub screening_id: ScreeningId,
    pub phase: ScreeningPhase,
    pub progress_percent: u8,
    pub started_at: DateTime<Utc>,
    pub eta: Option<DateTime<Utc>>,
    pub result: Option<ScreeningResult>,
    pub failure: Option<String>,
}

struct ActiveScreening {
    status: Arc<RwLock<ScreeningStatus>>,
    cancel: watch::Sender<bool>,
}

/// Front door of the investigation engine: initiate, observe and cancel
/// screenings. Investigations execute on background tasks; state is
/// checkpointed at phase boundaries so a restarted process can resume from
/// the last terminal info-type boundary.
pub struct ScreeningService {
    config: EngineConfig,
    gateway: Arc<ProviderGateway>,
    compliance: Arc<ComplianceEvaluator>,
    entity_resolver: Arc<EntityResolver>,
    entity_store: Arc<dyn EntityStore>,
    orchestrator: Arc<DegreeOrchestrator>,
    risk: Arc<RiskPipeline>,
    profiles: Arc<ProfilePublisher>,
    state_store: Arc<dyn ScreeningStateStore>,
    audit: AuditLogger,
    active: DashMap<ScreeningId, ActiveScreening>,
}

impl ScreeningService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: EngineConfig,
        gateway: Arc<ProviderGateway>,
        compliance: Arc<ComplianceEvaluator>,
        entity_resolver: Arc<EntityResolver>,
        entity_store: Arc<dyn EntityStore>,
        orchestrator: Arc<DegreeOrchestrator>,
        risk: Arc<RiskPipeline>,
        profiles: Arc<ProfilePublisher>,
        state_store: Arc<dyn ScreeningStateStore>,
        audit: AuditLogger,
    ) -> Self {
        Self {
            config,
            gateway,
            compliance,
            entity_resolver,
            entity_store,
            orchestrator,
            risk,
            profiles,
            state_store,
            audit,
            active: DashMap::new(),
        }
    }

    /// Validate and start a screening. Returns immediately with the id; the
    /// investigation runs on a background task.
    pub async fn initiate_screening(
        self: &Arc<Self>,
        ctx: &RequestContext,
        request: ScreeningRequest,
    ) -> Result<ScreeningId> {
        request
            .validate()
            .map_err(|e| Error::new(ErrorCode::ValidationFailed, e.to_string()).in_request(ctx))?;
        if request.consent_ref.trim().is_empty() {
            return Err(Error::new(ErrorCode::ConsentMissing, "consent token required").in_request(ctx));
        }
        if !request.degree.is_compatible_with(request.tier) {
            return Err(Error::new(
                ErrorCode::TierDegreeIncompatible,
                format!("degree {} requires the Enhanced tier", request.degree),
            )
            .in_request(ctx));
        }

        let screening_id = ScreeningId::new();
        let status = Arc::new(RwLock::new(ScreeningStatus {
            screening_id,
            phase: ScreeningPhase::Pending,
            progress_percent: 0,
            started_at: Utc::now(),
            eta: None,
            result: None,
            failure: None,
        }));
        let (cancel_tx, cancel_rx) = watch::channel(false);
        self.active.insert(
            screening_id,
            ActiveScreening {
                status: Arc::clone(&status),
                cancel: cancel_tx,
            },
        );

        let event = AuditEvent::builder(
            EventType::ScreeningInitiated,
            format!(
                "screening {} initiated ({} tier, {})",
                screening_id, request.tier, request.degree
            ),
        )
        .resource("screening", screening_id.to_string())
        .metadata("consent_ref", serde_json::json!(request.consent_ref))
        .metadata("degree", serde_json::json!(request.degree.to_string()))
        .build();
        self.audit.log_event(ctx, event).await?;

        let service = Arc::clone(self);
        let ctx = ctx.child();
        tokio::spawn(async move {
            service
                .execute_screening(ctx, screening_id, request, status, cancel_rx)
                .await;
        });

        Ok(screening_id)
    }

    /// Number of screenings currently in flight. Terminal screenings are
    /// evicted from the active set once their final state is checkpointed.
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Current status, progress and (when complete) the result.
    pub async fn get_screening(
        &self,
        ctx: &RequestContext,
        screening_id: ScreeningId,
    ) -> Result<ScreeningStatus> {
        let status = self
            .active
            .get(&screening_id)
            .map(|active| Arc::clone(&active.status));
        if let Some(status) = status {
            return Ok(status.read().await.clone());
        }
        // Fall back to the checkpoint: finished screenings leave the active
        // set, and restarted processes never had one.
        match self.state_store.load(ctx, screening_id).await? {
            Some(checkpoint) => Ok(ScreeningStatus {
                screening_id,
                phase: checkpoint.phase,
                progress_percent: checkpoint.progress_percent,
                started_at: checkpoint.updated_at,
                eta: None,
                result: checkpoint.result,
                failure: checkpoint.failure,
            }),
            None => Err(Error::not_found(format!("screening {} not found", screening_id))
                .in_request(ctx)),
        }
    }

    /// Request cooperative cancellation. In-flight provider calls run to
    /// their timeout and are dropped; terminal info types keep their state.
    pub async fn cancel_screening(
        &self,
        ctx: &RequestContext,
        screening_id: ScreeningId,
    ) -> Result<()> {
        {
            let active = self
                .active
                .get(&screening_id)
                .ok_or_else(|| Error::not_found(format!("screening {} not active", screening_id)))?;
            let _ = active.cancel.send(true);
        }

        let event = AuditEvent::builder(
            EventType::ScreeningCancelled,
            format!("screening {} cancellation requested", screening_id),
        )
        .resource("screening", screening_id.to_string())
        .build();
        self.audit.log_event(ctx, event).await
    }

    async fn set_phase(
        &self,
        ctx: &RequestContext,
        status: &Arc<RwLock<ScreeningStatus>>,
        phase: ScreeningPhase,
    ) {
        let mut guard = status.write().await;
        guard.phase = phase;
        guard.progress_percent = phase.progress_percent();
        if !phase.is_terminal() && guard.progress_percent > 0 {
            let elapsed = Utc::now() - guard.started_at;
            let projected =
                elapsed.num_milliseconds() as f64 * 100.0 / guard.progress_percent as f64;
            guard.eta =
                Some(guard.started_at + chrono::Duration::milliseconds(projected as i64));
        }
        let mut checkpoint =
            ScreeningCheckpoint::new(guard.screening_id, phase, guard.progress_percent);
        checkpoint.result = guard.result.clone();
        checkpoint.failure = guard.failure.clone();
        drop(guard);
        let _ = self.state_store.save(ctx, checkpoint).await;
    }

    async fn execute_screening(
        self: Arc<Self>,
        ctx: RequestContext,
        screening_id: ScreeningId,
        request: ScreeningRequest,
        status: Arc<RwLock<ScreeningStatus>>,
        cancel: watch::Receiver<bool>,
    ) {
        let outcome = self
            .run_investigation(&ctx, screening_id, &request, &status, cancel)
            .await;

        match outcome {
            Ok(result) => {
                {
                    let mut guard = status.write().await;
                    guard.result = Some(result);
                    guard.phase = ScreeningPhase::Completed;
                    guard.progress_percent = 100;
                    guard.eta = None;
                }
                self.set_phase(&ctx, &status, ScreeningPhase::Completed).await;
                let event = AuditEvent::builder(
                    EventType::ScreeningCompleted,
                    format!("screening {} completed", screening_id),
                )
                .resource("screening", screening_id.to_string())
                .build();
                let _ = self.audit.log_event(&ctx, event).await;
            }
            Err(error) if error.code == ErrorCode::Cancelled => {
                info!(screening = %screening_id, "Screening cancelled");
                self.set_phase(&ctx, &status, ScreeningPhase::Cancelled).await;
            }
            Err(error) => {
                error!(screening = %screening_id, error = %error, "Screening failed");
                {
                    let mut guard = status.write().await;
                    guard.failure = Some(error.to_string());
                }
                self.set_phase(&ctx, &status, ScreeningPhase::Failed).await;
                let event = AuditEvent::builder(
                    EventType::ScreeningFailed,
                    format!("screening {} failed: {}", screening_id, error),
                )
                .severity(screening_core::audit::EventSeverity::Critical)
                .outcome(screening_core::audit::EventOutcome::Failure)
                .resource("screening", screening_id.to_string())
                .build();
                let _ = self.audit.log_event(&ctx, event).await;
            }
        }

        // The screening is terminal and checkpointed (result included), so
        // status queries are served from the state store from here on.
        // Dropping the entry last keeps callers racing the tail end
        // consistent and stops finished screenings from accumulating.
        self.active.remove(&screening_id);
    }

    async fn run_investigation(
        &self,
        ctx: &RequestContext,
        screening_id: ScreeningId,
        request: &ScreeningRequest,
        status: &Arc<RwLock<ScreeningStatus>>,
        cancel: watch::Receiver<bool>,
    ) -> Result<ScreeningResult> {
        let identifiers = request.identifiers();
        let subject = Subject::new(
            ctx.tenant_id,
            identifiers.clone(),
            ctx.jurisdiction.clone(),
            request.role_category,
        );

        let resolution = self.entity_resolver.resolve(ctx, &subject).await?;
        let entity_id = resolution.entity_id;
        self.entity_store
            .attach_screening(ctx, entity_id, screening_id)
            .await?;

        let ruleset = self
            .compliance
            .evaluate(ctx, &ctx.jurisdiction, request.role_category)
            .await?;

        self.set_phase(ctx, status, ScreeningPhase::Foundation).await;

        // Live phase updates flow from the orchestrator; a small task mirrors
        // them into the status view and checkpoints each boundary.
        let (phase_tx, mut phase_rx) = tokio::sync::mpsc::unbounded_channel::<ScreeningPhase>();
        {
            let status = Arc::clone(status);
            let state_store = Arc::clone(&self.state_store);
            let ctx = ctx.clone();
            tokio::spawn(async move {
                while let Some(phase) = phase_rx.recv().await {
                    let mut guard = status.write().await;
                    if guard.phase.is_terminal() {
                        break;
                    }
                    // Progress only moves forward; late messages from a
                    // finished stage never roll the view back.
                    if phase.progress_percent() <= guard.progress_percent {
                        continue;
                    }
                    guard.phase = phase;
                    guard.progress_percent = phase.progress_percent();
                    let checkpoint =
                        ScreeningCheckpoint::new(guard.screening_id, phase, guard.progress_percent);
                    drop(guard);
                    let _ = state_store.save(&ctx, checkpoint).await;
                }
            });
        }

        let params = InvestigationParams {
            screening_id,
            ruleset: &ruleset,
            tier: request.tier,
            degree: request.degree,
            deadline: Instant::now() + Duration::from_secs(self.config.screening_timeout_secs),
            cancel,
            query_limit: Arc::new(Semaphore::new(self.config.global_investigation_limit)),
            phase_tx: Some(phase_tx),
        };

        // Resume support: skip info types already terminal in a checkpoint.
        let completed = self
            .state_store
            .load(ctx, screening_id)
            .await?
            .map(|c| c.completed_info_types)
            .unwrap_or_default();

        let investigation = self
            .orchestrator
            .run(ctx, entity_id, &identifiers, &params, &self.gateway, &completed)
            .await?;

        // Checkpoint the subject's terminal states before scoring.
        let mut checkpoint = ScreeningCheckpoint::new(
            screening_id,
            ScreeningPhase::RiskAssessment,
            ScreeningPhase::RiskAssessment.progress_percent(),
        );
        checkpoint.completed_info_types = investigation.subject.sar_states.clone();
        self.state_store.save(ctx, checkpoint).await?;
        self.set_phase(ctx, status, ScreeningPhase::RiskAssessment).await;

        // Connected entities contribute network risk from their own facts.
        let mut connections: Vec<ConnectionRisk> = Vec::new();
        for branch in &investigation.connected {
            if branch.status == BranchStatus::Degraded {
                continue;
            }
            let facts = branch.kb.all_facts().await;
            let inconsistencies = branch.kb.all_inconsistencies().await;
            let outcome = self
                .risk
                .assess(
                    ctx,
                    branch.entity_id,
                    RoleCategory::Other,
                    &facts,
                    &inconsistencies,
                    &[],
                )
                .await?;
            connections.push(ConnectionRisk {
                entity_id: branch.entity_id,
                kind: branch
                    .kind
                    .unwrap_or(crate::knowledge::ConnectionKind::Associate),
                risk_score: outcome.assessment.final_score,
            });
        }

        let facts = investigation.subject.kb.all_facts().await;
        let inconsistencies = investigation.subject.kb.all_inconsistencies().await;
        let outcome = self
            .risk
            .assess(
                ctx,
                entity_id,
                request.role_category,
                &facts,
                &inconsistencies,
                &connections,
            )
            .await?;

        let profile = self
            .profiles
            .publish(
                ctx,
                entity_id,
                outcome.findings.clone(),
                outcome.assessment.final_score,
                outcome.assessment.risk_level,
                investigation.graph.clone(),
            )
            .await?;

        Ok(ScreeningResult {
            entity_id,
            profile_version: profile.version,
            assessment: outcome.assessment,
            sar_states: investigation.subject.sar_states.clone(),
            degraded: investigation.is_degraded(),
        })
    }

    /// Re-run an investigation synchronously for an already-known entity.
    /// Used by the monitoring scheduler, which needs the new profile before
    /// computing a delta.
    pub async fn rescreen_entity(
        &self,
        ctx: &RequestContext,
        entity_id: EntityId,
        identifiers: &SubjectIdentifiers,
        role_category: RoleCategory,
        tier: ScreeningTier,
        degree: Degree,
    ) -> Result<Profile> {
        let screening_id = ScreeningId::new();
        let ruleset = self
            .compliance
            .evaluate(ctx, &ctx.jurisdiction, role_category)
            .await?;
        let (_cancel_tx, cancel_rx) = watch::channel(false);

        let params = InvestigationParams {
            screening_id,
            ruleset: &ruleset,
            tier,
            degree,
            deadline: Instant::now() + Duration::from_secs(self.config.screening_timeout_secs),
            cancel: cancel_rx,
            query_limit: Arc::new(Semaphore::new(self.config.global_investigation_limit)),
            phase_tx: None,
        };

        let investigation = self
            .orchestrator
            .run(ctx, entity_id, identifiers, &params, &self.gateway, &[])
            .await?;

        let facts = investigation.subject.kb.all_facts().await;
        let inconsistencies = investigation.subject.kb.all_inconsistencies().await;
        let outcome = self
            .risk
            .assess(ctx, entity_id, role_category, &facts, &inconsistencies, &[])
            .await?;

        self.profiles
            .publish(
                ctx,
                entity_id,
                outcome.findings.clone(),
                outcome.assessment.final_score,
                outcome.assessment.risk_level,
                investigation.graph.clone(),
            )
            .await
    }
}
