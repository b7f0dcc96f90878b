use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::time::Instant;
use tracing::{info, warn};

use screening_core::audit::AuditLogger;
use screening_core::config::EngineConfig;
use screening_core::context::RequestContext;
use screening_core::error::{ErrorCode, Result};
use screening_core::types::{Degree, EntityId, InfoPhase, InfoType, ScreeningId, ScreeningTier};
use screening_gateway::ProviderGateway;

use crate::compliance::Ruleset;
use crate::entity::{EntityResolver, Subject, SubjectIdentifiers};
use crate::knowledge::{ConnectionCandidate, ConnectionKind, KnowledgeBase};
use crate::profile::EntityGraph;
use crate::sar::{SarController, SarRunContext, SarState};

use super::screening::ScreeningPhase;

/// Whether a branch completed cleanly or lost some info types to failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchStatus {
    Completed,
    Degraded,
}

/// Outcome of investigating one entity (the subject, or a connected entity
/// at D2/D3).
pub struct BranchOutcome {
    pub entity_id: EntityId,
    pub kind: Option<ConnectionKind>,
    pub sar_states: Vec<SarState>,
    pub status: BranchStatus,
    pub kb: Arc<KnowledgeBase>,
}

/// Consolidated result of the degree walk.
pub struct InvestigationResult {
    pub subject: BranchOutcome,
    pub connected: Vec<BranchOutcome>,
    pub graph: EntityGraph,
}

impl InvestigationResult {
    pub fn is_degraded(&self) -> bool {
        self.subject.status == BranchStatus::Degraded
            || self.connected.iter().any(|b| b.status == BranchStatus::Degraded)
    }
}

/// Bound on concurrent branch investigations at D2/D3.
const BRANCH_CONCURRENCY: usize = 4;

/// Drives investigation from the subject outward: D1 over the subject, D2
/// over direct connections, D3 one hop further (Enhanced tier only).
/// Degrees are strictly sequential; branch failures degrade rather than
/// fail the screening.
pub struct DegreeOrchestrator {
    config: EngineConfig,
    sar: SarController,
    entity_resolver: Arc<EntityResolver>,
    audit: AuditLogger,
}

/// Inputs shared across a whole investigation run.
pub struct InvestigationParams<'a> {
    pub screening_id: ScreeningId,
    pub ruleset: &'a Ruleset,
    pub tier: ScreeningTier,
    pub degree: Degree,
    pub deadline: Instant,
    pub cancel: watch::Receiver<bool>,
    /// Global bound on concurrent queries across the whole investigation
    pub query_limit: Arc<Semaphore>,
    /// Live phase reporting for the subject investigation; `None` for
    /// callers that do not surface progress
    pub phase_tx: Option<mpsc::UnboundedSender<ScreeningPhase>>,
}

impl DegreeOrchestrator {
    pub fn new(
        config: EngineConfig,
        sar: SarController,
        entity_resolver: Arc<EntityResolver>,
        audit: AuditLogger,
    ) -> Self {
        Self {
            config,
            sar,
            entity_resolver,
            audit,
        }
    }

    pub fn audit(&self) -> &AuditLogger {
        &self.audit
    }

    /// Run the full degree walk for a screening.
    pub async fn run(
        &self,
        ctx: &RequestContext,
        subject_entity: EntityId,
        identifiers: &SubjectIdentifiers,
        params: &InvestigationParams<'_>,
        gateway: &ProviderGateway,
        completed: &[SarState],
    ) -> Result<InvestigationResult> {
        // D1: the subject itself.
        let subject = self
            .investigate_entity(
                ctx,
                subject_entity,
                None,
                identifiers,
                params,
                gateway,
                completed,
            )
            .await?;

        let mut graph = EntityGraph::new();
        let mut connected = Vec::new();

        if params.degree >= Degree::D2 {
            if let Some(tx) = &params.phase_tx {
                let _ = tx.send(ScreeningPhase::NetworkExpansion);
            }
            let candidates = self
                .ranked_connections(&subject.kb)
                .await;
            info!(
                count = candidates.len(),
                "Expanding into direct connections (D2)"
            );
            let d2 = self
                .investigate_connections(ctx, subject_entity, &candidates, params, gateway, &mut graph)
                .await?;

            if params.degree >= Degree::D3 {
                // One hop further, seeded from the D2 branches' knowledge.
                let mut seen: HashSet<String> = candidates.iter().map(|c| c.name.clone()).collect();
                let mut second_hop: Vec<(EntityId, Vec<ConnectionCandidate>)> = Vec::new();
                for branch in &d2 {
                    let next = self.ranked_connections(&branch.kb).await;
                    let fresh: Vec<ConnectionCandidate> = next
                        .into_iter()
                        .filter(|c| seen.insert(c.name.clone()))
                        .collect();
                    if !fresh.is_empty() {
                        second_hop.push((branch.entity_id, fresh));
                    }
                }
                for (origin, candidates) in second_hop {
                    let d3 = self
                        .investigate_connections(ctx, origin, &candidates, params, gateway, &mut graph)
                        .await?;
                    connected.extend(d3);
                }
            }
            connected.extend(d2);
        }

        Ok(InvestigationResult {
            subject,
            connected,
            graph,
        })
    }

    async fn ranked_connections(&self, kb: &KnowledgeBase) -> Vec<ConnectionCandidate> {
        let mut candidates = kb.extract_connections().await;
        candidates.truncate(self.config.network_max_entities_per_degree);
        candidates
    }

    /// Investigate a prioritized queue of connections concurrently with
    /// bounded parallelism, linking each into the entity graph.
    async fn investigate_connections(
        &self,
        ctx: &RequestContext,
        origin: EntityId,
        candidates: &[ConnectionCandidate],
        params: &InvestigationParams<'_>,
        gateway: &ProviderGateway,
        graph: &mut EntityGraph,
    ) -> Result<Vec<BranchOutcome>> {
        let branch_limit = Arc::new(Semaphore::new(BRANCH_CONCURRENCY));
        let mut handles = Vec::new();

        for candidate in candidates {
            let ctx = ctx.child();
            let identifiers = SubjectIdentifiers::new(candidate.name.clone());
            let subject = Subject::new(
                ctx.tenant_id,
                identifiers.clone(),
                ctx.jurisdiction.clone(),
                screening_core::types::RoleCategory::Other,
            );
            let resolution = self.entity_resolver.resolve(&ctx, &subject).await?;
            graph.connect(origin, resolution.entity_id, candidate.kind, candidate.relevance());

            let limit = Arc::clone(&branch_limit);
            let kind = candidate.kind;
            let entity_id = resolution.entity_id;

            handles.push(async move {
                let _permit = limit.acquire_owned().await.expect("semaphore not closed");
                let outcome = self
                    .investigate_entity(&ctx, entity_id, Some(kind), &identifiers, params, gateway, &[])
                    .await;
                (entity_id, kind, outcome)
            });
        }

        let results = futures::future::join_all(handles).await;
        let mut outcomes = Vec::new();
        for (entity_id, kind, outcome) in results {
            match outcome {
                Ok(branch) => outcomes.push(branch),
                Err(error) if error.code == ErrorCode::Cancelled => return Err(error),
                Err(error) => {
                    // A failed branch degrades the result without failing
                    // the screening.
                    warn!(entity = %entity_id, error = %error, "Connection branch failed");
                    outcomes.push(BranchOutcome {
                        entity_id,
                        kind: Some(kind),
                        sar_states: Vec::new(),
                        status: BranchStatus::Degraded,
                        kb: Arc::new(KnowledgeBase::new(params.screening_id)),
                    });
                }
            }
        }
        Ok(outcomes)
    }

    /// Run SAR over every permitted info type for one entity, phase by
    /// phase: Foundation fully terminates before Records, Records before
    /// Intelligence.
    pub async fn investigate_entity(
        &self,
        ctx: &RequestContext,
        entity_id: EntityId,
        kind: Option<ConnectionKind>,
        identifiers: &SubjectIdentifiers,
        params: &InvestigationParams<'_>,
        gateway: &ProviderGateway,
        completed: &[SarState],
    ) -> Result<BranchOutcome> {
        let kb = Arc::new(KnowledgeBase::new(params.screening_id));
        let mut sar_states: Vec<SarState> = completed.to_vec();
        let done: HashSet<InfoType> = completed.iter().map(|s| s.info_type).collect();
        let mut degraded = false;

        for phase in InfoPhase::all() {
            let types: Vec<InfoType> = InfoType::all()
                .iter()
                .filter(|t| t.phase() == phase && !done.contains(*t))
                .copied()
                .collect();
            if types.is_empty() {
                continue;
            }

            // Only the subject branch drives the reported screening phase.
            if kind.is_none() {
                if let Some(tx) = &params.phase_tx {
                    let screening_phase = match phase {
                        InfoPhase::Foundation => ScreeningPhase::Foundation,
                        InfoPhase::Records => ScreeningPhase::Records,
                        InfoPhase::Intelligence => ScreeningPhase::Intelligence,
                    };
                    let _ = tx.send(screening_phase);
                }
            }

            let run = SarRunContext {
                ruleset: params.ruleset,
                identifiers,
                tier: params.tier,
                degree: params.degree,
                query_limit: Arc::clone(&params.query_limit),
                deadline: params.deadline,
                cancel: params.cancel.clone(),
            };

            let futures = types.iter().map(|info_type| {
                let run = &run;
                let kb = Arc::clone(&kb);
                async move {
                    self.sar
                        .run_info_type(ctx, *info_type, run, gateway, &kb)
                        .await
                }
            });
            let results = futures::future::join_all(futures).await;

            // Phase barrier: every type in this phase reaches a terminal
            // state before the next phase begins.
            for result in results {
                match result {
                    Ok(state) => sar_states.push(state),
                    Err(error) if error.code == ErrorCode::Cancelled => return Err(error),
                    Err(error) => {
                        warn!(error = %error, "Info type failed; branch degraded");
                        degraded = true;
                    }
                }
            }
        }

        Ok(BranchOutcome {
            entity_id,
            kind,
            sar_states,
            status: if degraded {
                BranchStatus::Degraded
            } else {
                BranchStatus::Completed
            },
            kb,
        })
    }
}
