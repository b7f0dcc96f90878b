use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{watch, Semaphore};
use tokio::time::Instant;
use tracing::{debug, info};

use screening_core::audit::AuditLogger;
use screening_core::config::EngineConfig;
use screening_core::context::RequestContext;
use screening_core::error::{Error, Result};
use screening_core::types::{Degree, InfoPhase, InfoType, ScreeningTier};
use screening_gateway::ProviderGateway;

use crate::assessor;
use crate::compliance::Ruleset;
use crate::entity::SubjectIdentifiers;
use crate::knowledge::KnowledgeBase;
use crate::planner::{QueryPlanner, QueryRefiner, SearchQuery};

use super::state::{CompletionReason, IterationRecord, SarPhase, SarState};

/// Per-phase iteration thresholds.
#[derive(Debug, Clone, Copy)]
pub struct SarThresholds {
    pub confidence_threshold: f64,
    pub max_iterations: u32,
    pub min_gain: f64,
    pub min_confidence_delta: f64,
}

impl SarThresholds {
    pub fn for_info_type(info_type: InfoType, config: &EngineConfig) -> Self {
        match info_type.phase() {
            InfoPhase::Foundation => Self {
                confidence_threshold: config.foundation_confidence_threshold,
                max_iterations: config.foundation_max_iterations,
                min_gain: config.min_gain_threshold,
                min_confidence_delta: config.min_confidence_delta,
            },
            InfoPhase::Records | InfoPhase::Intelligence => Self {
                confidence_threshold: config.confidence_threshold,
                max_iterations: config.max_iterations,
                min_gain: config.min_gain_threshold,
                min_confidence_delta: config.min_confidence_delta,
            },
        }
    }
}

/// What the controller decided at the end of an iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SarDecision {
    Continue,
    Terminate {
        phase: SarPhase,
        reason: CompletionReason,
    },
}

/// Everything one SAR run needs from its surrounding investigation.
pub struct SarRunContext<'a> {
    pub ruleset: &'a Ruleset,
    pub identifiers: &'a SubjectIdentifiers,
    pub tier: ScreeningTier,
    pub degree: Degree,
    /// Global bound on concurrent queries across the investigation
    pub query_limit: Arc<Semaphore>,
    /// Per-screening deadline
    pub deadline: Instant,
    /// Cooperative cancellation signal
    pub cancel: watch::Receiver<bool>,
}

/// Drives the Search-Assess-Refine loop for single info types.
pub struct SarController {
    config: EngineConfig,
    audit: AuditLogger,
}

impl SarController {
    pub fn new(config: EngineConfig, audit: AuditLogger) -> Self {
        Self { config, audit }
    }

    /// Decision ordering at the end of iteration `k`, exactly as specified:
    /// threshold met, then iteration cap, then diminishing returns, else
    /// refine.
    pub fn decide(
        &self,
        thresholds: &SarThresholds,
        k: u32,
        confidence: f64,
        previous_confidence: f64,
        info_gain_rate: f64,
    ) -> SarDecision {
        if confidence >= thresholds.confidence_threshold {
            return SarDecision::Terminate {
                phase: SarPhase::Complete,
                reason: CompletionReason::ConfidenceThresholdMet,
            };
        }
        if k >= thresholds.max_iterations {
            return SarDecision::Terminate {
                phase: SarPhase::Capped,
                reason: CompletionReason::MaxIterationsReached,
            };
        }
        if k >= 2
            && (info_gain_rate < thresholds.min_gain
                || (confidence - previous_confidence) < thresholds.min_confidence_delta)
        {
            return SarDecision::Terminate {
                phase: SarPhase::Diminished,
                reason: CompletionReason::DiminishingReturns,
            };
        }
        SarDecision::Continue
    }

    /// Run the full loop for one info type against the knowledge base.
    pub async fn run_info_type(
        &self,
        ctx: &RequestContext,
        info_type: InfoType,
        run: &SarRunContext<'_>,
        gateway: &ProviderGateway,
        kb: &KnowledgeBase,
    ) -> Result<SarState> {
        let check_type = info_type.check_type();
        if !run.ruleset.is_permitted(check_type) {
            // The type is excluded for this jurisdiction/role; it never
            // dispatches and is recorded as blocked.
            self.audit
                .log_compliance_denied(ctx, check_type.as_str(), &ctx.jurisdiction.to_string())
                .await?;
            let state = SarState::blocked_by_compliance(info_type);
            self.audit
                .log_sar_transition(
                    ctx,
                    &info_type.to_string(),
                    &SarPhase::Search.to_string(),
                    &state.phase.to_string(),
                    &CompletionReason::BlockedByCompliance.to_string(),
                    0,
                    0,
                )
                .await?;
            return Ok(state);
        }

        let mut state = SarState::new(info_type);
        let thresholds = SarThresholds::for_info_type(info_type, &self.config);
        let planner = QueryPlanner::new(gateway.resolver());
        let refiner = QueryRefiner::new(gateway.resolver());

        let mut queries = planner.initial_queries(
            info_type,
            run.identifiers,
            run.ruleset,
            run.tier,
            run.degree,
            &ctx.jurisdiction,
        );
        if queries.is_empty() {
            self.terminate(ctx, &mut state, SarPhase::Capped, CompletionReason::ProvidersExhausted, kb)
                .await?;
            return Ok(state);
        }

        let mut executed: HashSet<String> = HashSet::new();
        let mut previous_confidence = 0.0_f64;

        loop {
            let k = state.iteration_count() + 1;

            if *run.cancel.borrow() {
                return Err(Error::cancelled(format!(
                    "screening cancelled during {} iteration {}",
                    info_type, k
                ))
                .in_request(ctx));
            }
            if Instant::now() >= run.deadline {
                self.terminate(ctx, &mut state, SarPhase::Capped, CompletionReason::DeadlineExceeded, kb)
                    .await?;
                return Ok(state);
            }

            // Search: dispatch this iteration's queries with bounded
            // concurrency. Results assemble out of order; the commit below
            // happens under the info type's lock.
            let (responses, failures) = self
                .execute_queries(ctx, run, gateway, &queries, &mut executed)
                .await;
            let queries_executed = queries.len();

            if responses.is_empty() && failures > 0 && kb.snapshot(info_type).await.facts.is_empty()
            {
                self.terminate(
                    ctx,
                    &mut state,
                    SarPhase::Capped,
                    CompletionReason::ProvidersExhausted,
                    kb,
                )
                .await?;
                return Ok(state);
            }

            // Assess: commit new knowledge and score the cumulative picture.
            let from = state.transition(SarPhase::Assess)?;
            self.audit_transition(ctx, &state, from, "iteration_searched", k, kb).await?;

            let assessment = {
                let commit_lock = kb.commit_lock(info_type);
                let _guard = commit_lock.lock().await;

                let mut new_facts = Vec::new();
                for response in &responses {
                    new_facts.extend(assessor::facts_from_response(info_type, response));
                }
                let new_fact_count = new_facts.len();
                kb.add_facts(new_facts).await;

                let snapshot = kb.snapshot(info_type).await;
                let new_inconsistencies = assessor::detect_inconsistencies(
                    info_type,
                    &snapshot.facts,
                    &snapshot.inconsistencies,
                );
                let new_inconsistency_count = new_inconsistencies.len();
                kb.add_inconsistencies(new_inconsistencies).await;

                let snapshot = kb.snapshot(info_type).await;
                let mut assessment = assessor::assess(
                    &snapshot,
                    new_fact_count,
                    new_inconsistency_count,
                    queries_executed,
                );
                // Confidence is monotone non-decreasing unless this
                // iteration surfaced new contradicting evidence.
                if new_inconsistency_count == 0 && assessment.confidence < previous_confidence {
                    assessment.confidence = previous_confidence;
                }
                kb.set_gaps(info_type, assessment.gaps.clone()).await;
                assessment
            };

            state.record_iteration(IterationRecord {
                index: k,
                queries_executed,
                new_facts: assessment.new_facts,
                new_inconsistencies: assessment.new_inconsistencies,
                confidence: assessment.confidence,
                info_gain_rate: assessment.info_gain_rate,
            });

            debug!(
                info_type = %info_type,
                iteration = k,
                confidence = assessment.confidence,
                gain_rate = assessment.info_gain_rate,
                "SAR iteration assessed"
            );

            match self.decide(
                &thresholds,
                k,
                assessment.confidence,
                previous_confidence,
                assessment.info_gain_rate,
            ) {
                SarDecision::Terminate { phase, reason } => {
                    self.terminate(ctx, &mut state, phase, reason, kb).await?;
                    info!(
                        info_type = %info_type,
                        phase = %phase,
                        reason = %reason,
                        iterations = state.iteration_count(),
                        confidence = state.final_confidence,
                        "SAR loop terminated"
                    );
                    return Ok(state);
                }
                SarDecision::Continue => {
                    let from = state.transition(SarPhase::Refine)?;
                    self.audit_transition(ctx, &state, from, "below_threshold", k, kb).await?;

                    queries = refiner
                        .refine_queries(
                            info_type,
                            &assessment.gaps,
                            kb,
                            run.tier,
                            &ctx.jurisdiction,
                            &executed,
                        )
                        .await;
                    if queries.is_empty() {
                        // Nothing left to ask: further iterations cannot add
                        // information.
                        self.terminate(
                            ctx,
                            &mut state,
                            SarPhase::Diminished,
                            CompletionReason::DiminishingReturns,
                            kb,
                        )
                        .await?;
                        return Ok(state);
                    }

                    let from = state.transition(SarPhase::Search)?;
                    self.audit_transition(ctx, &state, from, "refined_queries", k, kb).await?;
                    previous_confidence = assessment.confidence;
                }
            }
        }
    }

    async fn execute_queries(
        &self,
        ctx: &RequestContext,
        run: &SarRunContext<'_>,
        gateway: &ProviderGateway,
        queries: &[SearchQuery],
        executed: &mut HashSet<String>,
    ) -> (Vec<screening_gateway::ProviderResponse>, usize) {
        let futures = queries.iter().map(|query| {
            let limit = Arc::clone(&run.query_limit);
            let request = query.to_request(run.tier);
            async move {
                let _permit = limit.acquire_owned().await.expect("semaphore not closed");
                gateway
                    .call_with_fallback(
                        ctx,
                        run.ruleset,
                        query.check_type,
                        &request,
                        &ctx.jurisdiction,
                        Some(&query.provider_id),
                    )
                    .await
            }
        });

        let results = futures::future::join_all(futures).await;
        for query in queries {
            executed.insert(query.dedupe_key());
        }

        let mut responses = Vec::new();
        let mut failures = 0usize;
        for result in results {
            match result {
                Ok(outcome) => responses.push(outcome.response),
                Err(_) => failures += 1,
            }
        }
        (responses, failures)
    }

    async fn terminate(
        &self,
        ctx: &RequestContext,
        state: &mut SarState,
        phase: SarPhase,
        reason: CompletionReason,
        kb: &KnowledgeBase,
    ) -> Result<()> {
        let from = state.terminate(phase, reason)?;
        let facts = kb.snapshot(state.info_type).await.facts.len();
        self.audit
            .log_sar_transition(
                ctx,
                &state.info_type.to_string(),
                &from.to_string(),
                &phase.to_string(),
                &reason.to_string(),
                state.iteration_count(),
                facts,
            )
            .await
    }

    async fn audit_transition(
        &self,
        ctx: &RequestContext,
        state: &SarState,
        from: SarPhase,
        reason: &str,
        iteration: u32,
        kb: &KnowledgeBase,
    ) -> Result<()> {
        let facts = kb.snapshot(state.info_type).await.facts.len();
        self.audit
            .log_sar_transition(
                ctx,
                &state.info_type.to_string(),
                &from.to_string(),
                &state.phase.to_string(),
                reason,
                iteration,
                facts,
            )
            .await
    }
}
