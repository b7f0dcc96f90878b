use chrono::Utc;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

use screening_core::audit::AuditLogger;
use screening_core::config::GatewayConfig;
use screening_core::context::RequestContext;
use screening_core::error::{Error, ErrorCode, Result};
use screening_core::metrics::ScreeningMetrics;
use screening_core::types::{CheckType, Jurisdiction, ProviderId, ScreeningTier};

use crate::cache::{CacheEntry, CacheStatus, CacheStore, Fingerprint, FreshnessPolicy};
use crate::circuit::{CircuitBreakerRegistry, CircuitState};
use crate::provider::{Provider, ProviderFailure, ProviderRequest, ProviderResponse};
use crate::rate_limit::ProviderLimiter;
use crate::resolver::DataSourceResolver;
use crate::retry::RetryPolicy;
use crate::single_flight::SingleFlight;

/// Decides whether a check may be dispatched at all. Implemented by the
/// compliance ruleset; the gateway refuses to dispatch a denied check, so a
/// forbidden check type never reaches a provider.
pub trait ComplianceGate: Send + Sync {
    fn is_permitted(&self, check: CheckType) -> bool;
}

/// Result of a gateway call, noting whether it was served from cache and
/// whether the cached payload was past its fresh window.
#[derive(Debug, Clone)]
pub struct GatewayResult {
    pub response: ProviderResponse,
    pub from_cache: bool,
    pub stale: bool,
}

/// Uniform, resilient front door to every external data provider.
///
/// Call composition per provider: `circuit_breaker(retry(rate_limiter(raw)))`
/// behind the compliance gate, the result cache and single-flight
/// coalescing.
pub struct ProviderGateway {
    config: GatewayConfig,
    providers: HashMap<ProviderId, Arc<dyn Provider>>,
    limiters: DashMap<ProviderId, Arc<ProviderLimiter>>,
    circuits: CircuitBreakerRegistry,
    retry: RetryPolicy,
    cache: Arc<dyn CacheStore>,
    freshness: FreshnessPolicy,
    single_flight: SingleFlight,
    resolver: DataSourceResolver,
    audit: AuditLogger,
    metrics: Option<ScreeningMetrics>,
}

impl ProviderGateway {
    pub fn new(
        config: GatewayConfig,
        cache: Arc<dyn CacheStore>,
        freshness: FreshnessPolicy,
        resolver: DataSourceResolver,
        audit: AuditLogger,
    ) -> Self {
        Self {
            circuits: CircuitBreakerRegistry::new(config.circuit),
            retry: RetryPolicy::new(config.retry),
            config,
            providers: HashMap::new(),
            limiters: DashMap::new(),
            cache,
            freshness,
            single_flight: SingleFlight::new(),
            resolver,
            audit,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: ScreeningMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn register_provider(&mut self, provider: Arc<dyn Provider>) {
        self.providers.insert(provider.id().clone(), provider);
    }

    pub fn resolver(&self) -> &DataSourceResolver {
        &self.resolver
    }

    fn limiter_for(&self, provider_id: &ProviderId) -> Arc<ProviderLimiter> {
        self.limiters
            .entry(provider_id.clone())
            .or_insert_with(|| Arc::new(ProviderLimiter::new(self.config.default_limits)))
            .clone()
    }

    fn record_call_metric(&self, provider_id: &ProviderId, outcome: &str) {
        if let Some(metrics) = &self.metrics {
            metrics
                .provider_calls
                .with_label_values(&[provider_id.as_str(), outcome])
                .inc();
        }
    }

    fn record_cache_metric(&self, decision: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.cache_decisions.with_label_values(&[decision]).inc();
        }
    }

    /// Execute one check against a specific provider, honoring the
    /// compliance gate, cache freshness and single-flight coalescing.
    pub async fn call(
        &self,
        ctx: &RequestContext,
        gate: &dyn ComplianceGate,
        provider_id: &ProviderId,
        request: &ProviderRequest,
    ) -> Result<GatewayResult> {
        if !gate.is_permitted(request.check_type) {
            self.audit
                .log_compliance_denied(
                    ctx,
                    request.check_type.as_str(),
                    &ctx.jurisdiction.to_string(),
                )
                .await?;
            if let Some(metrics) = &self.metrics {
                metrics
                    .compliance_denials
                    .with_label_values(&[request.check_type.as_str()])
                    .inc();
            }
            return Err(Error::new(
                ErrorCode::CheckNotPermitted,
                format!("check {} not permitted by ruleset", request.check_type),
            )
            .in_request(ctx));
        }

        let fingerprint = Fingerprint::compute(provider_id, request.check_type, &request.params);

        if let Some(entry) = self.cache.get(&fingerprint).await? {
            let age = Utc::now() - entry.cached_at;
            match self.freshness.status(age, request.check_type, request.tier) {
                CacheStatus::Fresh => {
                    debug!(fingerprint = %fingerprint, "Cache hit (fresh)");
                    self.record_cache_metric("fresh");
                    return Ok(GatewayResult {
                        response: entry.payload,
                        from_cache: true,
                        stale: false,
                    });
                }
                CacheStatus::Stale if request.tier == ScreeningTier::Standard => {
                    debug!(fingerprint = %fingerprint, "Cache hit (stale, standard tier)");
                    self.record_cache_metric("stale");
                    return Ok(GatewayResult {
                        response: entry.payload,
                        from_cache: true,
                        stale: true,
                    });
                }
                status => {
                    debug!(fingerprint = %fingerprint, status = %status, "Cache refresh required");
                    self.record_cache_metric("expired");
                }
            }
        } else {
            self.record_cache_metric("miss");
        }

        let outcome = self
            .single_flight
            .run(&fingerprint, || self.fetch(ctx, provider_id, request))
            .await;

        match outcome.as_ref() {
            Ok(response) => {
                self.cache
                    .put(CacheEntry {
                        fingerprint,
                        provider_id: provider_id.clone(),
                        check_type: request.check_type,
                        payload: response.clone(),
                        cached_at: Utc::now(),
                    })
                    .await?;
                Ok(GatewayResult {
                    response: response.clone(),
                    from_cache: false,
                    stale: false,
                })
            }
            Err(failure) => Err(Error::from(failure.clone()).in_request(ctx)),
        }
    }

    /// The raw fetch path: circuit breaker around retried, rate-limited
    /// provider execution with a per-call timeout.
    async fn fetch(
        &self,
        ctx: &RequestContext,
        provider_id: &ProviderId,
        request: &ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderFailure> {
        let provider = match self.providers.get(provider_id) {
            Some(provider) => Arc::clone(provider),
            None => {
                return Err(ProviderFailure::new(
                    crate::provider::FailureKind::InvalidRequest,
                    format!("provider {} not registered", provider_id),
                ));
            }
        };

        if !provider.supported_checks().contains(&request.check_type) {
            return Err(ProviderFailure::new(
                crate::provider::FailureKind::InvalidRequest,
                format!(
                    "provider {} does not support check {}",
                    provider_id, request.check_type
                ),
            ));
        }

        let breaker = self.circuits.breaker_for(provider_id);
        match breaker.acquire().await {
            Ok(Some(transition)) => {
                let _ = self
                    .audit
                    .log_circuit_transition(
                        ctx,
                        provider_id.as_str(),
                        &transition.from.to_string(),
                        &transition.to.to_string(),
                    )
                    .await;
            }
            Ok(None) => {}
            Err(denied) => {
                self.record_call_metric(provider_id, "short_circuited");
                return Err(ProviderFailure::unavailable(format!(
                    "circuit open for provider {}; retry in {:?}",
                    provider_id, denied.retry_in
                )));
            }
        }

        let limiter = self.limiter_for(provider_id);
        let call_timeout = Duration::from_secs(self.config.provider_timeout_secs);

        let result = self
            .retry
            .execute(|attempt| {
                let provider = Arc::clone(&provider);
                let limiter = Arc::clone(&limiter);
                let ctx = ctx.clone();
                let request = request.clone();
                let provider_id = provider_id.clone();
                async move {
                    limiter.wait_for_token().await;
                    debug!(provider = %provider_id, check = %request.check_type, attempt, "Dispatching provider call");
                    match timeout(call_timeout, provider.execute(&ctx, &request)).await {
                        Ok(result) => result,
                        Err(_) => Err(ProviderFailure::timeout(format!(
                            "provider call exceeded {:?}",
                            call_timeout
                        ))),
                    }
                }
            })
            .await;

        let transition = match &result {
            Ok(_) => breaker.record_success().await,
            Err(_) => breaker.record_failure().await,
        };
        if let Some(transition) = transition {
            if let Some(metrics) = &self.metrics {
                metrics
                    .circuit_transitions
                    .with_label_values(&[provider_id.as_str(), &transition.to.to_string()])
                    .inc();
            }
            let _ = self
                .audit
                .log_circuit_transition(
                    ctx,
                    provider_id.as_str(),
                    &transition.from.to_string(),
                    &transition.to.to_string(),
                )
                .await;
        }

        match &result {
            Ok(_) => {
                self.record_call_metric(provider_id, "success");
                let _ = self
                    .audit
                    .log_provider_call(ctx, provider_id.as_str(), request.check_type.as_str(), true, None)
                    .await;
            }
            Err(failure) => {
                self.record_call_metric(provider_id, "failure");
                let _ = self
                    .audit
                    .log_provider_call(
                        ctx,
                        provider_id.as_str(),
                        request.check_type.as_str(),
                        false,
                        Some(&failure.to_string()),
                    )
                    .await;
            }
        }

        result
    }

    /// Execute a check against the prioritized provider chain for its type,
    /// falling back to the next provider when one is exhausted. Reports
    /// `ProvidersExhausted` once the whole chain has failed. When the
    /// planner bound the query to a specific provider (e.g. a secondary
    /// source for corroboration), `preferred` moves it to the front of the
    /// chain.
    pub async fn call_with_fallback(
        &self,
        ctx: &RequestContext,
        gate: &dyn ComplianceGate,
        check_type: CheckType,
        request: &ProviderRequest,
        jurisdiction: &Jurisdiction,
        preferred: Option<&ProviderId>,
    ) -> Result<GatewayResult> {
        let mut chain = self
            .resolver
            .providers_for(check_type, request.tier, jurisdiction);
        if let Some(preferred) = preferred {
            if let Some(position) = chain.iter().position(|p| p == preferred) {
                let provider = chain.remove(position);
                chain.insert(0, provider);
            }
        }
        if chain.is_empty() {
            return Err(Error::new(
                ErrorCode::ProvidersExhausted,
                format!("no providers registered for check {}", check_type),
            )
            .in_request(ctx));
        }

        let mut last_error: Option<Error> = None;
        for (index, provider_id) in chain.iter().enumerate() {
            match self.call(ctx, gate, provider_id, request).await {
                Ok(result) => return Ok(result),
                Err(error) => {
                    // Compliance denials are final for the check type; a
                    // different provider would not make the check permitted.
                    if error.code == ErrorCode::CheckNotPermitted {
                        return Err(error);
                    }
                    warn!(
                        provider = %provider_id,
                        check = %check_type,
                        error = %error,
                        "Provider failed; trying next in chain"
                    );
                    if index + 1 < chain.len() {
                        let event = screening_core::audit::AuditEvent::builder(
                            screening_core::audit::EventType::ProviderFallback,
                            format!(
                                "provider {} exhausted for {}; trying {}",
                                provider_id,
                                check_type,
                                chain[index + 1]
                            ),
                        )
                        .resource("provider", provider_id.as_str())
                        .metadata(
                            "check_type",
                            serde_json::Value::String(check_type.as_str().to_string()),
                        )
                        .build();
                        let _ = self.audit.log_event(ctx, event).await;
                    }
                    last_error = Some(error);
                }
            }
        }

        let mut error = Error::new(
            ErrorCode::ProvidersExhausted,
            format!("all providers exhausted for check {}", check_type),
        )
        .in_request(ctx);
        if let Some(cause) = last_error {
            error = error.with_cause(cause);
        }
        Err(error)
    }

    /// Current circuit state for a provider, for status surfaces and tests.
    pub async fn circuit_state(&self, provider_id: &ProviderId) -> CircuitState {
        self.circuits.breaker_for(provider_id).state().await
    }
}
