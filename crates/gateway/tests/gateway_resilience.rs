//! End-to-end behavior of the provider gateway composition: compliance
//! gating, cache freshness, circuit breaking and provider fallback.

use std::sync::Arc;

use screening_core::audit::{AuditFilter, AuditLogger, AuditStore, MemoryAuditStore};
use screening_core::config::{CacheConfig, CircuitConfig, GatewayConfig, ProviderLimits, RetryConfig};
use screening_core::context::RequestContext;
use screening_core::error::ErrorCode;
use screening_core::types::{CheckType, Jurisdiction, ProviderId, ScreeningTier, TenantId};

use screening_gateway::{
    CacheStore, CircuitState, ComplianceGate, DataSourceResolver, FreshnessPolicy, MemoryCacheStore,
    MockProvider, ProviderFailure, ProviderGateway, ProviderRecord, ProviderRegistration,
    ProviderRequest,
};

struct AllowAll;

impl ComplianceGate for AllowAll {
    fn is_permitted(&self, _check: CheckType) -> bool {
        true
    }
}

struct DenyCriminal;

impl ComplianceGate for DenyCriminal {
    fn is_permitted(&self, check: CheckType) -> bool {
        check != CheckType::Criminal
    }
}

fn test_config() -> GatewayConfig {
    GatewayConfig {
        provider_timeout_secs: 5,
        default_limits: ProviderLimits {
            rpm: 600,
            rph: 100_000,
            rpd: 1_000_000,
            burst: 50,
        },
        retry: RetryConfig {
            max_attempts: 1,
            initial_delay_ms: 1,
            backoff_base: 2.0,
            max_delay_ms: 10,
        },
        circuit: CircuitConfig {
            failure_threshold: 5,
            recovery_timeout_secs: 60,
            half_open_max_calls: 1,
        },
    }
}

fn gateway_with(
    providers: Vec<MockProvider>,
    resolver: DataSourceResolver,
    audit_store: Arc<MemoryAuditStore>,
) -> (ProviderGateway, Arc<MemoryCacheStore>) {
    let cache = Arc::new(MemoryCacheStore::new());
    let mut gateway = ProviderGateway::new(
        test_config(),
        cache.clone() as Arc<dyn CacheStore>,
        FreshnessPolicy::new(CacheConfig::default()),
        resolver,
        AuditLogger::new(audit_store),
    );
    for provider in providers {
        gateway.register_provider(Arc::new(provider));
    }
    (gateway, cache)
}

fn ctx() -> RequestContext {
    RequestContext::new(TenantId::new(), Jurisdiction::Us)
}

fn identity_request() -> ProviderRequest {
    ProviderRequest::new(CheckType::Identity, ScreeningTier::Standard)
        .with_param("name", "Alice Smith")
        .with_param("dob", "1990-04-02")
}

#[tokio::test]
async fn second_call_is_served_from_cache() {
    let provider = MockProvider::new("registry", vec![CheckType::Identity])
        .steady_records(vec![ProviderRecord::new("rec-1")]);
    let resolver = DataSourceResolver::new().with(ProviderRegistration::new(
        ProviderId::new("registry"),
        vec![CheckType::Identity],
    ));
    let (gateway, _cache) = gateway_with(vec![provider], resolver, Arc::new(MemoryAuditStore::new()));

    let ctx = ctx();
    let first = gateway
        .call(&ctx, &AllowAll, &ProviderId::new("registry"), &identity_request())
        .await
        .unwrap();
    assert!(!first.from_cache);

    let second = gateway
        .call(&ctx, &AllowAll, &ProviderId::new("registry"), &identity_request())
        .await
        .unwrap();
    assert!(second.from_cache);
    assert!(!second.stale);
}

#[tokio::test]
async fn sanctions_are_never_cached() {
    let provider = MockProvider::new("sanctions-db", vec![CheckType::Sanctions])
        .authoritative()
        .steady_records(vec![ProviderRecord::new("hit-1")]);
    let resolver = DataSourceResolver::new().with(ProviderRegistration::new(
        ProviderId::new("sanctions-db"),
        vec![CheckType::Sanctions],
    ));
    let (gateway, _cache) = gateway_with(vec![provider], resolver, Arc::new(MemoryAuditStore::new()));

    let ctx = ctx();
    let request = ProviderRequest::new(CheckType::Sanctions, ScreeningTier::Standard)
        .with_param("name", "Alice Smith");

    for _ in 0..2 {
        let result = gateway
            .call(&ctx, &AllowAll, &ProviderId::new("sanctions-db"), &request)
            .await
            .unwrap();
        // Zero-width windows: every lookup refreshes at the source.
        assert!(!result.from_cache);
    }
}

#[tokio::test]
async fn denied_check_never_reaches_a_provider() {
    let provider = MockProvider::new("courts", vec![CheckType::Criminal])
        .steady_records(vec![ProviderRecord::new("case-1")]);
    let resolver = DataSourceResolver::new().with(ProviderRegistration::new(
        ProviderId::new("courts"),
        vec![CheckType::Criminal],
    ));
    let audit_store = Arc::new(MemoryAuditStore::new());
    let (gateway, _cache) = gateway_with(vec![provider], resolver, audit_store.clone());

    let ctx = ctx();
    let request = ProviderRequest::new(CheckType::Criminal, ScreeningTier::Standard)
        .with_param("name", "Alice Smith");

    let error = gateway
        .call(&ctx, &DenyCriminal, &ProviderId::new("courts"), &request)
        .await
        .unwrap_err();
    assert_eq!(error.code, ErrorCode::CheckNotPermitted);

    // The denial is audited.
    let events = audit_store
        .events_for_tenant(&ctx.tenant_id.to_string(), &AuditFilter::default())
        .await
        .unwrap();
    assert!(events
        .iter()
        .any(|e| e.event_type.to_string() == "ComplianceGateDenied"));
}

#[tokio::test]
async fn circuit_opens_after_failures_and_recovers() {
    tokio::time::pause();

    let provider = MockProvider::new("flaky", vec![CheckType::Identity]).failing(
        5,
        ProviderFailure::unavailable("upstream down"),
    );
    let resolver = DataSourceResolver::new().with(ProviderRegistration::new(
        ProviderId::new("flaky"),
        vec![CheckType::Identity],
    ));
    let (gateway, _cache) = gateway_with(vec![provider], resolver, Arc::new(MemoryAuditStore::new()));

    let ctx = ctx();
    let provider_id = ProviderId::new("flaky");

    // Five consecutive failures open the circuit. Params vary per call so
    // the cache and single-flight stay out of the way.
    for i in 0..5 {
        let request = ProviderRequest::new(CheckType::Identity, ScreeningTier::Standard)
            .with_param("name", format!("subject {}", i));
        assert!(gateway.call(&ctx, &AllowAll, &provider_id, &request).await.is_err());
    }
    assert_eq!(gateway.circuit_state(&provider_id).await, CircuitState::Open);

    // While open, calls short-circuit without reaching the provider.
    let request = ProviderRequest::new(CheckType::Identity, ScreeningTier::Standard)
        .with_param("name", "short circuit probe");
    let error = gateway
        .call(&ctx, &AllowAll, &provider_id, &request)
        .await
        .unwrap_err();
    assert_eq!(error.code, ErrorCode::ServiceUnavailable);

    // After the recovery timeout a probe succeeds (script exhausted, steady
    // state is an empty success) and the circuit closes.
    tokio::time::advance(tokio::time::Duration::from_secs(61)).await;
    let request = ProviderRequest::new(CheckType::Identity, ScreeningTier::Standard)
        .with_param("name", "post recovery");
    gateway
        .call(&ctx, &AllowAll, &provider_id, &request)
        .await
        .unwrap();
    assert_eq!(gateway.circuit_state(&provider_id).await, CircuitState::Closed);
}

#[tokio::test]
async fn exhausted_provider_falls_back_to_next_in_chain() {
    let primary = MockProvider::new("primary", vec![CheckType::Employment]).failing(
        3,
        ProviderFailure::unavailable("maintenance window"),
    );
    let secondary = MockProvider::new("secondary", vec![CheckType::Employment])
        .steady_records(vec![ProviderRecord::new("employment-1")]);

    let resolver = DataSourceResolver::new()
        .with(
            ProviderRegistration::new(ProviderId::new("primary"), vec![CheckType::Employment])
                .with_priority(1),
        )
        .with(
            ProviderRegistration::new(ProviderId::new("secondary"), vec![CheckType::Employment])
                .with_priority(2),
        );
    let (gateway, _cache) =
        gateway_with(vec![primary, secondary], resolver, Arc::new(MemoryAuditStore::new()));

    let ctx = ctx();
    let request = ProviderRequest::new(CheckType::Employment, ScreeningTier::Standard)
        .with_param("name", "Alice Smith");

    let result = gateway
        .call_with_fallback(&ctx, &AllowAll, CheckType::Employment, &request, &ctx.jurisdiction, None)
        .await
        .unwrap();
    assert_eq!(result.response.provider_id, ProviderId::new("secondary"));
}

#[tokio::test]
async fn all_providers_exhausted_is_reported() {
    let only = MockProvider::new("only", vec![CheckType::Education]).failing(
        3,
        ProviderFailure::unavailable("down"),
    );
    let resolver = DataSourceResolver::new().with(ProviderRegistration::new(
        ProviderId::new("only"),
        vec![CheckType::Education],
    ));
    let (gateway, _cache) = gateway_with(vec![only], resolver, Arc::new(MemoryAuditStore::new()));

    let ctx = ctx();
    let request = ProviderRequest::new(CheckType::Education, ScreeningTier::Standard)
        .with_param("name", "Alice Smith");

    let error = gateway
        .call_with_fallback(&ctx, &AllowAll, CheckType::Education, &request, &ctx.jurisdiction, None)
        .await
        .unwrap_err();
    assert_eq!(error.code, ErrorCode::ProvidersExhausted);
}

#[tokio::test]
async fn concurrent_identical_requests_coalesce_into_one_fetch() {
    let provider = MockProvider::new("slow", vec![CheckType::Identity])
        .steady_records(vec![ProviderRecord::new("rec-1")]);
    let resolver = DataSourceResolver::new().with(ProviderRegistration::new(
        ProviderId::new("slow"),
        vec![CheckType::Identity],
    ));

    let cache = Arc::new(MemoryCacheStore::new());
    let mut gateway = ProviderGateway::new(
        test_config(),
        cache as Arc<dyn CacheStore>,
        FreshnessPolicy::new(CacheConfig::default()),
        resolver,
        AuditLogger::new(Arc::new(MemoryAuditStore::new())),
    );
    let provider = Arc::new(provider);
    gateway.register_provider(provider.clone());
    let gateway = Arc::new(gateway);

    let ctx = ctx();
    let mut handles = Vec::new();
    for _ in 0..8 {
        let gateway = Arc::clone(&gateway);
        let ctx = ctx.clone();
        handles.push(tokio::spawn(async move {
            gateway
                .call(&ctx, &AllowAll, &ProviderId::new("slow"), &identity_request())
                .await
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().is_ok());
    }

    // Followers coalesced onto the leader's fetch or hit the populated
    // cache; the provider saw far fewer calls than callers.
    assert!(provider.call_count() <= 2, "saw {} calls", provider.call_count());
}
