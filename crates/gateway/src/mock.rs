use async_trait::async_trait;
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::Mutex;

use screening_core::context::RequestContext;
use screening_core::types::{CheckType, ProviderId};

use crate::provider::{
    Provider, ProviderFailure, ProviderRecord, ProviderRequest, ProviderResponse, SourceAuthority,
};

type ScriptedOutcome = Result<Vec<ProviderRecord>, ProviderFailure>;

/// Deterministic scripted provider for wiring defaults and tests.
///
/// Outcomes are served in script order; once the script is exhausted the
/// provider keeps returning the configured steady-state records.
pub struct MockProvider {
    id: ProviderId,
    checks: Vec<CheckType>,
    authority: SourceAuthority,
    script: Mutex<VecDeque<ScriptedOutcome>>,
    steady_records: Vec<ProviderRecord>,
    latency: Option<std::time::Duration>,
    calls: AtomicU32,
}

impl MockProvider {
    pub fn new(id: impl Into<String>, checks: Vec<CheckType>) -> Self {
        Self {
            id: ProviderId::new(id),
            checks,
            authority: SourceAuthority::Corroborative,
            script: Mutex::new(VecDeque::new()),
            steady_records: Vec::new(),
            latency: None,
            calls: AtomicU32::new(0),
        }
    }

    /// Simulated response latency before each outcome.
    pub fn with_latency(mut self, latency: std::time::Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn authoritative(mut self) -> Self {
        self.authority = SourceAuthority::Authoritative;
        self
    }

    pub fn self_reported(mut self) -> Self {
        self.authority = SourceAuthority::SelfReported;
        self
    }

    /// Queue an outcome to serve before steady state.
    pub fn push_outcome(self, outcome: ScriptedOutcome) -> Self {
        self.script
            .try_lock()
            .expect("script configured before use")
            .push_back(outcome);
        self
    }

    /// Queue `count` consecutive failures.
    pub fn failing(self, count: usize, failure: ProviderFailure) -> Self {
        let mut this = self;
        for _ in 0..count {
            this = this.push_outcome(Err(failure.clone()));
        }
        this
    }

    /// Records served once the script is exhausted.
    pub fn steady_records(mut self, records: Vec<ProviderRecord>) -> Self {
        self.steady_records = records;
        self
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn id(&self) -> &ProviderId {
        &self.id
    }

    fn supported_checks(&self) -> &[CheckType] {
        &self.checks
    }

    fn authority(&self) -> SourceAuthority {
        self.authority
    }

    async fn execute(
        &self,
        _ctx: &RequestContext,
        request: &ProviderRequest,
    ) -> Result<ProviderResponse, ProviderFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let scripted = self.script.lock().await.pop_front();
        let records = match scripted {
            Some(Ok(records)) => records,
            Some(Err(failure)) => return Err(failure),
            None => self.steady_records.clone(),
        };

        Ok(ProviderResponse {
            provider_id: self.id.clone(),
            check_type: request.check_type,
            authority: self.authority,
            records,
            retrieved_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use screening_core::types::{Jurisdiction, ScreeningTier, TenantId};

    fn ctx() -> RequestContext {
        RequestContext::new(TenantId::new(), Jurisdiction::Us)
    }

    #[tokio::test]
    async fn script_plays_in_order_then_steady_state() {
        let provider = MockProvider::new("mock", vec![CheckType::Identity])
            .push_outcome(Err(ProviderFailure::timeout("first call times out")))
            .steady_records(vec![ProviderRecord::new("rec-1")]);

        let request = ProviderRequest::new(CheckType::Identity, ScreeningTier::Standard);

        assert!(provider.execute(&ctx(), &request).await.is_err());
        let response = provider.execute(&ctx(), &request).await.unwrap();
        assert_eq!(response.records.len(), 1);
        assert_eq!(provider.call_count(), 2);
    }
}
