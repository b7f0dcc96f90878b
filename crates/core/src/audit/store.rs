use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;

use super::chain::{chain_hash, verify_chain, ChainBreak};
use super::event::AuditEvent;
use crate::error::Result;

/// Filter for querying audit events
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub correlation_id: Option<String>,
    pub event_types: Option<Vec<String>>,
    pub limit: Option<usize>,
}

impl AuditFilter {
    pub fn for_correlation(correlation_id: impl Into<String>) -> Self {
        Self {
            correlation_id: Some(correlation_id.into()),
            ..Default::default()
        }
    }

    fn matches(&self, event: &AuditEvent) -> bool {
        if let Some(start) = self.start_time {
            if event.timestamp < start {
                return false;
            }
        }
        if let Some(end) = self.end_time {
            if event.timestamp > end {
                return false;
            }
        }
        if let Some(correlation_id) = &self.correlation_id {
            if event.correlation_id.as_deref() != Some(correlation_id.as_str()) {
                return false;
            }
        }
        if let Some(types) = &self.event_types {
            if !types.iter().any(|t| t == &event.event_type.to_string()) {
                return false;
            }
        }
        true
    }
}

/// Append-only audit event store. Implementations chain events per tenant;
/// the chain key for events without a tenant is `"system"`.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Append an event, computing and filling its chain hashes. Returns the
    /// stored event.
    async fn append(&self, event: AuditEvent) -> Result<AuditEvent>;

    /// Retrieve a tenant's events in append order, filtered.
    async fn events_for_tenant(&self, tenant_id: &str, filter: &AuditFilter)
        -> Result<Vec<AuditEvent>>;

    /// Verify a tenant's hash chain end to end.
    async fn verify_tenant_chain(&self, tenant_id: &str) -> Result<std::result::Result<(), ChainBreak>>;
}

const SYSTEM_CHAIN: &str = "system";

fn chain_key(event: &AuditEvent) -> String {
    event
        .tenant_id
        .clone()
        .unwrap_or_else(|| SYSTEM_CHAIN.to_string())
}

/// In-memory audit store. Appends for one tenant are serialized behind a
/// single mutex so chain links never interleave.
pub struct MemoryAuditStore {
    chains: Mutex<HashMap<String, Vec<AuditEvent>>>,
}

impl MemoryAuditStore {
    pub fn new() -> Self {
        Self {
            chains: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryAuditStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuditStore for MemoryAuditStore {
    async fn append(&self, mut event: AuditEvent) -> Result<AuditEvent> {
        let key = chain_key(&event);
        let mut chains = self.chains.lock().await;
        let chain = chains.entry(key).or_default();

        let prev = chain.last().and_then(|e| e.hash.clone());
        event.prev_hash = prev.clone();
        event.hash = Some(chain_hash(prev.as_deref(), &event));
        chain.push(event.clone());
        Ok(event)
    }

    async fn events_for_tenant(
        &self,
        tenant_id: &str,
        filter: &AuditFilter,
    ) -> Result<Vec<AuditEvent>> {
        let chains = self.chains.lock().await;
        let events = chains
            .get(tenant_id)
            .map(|chain| {
                let mut matched: Vec<AuditEvent> = chain
                    .iter()
                    .filter(|e| filter.matches(e))
                    .cloned()
                    .collect();
                if let Some(limit) = filter.limit {
                    matched.truncate(limit);
                }
                matched
            })
            .unwrap_or_default();
        Ok(events)
    }

    async fn verify_tenant_chain(
        &self,
        tenant_id: &str,
    ) -> Result<std::result::Result<(), ChainBreak>> {
        let chains = self.chains.lock().await;
        let outcome = chains
            .get(tenant_id)
            .map(|chain| verify_chain(chain))
            .unwrap_or(Ok(()));
        Ok(outcome)
    }
}
