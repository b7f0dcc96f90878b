use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use screening_core::audit::{AuditEvent, AuditLogger, EventType};
use screening_core::context::RequestContext;
use screening_core::error::{Error, ErrorCode, Result};
use screening_core::types::{EntityId, ProfileVersion, TenantId};

use crate::risk::{Finding, RiskLevel};

use super::model::{EntityGraph, Profile};

/// Storage seam for versioned profiles.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn latest(&self, ctx: &RequestContext, entity_id: EntityId) -> Result<Option<Profile>>;

    async fn get(
        &self,
        ctx: &RequestContext,
        entity_id: EntityId,
        version: ProfileVersion,
    ) -> Result<Option<Profile>>;

    /// Append a profile. Implementations must reject version gaps or
    /// duplicates: `profile.version` must be exactly `latest + 1`.
    async fn append(&self, ctx: &RequestContext, profile: Profile) -> Result<()>;
}

/// In-memory profile store keyed by tenant and entity.
pub struct MemoryProfileStore {
    profiles: RwLock<HashMap<(TenantId, EntityId), Vec<Profile>>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self {
            profiles: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryProfileStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn latest(&self, ctx: &RequestContext, entity_id: EntityId) -> Result<Option<Profile>> {
        let profiles = self.profiles.read().await;
        Ok(profiles
            .get(&(ctx.tenant_id, entity_id))
            .and_then(|versions| versions.last().cloned()))
    }

    async fn get(
        &self,
        ctx: &RequestContext,
        entity_id: EntityId,
        version: ProfileVersion,
    ) -> Result<Option<Profile>> {
        let profiles = self.profiles.read().await;
        Ok(profiles
            .get(&(ctx.tenant_id, entity_id))
            .and_then(|versions| versions.iter().find(|p| p.version == version).cloned()))
    }

    async fn append(&self, ctx: &RequestContext, profile: Profile) -> Result<()> {
        let mut profiles = self.profiles.write().await;
        let versions = profiles
            .entry((ctx.tenant_id, profile.entity_id))
            .or_default();
        let expected = versions
            .last()
            .map(|p| p.version.next())
            .unwrap_or_else(ProfileVersion::first);
        if profile.version != expected {
            return Err(Error::new(
                ErrorCode::VersionConflict,
                format!(
                    "profile version {} does not follow {} for entity {}",
                    profile.version,
                    versions
                        .last()
                        .map(|p| p.version.to_string())
                        .unwrap_or_else(|| "none".to_string()),
                    profile.entity_id
                ),
            ));
        }
        versions.push(profile);
        Ok(())
    }
}

/// Publishes new profile versions. Version assignment for one entity is
/// serialized behind a per-entity lock so concurrent investigations cannot
/// race the sequence.
pub struct ProfilePublisher {
    store: Arc<dyn ProfileStore>,
    audit: AuditLogger,
    entity_locks: DashMap<EntityId, Arc<Mutex<()>>>,
}

impl ProfilePublisher {
    pub fn new(store: Arc<dyn ProfileStore>, audit: AuditLogger) -> Self {
        Self {
            store,
            audit,
            entity_locks: DashMap::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn ProfileStore> {
        &self.store
    }

    fn lock_for(&self, entity_id: EntityId) -> Arc<Mutex<()>> {
        self.entity_locks
            .entry(entity_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    pub async fn publish(
        &self,
        ctx: &RequestContext,
        entity_id: EntityId,
        findings: Vec<Finding>,
        risk_score: f64,
        risk_level: RiskLevel,
        entity_graph: EntityGraph,
    ) -> Result<Profile> {
        let lock = self.lock_for(entity_id);
        let _guard = lock.lock().await;

        let version = self
            .store
            .latest(ctx, entity_id)
            .await?
            .map(|p| p.version.next())
            .unwrap_or_else(ProfileVersion::first);

        let profile = Profile {
            entity_id,
            version,
            findings,
            risk_score,
            risk_level,
            entity_graph,
            created_at: Utc::now(),
        };
        self.store.append(ctx, profile.clone()).await?;

        let event = AuditEvent::builder(
            EventType::ProfileVersioned,
            format!(
                "profile {} for entity {} (score {:.1})",
                version, entity_id, risk_score
            ),
        )
        .resource("entity", entity_id.to_string())
        .metadata("version", serde_json::json!(version.0))
        .metadata("risk_score", serde_json::json!(risk_score))
        .build();
        self.audit.log_event(ctx, event).await?;

        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use screening_core::audit::MemoryAuditStore;
    use screening_core::types::Jurisdiction;

    fn publisher(store: Arc<MemoryProfileStore>) -> ProfilePublisher {
        ProfilePublisher::new(store, AuditLogger::new(Arc::new(MemoryAuditStore::new())))
    }

    #[tokio::test]
    async fn versions_are_strictly_monotonic_without_gaps() {
        let store = Arc::new(MemoryProfileStore::new());
        let publisher = publisher(store.clone());
        let ctx = RequestContext::new(TenantId::new(), Jurisdiction::Us);
        let entity_id = EntityId::new();

        for expected in 1..=3u32 {
            let profile = publisher
                .publish(
                    &ctx,
                    entity_id,
                    Vec::new(),
                    10.0 * expected as f64,
                    RiskLevel::Low,
                    EntityGraph::new(),
                )
                .await
                .unwrap();
            assert_eq!(profile.version.0, expected);
        }
    }

    #[tokio::test]
    async fn store_rejects_version_gaps() {
        let store = MemoryProfileStore::new();
        let ctx = RequestContext::new(TenantId::new(), Jurisdiction::Us);
        let entity_id = EntityId::new();

        let profile = Profile {
            entity_id,
            version: ProfileVersion(2),
            findings: Vec::new(),
            risk_score: 0.0,
            risk_level: RiskLevel::Low,
            entity_graph: EntityGraph::new(),
            created_at: Utc::now(),
        };
        let error = store.append(&ctx, profile).await.unwrap_err();
        assert_eq!(error.code, ErrorCode::VersionConflict);
    }

    #[tokio::test]
    async fn concurrent_publishes_serialize_per_entity() {
        let store = Arc::new(MemoryProfileStore::new());
        let publisher = Arc::new(publisher(store.clone()));
        let ctx = RequestContext::new(TenantId::new(), Jurisdiction::Us);
        let entity_id = EntityId::new();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let publisher = Arc::clone(&publisher);
            let ctx = ctx.clone();
            handles.push(tokio::spawn(async move {
                publisher
                    .publish(&ctx, entity_id, Vec::new(), 5.0, RiskLevel::Low, EntityGraph::new())
                    .await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }

        let latest = store.latest(&ctx, entity_id).await.unwrap().unwrap();
        assert_eq!(latest.version.0, 8);
    }
}
