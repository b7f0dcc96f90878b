use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use screening_core::context::RequestContext;
use screening_core::error::{Error, Result};
use screening_core::types::{
    Degree, EntityId, Jurisdiction, ProfileVersion, RoleCategory, ScreeningTier, TenantId,
    VigilanceLevel,
};
use screening_engine::entity::SubjectIdentifiers;

/// Ongoing-monitoring configuration for one entity.
///
/// `next_check_at` strictly increases across executions; a terminated
/// employee's config is deactivated rather than deleted so history remains
/// auditable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub entity_id: EntityId,
    pub tenant_id: TenantId,
    pub vigilance: VigilanceLevel,
    pub baseline_profile_version: ProfileVersion,
    pub next_check_at: DateTime<Utc>,
    pub active: bool,
    pub role_category: RoleCategory,
    pub tier: ScreeningTier,
    pub degree: Degree,
    pub jurisdiction: Jurisdiction,
    pub identifiers: SubjectIdentifiers,
}

impl MonitoringConfig {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        entity_id: EntityId,
        tenant_id: TenantId,
        role_category: RoleCategory,
        tier: ScreeningTier,
        degree: Degree,
        jurisdiction: Jurisdiction,
        identifiers: SubjectIdentifiers,
        baseline_profile_version: ProfileVersion,
    ) -> Self {
        let vigilance = default_vigilance(role_category);
        Self {
            entity_id,
            tenant_id,
            vigilance,
            baseline_profile_version,
            next_check_at: Utc::now() + vigilance.interval(),
            active: true,
            role_category,
            tier,
            degree,
            jurisdiction,
            identifiers,
        }
    }
}

/// Default vigilance by role category.
pub fn default_vigilance(role: RoleCategory) -> VigilanceLevel {
    match role {
        RoleCategory::Government => VigilanceLevel::V2,
        RoleCategory::Energy => VigilanceLevel::V3,
        RoleCategory::Finance => VigilanceLevel::V2,
        RoleCategory::Healthcare | RoleCategory::Other => VigilanceLevel::V1,
    }
}

/// Escalate vigilance based on the entity's current risk score: >= 75
/// forces V3, >= 50 forces at least V2. Never de-escalates below the role
/// default.
pub fn effective_vigilance(role: RoleCategory, current_risk: f64) -> VigilanceLevel {
    let base = default_vigilance(role);
    if current_risk >= 75.0 {
        VigilanceLevel::V3
    } else if current_risk >= 50.0 && base < VigilanceLevel::V2 {
        VigilanceLevel::V2
    } else {
        base
    }
}

/// Storage seam for monitoring configs.
#[async_trait]
pub trait MonitoringStore: Send + Sync {
    async fn upsert(&self, ctx: &RequestContext, config: MonitoringConfig) -> Result<()>;

    async fn get(&self, ctx: &RequestContext, entity_id: EntityId)
        -> Result<Option<MonitoringConfig>>;

    /// Active configs whose `next_check_at` is at or before `now`.
    async fn due(&self, now: DateTime<Utc>) -> Result<Vec<MonitoringConfig>>;

    async fn deactivate(&self, ctx: &RequestContext, entity_id: EntityId) -> Result<()>;
}

/// In-memory monitoring store.
pub struct MemoryMonitoringStore {
    configs: RwLock<Vec<MonitoringConfig>>,
}

impl MemoryMonitoringStore {
    pub fn new() -> Self {
        Self {
            configs: RwLock::new(Vec::new()),
        }
    }
}

impl Default for MemoryMonitoringStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MonitoringStore for MemoryMonitoringStore {
    async fn upsert(&self, ctx: &RequestContext, config: MonitoringConfig) -> Result<()> {
        if config.tenant_id != ctx.tenant_id {
            return Err(Error::permission("monitoring config belongs to another tenant"));
        }
        let mut configs = self.configs.write().await;
        match configs
            .iter_mut()
            .find(|c| c.entity_id == config.entity_id && c.tenant_id == config.tenant_id)
        {
            Some(existing) => *existing = config,
            None => configs.push(config),
        }
        Ok(())
    }

    async fn get(
        &self,
        ctx: &RequestContext,
        entity_id: EntityId,
    ) -> Result<Option<MonitoringConfig>> {
        let configs = self.configs.read().await;
        Ok(configs
            .iter()
            .find(|c| c.entity_id == entity_id && c.tenant_id == ctx.tenant_id)
            .cloned())
    }

    async fn due(&self, now: DateTime<Utc>) -> Result<Vec<MonitoringConfig>> {
        let configs = self.configs.read().await;
        Ok(configs
            .iter()
            .filter(|c| c.active && c.next_check_at <= now)
            .cloned()
            .collect())
    }

    async fn deactivate(&self, ctx: &RequestContext, entity_id: EntityId) -> Result<()> {
        let mut configs = self.configs.write().await;
        if let Some(config) = configs
            .iter_mut()
            .find(|c| c.entity_id == entity_id && c.tenant_id == ctx.tenant_id)
        {
            config.active = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use screening_core::types::Jurisdiction;

    #[test]
    fn role_defaults_match_contract() {
        assert_eq!(default_vigilance(RoleCategory::Government), VigilanceLevel::V2);
        assert_eq!(default_vigilance(RoleCategory::Energy), VigilanceLevel::V3);
        assert_eq!(default_vigilance(RoleCategory::Finance), VigilanceLevel::V2);
        assert_eq!(default_vigilance(RoleCategory::Other), VigilanceLevel::V1);
    }

    #[test]
    fn risk_escalates_vigilance() {
        assert_eq!(effective_vigilance(RoleCategory::Other, 80.0), VigilanceLevel::V3);
        assert_eq!(effective_vigilance(RoleCategory::Other, 60.0), VigilanceLevel::V2);
        assert_eq!(effective_vigilance(RoleCategory::Other, 20.0), VigilanceLevel::V1);
        // Already-high defaults are not lowered.
        assert_eq!(effective_vigilance(RoleCategory::Energy, 10.0), VigilanceLevel::V3);
        assert_eq!(effective_vigilance(RoleCategory::Government, 60.0), VigilanceLevel::V2);
    }

    fn config(ctx: &RequestContext, due_offset_secs: i64) -> MonitoringConfig {
        let mut config = MonitoringConfig::new(
            EntityId::new(),
            ctx.tenant_id,
            RoleCategory::Other,
            ScreeningTier::Standard,
            Degree::D1,
            Jurisdiction::Us,
            SubjectIdentifiers::new("Alice Smith"),
            ProfileVersion::first(),
        );
        config.next_check_at = Utc::now() + chrono::Duration::seconds(due_offset_secs);
        config
    }

    #[tokio::test]
    async fn due_returns_only_elapsed_active_configs() {
        let store = MemoryMonitoringStore::new();
        let ctx = RequestContext::new(TenantId::new(), Jurisdiction::Us);

        let due_config = config(&ctx, -60);
        let due_entity = due_config.entity_id;
        store.upsert(&ctx, due_config).await.unwrap();
        store.upsert(&ctx, config(&ctx, 3600)).await.unwrap();

        let mut inactive = config(&ctx, -60);
        inactive.active = false;
        store.upsert(&ctx, inactive).await.unwrap();

        let due = store.due(Utc::now()).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].entity_id, due_entity);
    }

    #[tokio::test]
    async fn deactivation_stops_scheduling() {
        let store = MemoryMonitoringStore::new();
        let ctx = RequestContext::new(TenantId::new(), Jurisdiction::Us);
        let c = config(&ctx, -60);
        let entity_id = c.entity_id;
        store.upsert(&ctx, c).await.unwrap();

        store.deactivate(&ctx, entity_id).await.unwrap();
        assert!(store.due(Utc::now()).await.unwrap().is_empty());
    }
}
