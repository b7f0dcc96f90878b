use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use screening_core::audit::{AuditEvent, AuditLogger, EventType};
use screening_core::context::RequestContext;
use screening_core::error::{Error, Result};
use screening_core::types::{EntityId, ScreeningId, SubjectId, TenantId};

use super::model::{EntityOperation, EntityOperationKind, EntityRecord};

/// Storage seam for canonical entities. All queries are tenant-scoped
/// through the request context.
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn get(&self, ctx: &RequestContext, id: EntityId) -> Result<Option<EntityRecord>>;

    async fn find_by_identifier_hash(
        &self,
        ctx: &RequestContext,
        id_hash: &str,
    ) -> Result<Option<EntityRecord>>;

    async fn entities_for_tenant(&self, ctx: &RequestContext) -> Result<Vec<EntityRecord>>;

    async fn upsert(&self, ctx: &RequestContext, entity: EntityRecord) -> Result<()>;

    async fn attach_subject(
        &self,
        ctx: &RequestContext,
        entity_id: EntityId,
        subject_id: SubjectId,
    ) -> Result<()>;

    async fn attach_screening(
        &self,
        ctx: &RequestContext,
        entity_id: EntityId,
        screening_id: ScreeningId,
    ) -> Result<()>;

    async fn record_operation(&self, ctx: &RequestContext, operation: EntityOperation) -> Result<()>;

    async fn operations_for_tenant(&self, ctx: &RequestContext) -> Result<Vec<EntityOperation>>;
}

/// In-memory entity store keyed by tenant.
pub struct MemoryEntityStore {
    entities: RwLock<HashMap<TenantId, Vec<EntityRecord>>>,
    operations: RwLock<HashMap<TenantId, Vec<EntityOperation>>>,
}

impl MemoryEntityStore {
    pub fn new() -> Self {
        Self {
            entities: RwLock::new(HashMap::new()),
            operations: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryEntityStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EntityStore for MemoryEntityStore {
    async fn get(&self, ctx: &RequestContext, id: EntityId) -> Result<Option<EntityRecord>> {
        let entities = self.entities.read().await;
        Ok(entities
            .get(&ctx.tenant_id)
            .and_then(|list| list.iter().find(|e| e.id == id).cloned()))
    }

    async fn find_by_identifier_hash(
        &self,
        ctx: &RequestContext,
        id_hash: &str,
    ) -> Result<Option<EntityRecord>> {
        let entities = self.entities.read().await;
        Ok(entities.get(&ctx.tenant_id).and_then(|list| {
            list.iter()
                .find(|e| e.canonical.national_id_hash.as_deref() == Some(id_hash))
                .cloned()
        }))
    }

    async fn entities_for_tenant(&self, ctx: &RequestContext) -> Result<Vec<EntityRecord>> {
        let entities = self.entities.read().await;
        Ok(entities.get(&ctx.tenant_id).cloned().unwrap_or_default())
    }

    async fn upsert(&self, ctx: &RequestContext, entity: EntityRecord) -> Result<()> {
        let mut entities = self.entities.write().await;
        let list = entities.entry(ctx.tenant_id).or_default();
        match list.iter_mut().find(|e| e.id == entity.id) {
            Some(existing) => *existing = entity,
            None => list.push(entity),
        }
        Ok(())
    }

    async fn attach_subject(
        &self,
        ctx: &RequestContext,
        entity_id: EntityId,
        subject_id: SubjectId,
    ) -> Result<()> {
        let mut entities = self.entities.write().await;
        let list = entities.entry(ctx.tenant_id).or_default();
        let entity = list
            .iter_mut()
            .find(|e| e.id == entity_id)
            .ok_or_else(|| Error::not_found(format!("entity {} not found", entity_id)))?;
        if !entity.subject_ids.contains(&subject_id) {
            entity.subject_ids.push(subject_id);
            entity.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn attach_screening(
        &self,
        ctx: &RequestContext,
        entity_id: EntityId,
        screening_id: ScreeningId,
    ) -> Result<()> {
        let mut entities = self.entities.write().await;
        let list = entities.entry(ctx.tenant_id).or_default();
        let entity = list
            .iter_mut()
            .find(|e| e.id == entity_id)
            .ok_or_else(|| Error::not_found(format!("entity {} not found", entity_id)))?;
        if !entity.screening_ids.contains(&screening_id) {
            entity.screening_ids.push(screening_id);
            entity.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn record_operation(&self, ctx: &RequestContext, operation: EntityOperation) -> Result<()> {
        self.operations
            .write()
            .await
            .entry(ctx.tenant_id)
            .or_default()
            .push(operation);
        Ok(())
    }

    async fn operations_for_tenant(&self, ctx: &RequestContext) -> Result<Vec<EntityOperation>> {
        let operations = self.operations.read().await;
        Ok(operations.get(&ctx.tenant_id).cloned().unwrap_or_default())
    }
}

/// Merge and split operations over entities, with operation records for
/// audit and reversal.
pub struct EntityOperations {
    store: std::sync::Arc<dyn EntityStore>,
    audit: AuditLogger,
}

impl EntityOperations {
    pub fn new(store: std::sync::Arc<dyn EntityStore>, audit: AuditLogger) -> Self {
        Self { store, audit }
    }

    /// Merge `source` into `target`: subjects and screenings move to the
    /// target; the source entity is emptied. Reversible until confirmed.
    pub async fn merge(
        &self,
        ctx: &RequestContext,
        source_id: EntityId,
        target_id: EntityId,
    ) -> Result<EntityOperation> {
        if source_id == target_id {
            return Err(Error::validation("cannot merge an entity into itself"));
        }
        let source = self
            .store
            .get(ctx, source_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("entity {} not found", source_id)))?;
        let mut target = self
            .store
            .get(ctx, target_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("entity {} not found", target_id)))?;

        let moved_screenings = source.screening_ids.clone();
        for subject_id in &source.subject_ids {
            if !target.subject_ids.contains(subject_id) {
                target.subject_ids.push(*subject_id);
            }
        }
        for screening_id in &moved_screenings {
            if !target.screening_ids.contains(screening_id) {
                target.screening_ids.push(*screening_id);
            }
        }
        target.updated_at = Utc::now();

        let mut emptied = source.clone();
        emptied.subject_ids.clear();
        emptied.screening_ids.clear();
        emptied.updated_at = Utc::now();

        self.store.upsert(ctx, target).await?;
        self.store.upsert(ctx, emptied).await?;

        let operation = EntityOperation {
            id: Uuid::new_v4(),
            tenant_id: ctx.tenant_id,
            kind: EntityOperationKind::Merge {
                source: source_id,
                target: target_id,
                moved_screenings,
            },
            performed_at: Utc::now(),
            confirmed: false,
        };
        self.store.record_operation(ctx, operation.clone()).await?;

        let event = AuditEvent::builder(
            EventType::EntityMerged,
            format!("merged entity {} into {}", source_id, target_id),
        )
        .resource("entity", target_id.to_string())
        .metadata("source", serde_json::json!(source_id.to_string()))
        .build();
        self.audit.log_event(ctx, event).await?;

        Ok(operation)
    }

    /// Split a subset of screenings out of `source` into a new entity.
    pub async fn split(
        &self,
        ctx: &RequestContext,
        source_id: EntityId,
        screenings_to_move: &[ScreeningId],
    ) -> Result<EntityOperation> {
        let mut source = self
            .store
            .get(ctx, source_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("entity {} not found", source_id)))?;

        let moved: Vec<ScreeningId> = source
            .screening_ids
            .iter()
            .filter(|id| screenings_to_move.contains(*id))
            .copied()
            .collect();
        if moved.is_empty() {
            return Err(Error::validation(
                "split requires at least one screening to move",
            ));
        }
        source.screening_ids.retain(|id| !moved.contains(id));
        source.updated_at = Utc::now();

        let new_entity = EntityRecord {
            id: EntityId::new(),
            tenant_id: ctx.tenant_id,
            canonical: source.canonical.clone(),
            subject_ids: Vec::new(),
            screening_ids: moved.clone(),
            updated_at: Utc::now(),
        };
        let new_entity_id = new_entity.id;

        self.store.upsert(ctx, source).await?;
        self.store.upsert(ctx, new_entity).await?;

        let operation = EntityOperation {
            id: Uuid::new_v4(),
            tenant_id: ctx.tenant_id,
            kind: EntityOperationKind::Split {
                source: source_id,
                new_entity: new_entity_id,
                moved_screenings: moved,
            },
            performed_at: Utc::now(),
            confirmed: false,
        };
        self.store.record_operation(ctx, operation.clone()).await?;

        let event = AuditEvent::builder(
            EventType::EntitySplit,
            format!("split entity {} into {}", source_id, new_entity_id),
        )
        .resource("entity", source_id.to_string())
        .metadata("new_entity", serde_json::json!(new_entity_id.to_string()))
        .build();
        self.audit.log_event(ctx, event).await?;

        Ok(operation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::model::{Subject, SubjectIdentifiers};
    use screening_core::audit::MemoryAuditStore;
    use screening_core::types::Jurisdiction;
    use screening_core::types::RoleCategory;
    use std::sync::Arc;

    async fn seeded_entity(
        store: &MemoryEntityStore,
        ctx: &RequestContext,
        name: &str,
        screenings: usize,
    ) -> EntityRecord {
        let subject = Subject::new(
            ctx.tenant_id,
            SubjectIdentifiers::new(name),
            Jurisdiction::Us,
            RoleCategory::Other,
        );
        let mut entity = EntityRecord::from_subject(&subject);
        for _ in 0..screenings {
            entity.screening_ids.push(ScreeningId::new());
        }
        store.upsert(ctx, entity.clone()).await.unwrap();
        entity
    }

    fn ops(store: Arc<MemoryEntityStore>) -> EntityOperations {
        EntityOperations::new(store, AuditLogger::new(Arc::new(MemoryAuditStore::new())))
    }

    #[tokio::test]
    async fn merge_moves_screenings_and_records_operation() {
        let store = Arc::new(MemoryEntityStore::new());
        let ctx = RequestContext::new(TenantId::new(), Jurisdiction::Us);
        let source = seeded_entity(&store, &ctx, "Alice Smith", 2).await;
        let target = seeded_entity(&store, &ctx, "Alice B Smith", 1).await;

        let ops = ops(store.clone());
        let operation = ops.merge(&ctx, source.id, target.id).await.unwrap();
        assert!(!operation.confirmed);

        let merged = store.get(&ctx, target.id).await.unwrap().unwrap();
        assert_eq!(merged.screening_ids.len(), 3);
        let emptied = store.get(&ctx, source.id).await.unwrap().unwrap();
        assert!(emptied.screening_ids.is_empty());

        let recorded = store.operations_for_tenant(&ctx).await.unwrap();
        assert_eq!(recorded.len(), 1);
    }

    #[tokio::test]
    async fn split_moves_selected_screenings_to_new_entity() {
        let store = Arc::new(MemoryEntityStore::new());
        let ctx = RequestContext::new(TenantId::new(), Jurisdiction::Us);
        let source = seeded_entity(&store, &ctx, "Alice Smith", 3).await;
        let to_move = vec![source.screening_ids[0], source.screening_ids[2]];

        let ops = ops(store.clone());
        let operation = ops.split(&ctx, source.id, &to_move).await.unwrap();

        let remaining = store.get(&ctx, source.id).await.unwrap().unwrap();
        assert_eq!(remaining.screening_ids.len(), 1);

        if let EntityOperationKind::Split { new_entity, .. } = operation.kind {
            let created = store.get(&ctx, new_entity).await.unwrap().unwrap();
            assert_eq!(created.screening_ids, to_move);
        } else {
            panic!("expected split operation");
        }
    }

    #[tokio::test]
    async fn tenant_scoping_isolates_entities() {
        let store = Arc::new(MemoryEntityStore::new());
        let ctx_a = RequestContext::new(TenantId::new(), Jurisdiction::Us);
        let ctx_b = RequestContext::new(TenantId::new(), Jurisdiction::Us);
        let entity = seeded_entity(&store, &ctx_a, "Alice Smith", 0).await;

        assert!(store.get(&ctx_b, entity.id).await.unwrap().is_none());
        assert!(store.get(&ctx_a, entity.id).await.unwrap().is_some());
    }
}
