use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::types::{Jurisdiction, TenantId};

/// Immutable context carried through every operation in the system.
///
/// A context is created once at the boundary (API call, lifecycle event,
/// scheduler tick) and cloned into each downstream call. Store operations
/// scope themselves to `tenant_id`; every error and audit event carries the
/// `correlation_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContext {
    pub correlation_id: String,
    pub tenant_id: TenantId,
    pub user_id: Option<String>,
    pub jurisdiction: Jurisdiction,
    pub timestamp: DateTime<Utc>,
    pub audit_meta: HashMap<String, serde_json::Value>,
}

impl RequestContext {
    pub fn new(tenant_id: TenantId, jurisdiction: Jurisdiction) -> Self {
        Self {
            correlation_id: Uuid::new_v4().to_string(),
            tenant_id,
            user_id: None,
            jurisdiction,
            timestamp: Utc::now(),
            audit_meta: HashMap::new(),
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = correlation_id.into();
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_audit_meta(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.audit_meta.insert(key.into(), value);
        self
    }

    /// Derive a child context for a sub-operation (degree branch, monitoring
    /// run). The correlation id is preserved so audit ordering holds across
    /// the whole investigation tree; the timestamp is refreshed.
    pub fn child(&self) -> Self {
        Self {
            correlation_id: self.correlation_id.clone(),
            tenant_id: self.tenant_id,
            user_id: self.user_id.clone(),
            jurisdiction: self.jurisdiction.clone(),
            timestamp: Utc::now(),
            audit_meta: self.audit_meta.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_preserves_correlation_and_tenant() {
        let ctx = RequestContext::new(TenantId::new(), Jurisdiction::Us)
            .with_user_id("analyst-7");
        let child = ctx.child();

        assert_eq!(child.correlation_id, ctx.correlation_id);
        assert_eq!(child.tenant_id, ctx.tenant_id);
        assert_eq!(child.user_id.as_deref(), Some("analyst-7"));
    }
}
