use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use screening_core::context::RequestContext;
use screening_core::error::Result;
use screening_core::types::{ScreeningId, TenantId};

use crate::sar::SarState;

use super::screening::{ScreeningPhase, ScreeningResult};

/// Durable screening state: enough to resume after a process restart from
/// the last terminal info-type boundary, and to serve status queries after
/// a finished screening leaves the in-memory active set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreeningCheckpoint {
    pub screening_id: ScreeningId,
    pub phase: ScreeningPhase,
    pub progress_percent: u8,
    /// Terminal SAR states reached so far; resumed runs skip these types
    pub completed_info_types: Vec<SarState>,
    /// Final result, present once the screening completed
    pub result: Option<ScreeningResult>,
    /// Failure description, present once the screening failed
    pub failure: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl ScreeningCheckpoint {
    pub fn new(screening_id: ScreeningId, phase: ScreeningPhase, progress_percent: u8) -> Self {
        Self {
            screening_id,
            phase,
            progress_percent,
            completed_info_types: Vec::new(),
            result: None,
            failure: None,
            updated_at: Utc::now(),
        }
    }
}

/// Storage seam for screening state.
#[async_trait]
pub trait ScreeningStateStore: Send + Sync {
    async fn save(&self, ctx: &RequestContext, checkpoint: ScreeningCheckpoint) -> Result<()>;

    async fn load(
        &self,
        ctx: &RequestContext,
        screening_id: ScreeningId,
    ) -> Result<Option<ScreeningCheckpoint>>;
}

/// In-memory screening state store.
pub struct MemoryScreeningStateStore {
    checkpoints: DashMap<(TenantId, ScreeningId), ScreeningCheckpoint>,
}

impl MemoryScreeningStateStore {
    pub fn new() -> Self {
        Self {
            checkpoints: DashMap::new(),
        }
    }
}

impl Default for MemoryScreeningStateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ScreeningStateStore for MemoryScreeningStateStore {
    async fn save(&self, ctx: &RequestContext, checkpoint: ScreeningCheckpoint) -> Result<()> {
        self.checkpoints
            .insert((ctx.tenant_id, checkpoint.screening_id), checkpoint);
        Ok(())
    }

    async fn load(
        &self,
        ctx: &RequestContext,
        screening_id: ScreeningId,
    ) -> Result<Option<ScreeningCheckpoint>> {
        Ok(self
            .checkpoints
            .get(&(ctx.tenant_id, screening_id))
            .map(|c| c.clone()))
    }
}
