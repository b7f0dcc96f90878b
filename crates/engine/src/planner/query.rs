use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use screening_core::types::{CheckType, ProviderId, ScreeningTier};
use screening_gateway::ProviderRequest;

/// Why a query was generated; refinement queries are gap-targeted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryPurpose {
    Initial,
    GapFollowUp,
}

/// One planned provider query, bound to a permitted provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub provider_id: ProviderId,
    pub check_type: CheckType,
    pub params: BTreeMap<String, String>,
    pub purpose: QueryPurpose,
}

impl SearchQuery {
    pub fn new(provider_id: ProviderId, check_type: CheckType, purpose: QueryPurpose) -> Self {
        Self {
            provider_id,
            check_type,
            params: BTreeMap::new(),
            purpose,
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Deduplication key: provider plus normalized params.
    pub fn dedupe_key(&self) -> String {
        let mut key = format!("{}|{}", self.provider_id, self.check_type);
        for (k, v) in &self.params {
            key.push('|');
            key.push_str(k);
            key.push('=');
            key.push_str(&v.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase());
        }
        key
    }

    pub fn to_request(&self, tier: ScreeningTier) -> ProviderRequest {
        let mut request = ProviderRequest::new(self.check_type, tier);
        request.params = self.params.clone();
        request
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedupe_key_ignores_whitespace_and_case() {
        let a = SearchQuery::new(ProviderId::new("p"), CheckType::Identity, QueryPurpose::Initial)
            .with_param("name", "Alice  Smith");
        let b = SearchQuery::new(ProviderId::new("p"), CheckType::Identity, QueryPurpose::Initial)
            .with_param("name", "alice smith");
        assert_eq!(a.dedupe_key(), b.dedupe_key());
    }

    #[test]
    fn dedupe_key_distinguishes_providers() {
        let a = SearchQuery::new(ProviderId::new("p1"), CheckType::Identity, QueryPurpose::Initial);
        let b = SearchQuery::new(ProviderId::new("p2"), CheckType::Identity, QueryPurpose::Initial);
        assert_ne!(a.dedupe_key(), b.dedupe_key());
    }
}
