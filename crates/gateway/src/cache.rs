use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use screening_core::config::CacheConfig;
use screening_core::error::Result;
use screening_core::types::{CheckType, ProviderId, ScreeningTier};

use crate::provider::ProviderResponse;

/// Stable hash over `(provider, check_type, normalized query inputs)`.
///
/// Normalization: values lowercased, trimmed, interior whitespace collapsed;
/// key order is stable because params travel in a `BTreeMap`. Tenant-scoped
/// inputs include the tenant id as an ordinary param, which scopes the entry
/// without a separate keying mechanism.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(pub String);

impl Fingerprint {
    pub fn compute(
        provider_id: &ProviderId,
        check_type: CheckType,
        params: &BTreeMap<String, String>,
    ) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(provider_id.as_str().as_bytes());
        hasher.update(b"\x1f");
        hasher.update(check_type.as_str().as_bytes());
        for (key, value) in params {
            hasher.update(b"\x1f");
            hasher.update(key.as_bytes());
            hasher.update(b"=");
            hasher.update(normalize_value(value).as_bytes());
        }
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn normalize_value(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Cached provider result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub fingerprint: Fingerprint,
    pub provider_id: ProviderId,
    pub check_type: CheckType,
    pub payload: ProviderResponse,
    pub cached_at: DateTime<Utc>,
}

/// Freshness decision for a cache hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Within the fresh window: return the cached payload
    Fresh,
    /// Between fresh and stale: acceptable for Standard, refreshed for Enhanced
    Stale,
    /// Past the stale window: must refresh
    Expired,
}

impl std::fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheStatus::Fresh => write!(f, "fresh"),
            CacheStatus::Stale => write!(f, "stale"),
            CacheStatus::Expired => write!(f, "expired"),
        }
    }
}

/// Age windows per check type, with Enhanced-tier tightening.
#[derive(Debug, Clone, Copy)]
pub struct FreshnessPolicy {
    config: CacheConfig,
}

impl FreshnessPolicy {
    pub fn new(config: CacheConfig) -> Self {
        Self { config }
    }

    /// Base `(fresh, stale)` windows for the Standard tier.
    pub fn base_windows(check_type: CheckType) -> (Duration, Duration) {
        match check_type {
            // Sanctions data must always come from the source.
            CheckType::Sanctions => (Duration::zero(), Duration::zero()),
            CheckType::AdverseMedia | CheckType::DigitalFootprint => {
                (Duration::hours(24), Duration::days(7))
            }
            CheckType::Criminal | CheckType::Civil => (Duration::days(7), Duration::days(30)),
            CheckType::Regulatory | CheckType::Credit | CheckType::Licenses | CheckType::Identity => {
                (Duration::days(30), Duration::days(90))
            }
            CheckType::Employment => (Duration::days(90), Duration::days(180)),
            CheckType::Education => (Duration::days(365), Duration::days(730)),
        }
    }

    /// Windows for a tier. Enhanced tightens fresh to 50% and stale to 70%
    /// of the standard windows (factors configurable).
    pub fn windows(&self, check_type: CheckType, tier: ScreeningTier) -> (Duration, Duration) {
        let (fresh, stale) = Self::base_windows(check_type);
        match tier {
            ScreeningTier::Standard => (fresh, stale),
            ScreeningTier::Enhanced => (
                scale(fresh, self.config.enhanced_fresh_factor),
                scale(stale, self.config.enhanced_stale_factor),
            ),
        }
    }

    /// Classify a cache entry's age.
    pub fn status(&self, age: Duration, check_type: CheckType, tier: ScreeningTier) -> CacheStatus {
        let (fresh, stale) = self.windows(check_type, tier);
        if age < fresh {
            CacheStatus::Fresh
        } else if age < stale {
            CacheStatus::Stale
        } else {
            CacheStatus::Expired
        }
    }
}

fn scale(window: Duration, factor: f64) -> Duration {
    let ms = window.num_milliseconds() as f64 * factor;
    Duration::milliseconds(ms as i64)
}

/// Content-addressed store of provider results.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, fingerprint: &Fingerprint) -> Result<Option<CacheEntry>>;
    async fn put(&self, entry: CacheEntry) -> Result<()>;
}

/// In-memory cache store.
pub struct MemoryCacheStore {
    entries: DashMap<Fingerprint, CacheEntry>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, fingerprint: &Fingerprint) -> Result<Option<CacheEntry>> {
        Ok(self.entries.get(fingerprint).map(|e| e.clone()))
    }

    async fn put(&self, entry: CacheEntry) -> Result<()> {
        self.entries.insert(entry.fingerprint.clone(), entry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> FreshnessPolicy {
        FreshnessPolicy::new(CacheConfig::default())
    }

    #[test]
    fn fingerprint_is_stable_across_param_order_and_case() {
        let provider = ProviderId::new("registry-a");
        let mut a = BTreeMap::new();
        a.insert("name".to_string(), "Alice   Smith".to_string());
        a.insert("dob".to_string(), "1990-01-01".to_string());

        let mut b = BTreeMap::new();
        b.insert("dob".to_string(), "1990-01-01".to_string());
        b.insert("name".to_string(), "ALICE SMITH".to_string());

        assert_eq!(
            Fingerprint::compute(&provider, CheckType::Identity, &a),
            Fingerprint::compute(&provider, CheckType::Identity, &b)
        );
    }

    #[test]
    fn fingerprint_differs_across_providers_and_checks() {
        let params = BTreeMap::new();
        let a = Fingerprint::compute(&ProviderId::new("p1"), CheckType::Identity, &params);
        let b = Fingerprint::compute(&ProviderId::new("p2"), CheckType::Identity, &params);
        let c = Fingerprint::compute(&ProviderId::new("p1"), CheckType::Criminal, &params);
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn standard_windows_match_the_policy_table() {
        let policy = policy();
        let cases = [
            (CheckType::Sanctions, Duration::zero(), Duration::zero()),
            (CheckType::AdverseMedia, Duration::hours(24), Duration::days(7)),
            (CheckType::Criminal, Duration::days(7), Duration::days(30)),
            (CheckType::Regulatory, Duration::days(30), Duration::days(90)),
            (CheckType::Credit, Duration::days(30), Duration::days(90)),
            (CheckType::Employment, Duration::days(90), Duration::days(180)),
            (CheckType::Education, Duration::days(365), Duration::days(730)),
        ];
        for (check, fresh, stale) in cases {
            assert_eq!(
                policy.windows(check, ScreeningTier::Standard),
                (fresh, stale),
                "windows for {}",
                check
            );
        }
    }

    #[test]
    fn enhanced_windows_are_exactly_half_and_seventy_percent() {
        let policy = policy();
        let (fresh, stale) = policy.windows(CheckType::Criminal, ScreeningTier::Enhanced);
        assert_eq!(fresh, Duration::milliseconds(Duration::days(7).num_milliseconds() / 2));
        assert_eq!(
            stale,
            Duration::milliseconds((Duration::days(30).num_milliseconds() as f64 * 0.7) as i64)
        );
    }

    #[test]
    fn sanctions_are_always_expired() {
        let policy = policy();
        assert_eq!(
            policy.status(Duration::zero(), CheckType::Sanctions, ScreeningTier::Standard),
            CacheStatus::Expired
        );
    }

    #[test]
    fn status_transitions_at_window_edges() {
        let policy = policy();
        assert_eq!(
            policy.status(Duration::days(6), CheckType::Criminal, ScreeningTier::Standard),
            CacheStatus::Fresh
        );
        assert_eq!(
            policy.status(Duration::days(8), CheckType::Criminal, ScreeningTier::Standard),
            CacheStatus::Stale
        );
        assert_eq!(
            policy.status(Duration::days(31), CheckType::Criminal, ScreeningTier::Standard),
            CacheStatus::Expired
        );
        // Enhanced fresh window for criminal is 3.5 days.
        assert_eq!(
            policy.status(Duration::days(4), CheckType::Criminal, ScreeningTier::Enhanced),
            CacheStatus::Stale
        );
    }
}
