use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use screening_core::types::{FactId, FindingCategory, FindingId, Severity};

/// A categorized, severity-scored observation about the subject, backed by
/// at least one supporting fact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub id: FindingId,
    pub category: FindingCategory,
    pub subcategory: String,
    pub severity: Severity,
    pub date: Option<NaiveDate>,
    pub description: String,
    pub supporting_facts: Vec<FactId>,
    pub relevance_to_role: f64,
}

impl Finding {
    /// Finding ids are derived from content so identical inputs produce
    /// identical ids across runs, which profile deltas depend on.
    pub fn deterministic_id(subcategory: &str, description: &str, date: Option<NaiveDate>) -> FindingId {
        let mut hasher = Sha256::new();
        hasher.update(subcategory.as_bytes());
        hasher.update(b"\x1f");
        hasher.update(description.as_bytes());
        hasher.update(b"\x1f");
        if let Some(date) = date {
            hasher.update(date.to_string().as_bytes());
        }
        let digest = hasher.finalize();
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&digest[..16]);
        FindingId(Uuid::from_bytes(bytes))
    }

    pub fn new(
        subcategory: impl Into<String>,
        description: impl Into<String>,
        date: Option<NaiveDate>,
        supporting_facts: Vec<FactId>,
    ) -> Self {
        let subcategory = subcategory.into();
        let description = description.into();
        debug_assert!(!supporting_facts.is_empty(), "findings require supporting facts");
        Self {
            id: Self::deterministic_id(&subcategory, &description, date),
            category: FindingCategory::Verification,
            subcategory,
            severity: Severity::Low,
            date,
            description,
            supporting_facts,
            relevance_to_role: 0.5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_content_yields_identical_ids() {
        let date = NaiveDate::from_ymd_opt(2019, 6, 1);
        let a = Finding::deterministic_id("felony_conviction", "Felony fraud conviction", date);
        let b = Finding::deterministic_id("felony_conviction", "Felony fraud conviction", date);
        assert_eq!(a, b);
    }

    #[test]
    fn different_content_yields_different_ids() {
        let a = Finding::deterministic_id("felony_conviction", "Felony fraud conviction", None);
        let b = Finding::deterministic_id("misdemeanor", "Petty theft", None);
        assert_ne!(a, b);
    }
}
