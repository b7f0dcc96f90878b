use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use screening_core::types::{FactId, InfoType, ProviderId};
use screening_gateway::SourceAuthority;

/// A single attribute-level claim extracted from a provider record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactClaim {
    pub attribute: String,
    pub value: serde_json::Value,
}

impl FactClaim {
    pub fn new(attribute: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            attribute: attribute.into(),
            value,
        }
    }

    /// String form of the value used for contradiction comparison.
    pub fn value_text(&self) -> String {
        match &self.value {
            serde_json::Value::String(s) => s.trim().to_lowercase(),
            other => other.to_string(),
        }
    }
}

/// Facts are append-only within an investigation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fact {
    pub id: FactId,
    pub info_type: InfoType,
    pub claim: FactClaim,
    pub source_provider: ProviderId,
    pub authority: SourceAuthority,
    /// Provider-side references evidencing the claim
    pub evidence_refs: Vec<String>,
    pub confidence: f64,
    pub discovered_at: DateTime<Utc>,
}

impl Fact {
    pub fn new(
        info_type: InfoType,
        claim: FactClaim,
        source_provider: ProviderId,
        authority: SourceAuthority,
    ) -> Self {
        let confidence = match authority {
            SourceAuthority::Authoritative => 0.9,
            SourceAuthority::Corroborative => 0.7,
            SourceAuthority::SelfReported => 0.5,
        };
        Self {
            id: FactId::new(),
            info_type,
            claim,
            source_provider,
            authority,
            evidence_refs: Vec::new(),
            confidence,
            discovered_at: Utc::now(),
        }
    }

    pub fn with_evidence(mut self, evidence_ref: impl Into<String>) -> Self {
        self.evidence_refs.push(evidence_ref.into());
        self
    }

    pub fn with_discovered_at(mut self, at: DateTime<Utc>) -> Self {
        self.discovered_at = at;
        self
    }
}

/// Reconciliation status of an inconsistency between facts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationStatus {
    Open,
    Resolved,
    AcceptedConflict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InconsistencyKind {
    /// Dates that cannot physically coexist (end before start, overlapping
    /// exclusive engagements)
    TimelineImpossibility,
    /// The same attribute asserted with conflicting values by different
    /// sources
    ClaimContradiction,
    /// Core identifiers (DOB, national id) disagree across sources
    IdentifierMismatch,
}

impl std::fmt::Display for InconsistencyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InconsistencyKind::TimelineImpossibility => write!(f, "timeline_impossibility"),
            InconsistencyKind::ClaimContradiction => write!(f, "claim_contradiction"),
            InconsistencyKind::IdentifierMismatch => write!(f, "identifier_mismatch"),
        }
    }
}

/// Two or more facts whose claims contradict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inconsistency {
    pub id: Uuid,
    pub kind: InconsistencyKind,
    pub info_type: InfoType,
    pub fact_ids: Vec<FactId>,
    pub description: String,
    pub status: ReconciliationStatus,
}

impl Inconsistency {
    pub fn new(
        kind: InconsistencyKind,
        info_type: InfoType,
        fact_ids: Vec<FactId>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            info_type,
            fact_ids,
            description: description.into(),
            status: ReconciliationStatus::Open,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == ReconciliationStatus::Open
    }
}

/// What kind of information is still missing for an info type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapKind {
    /// An expected attribute has no fact at all
    MissingFundamental,
    /// Present but confirmed by a single source only
    Corroboration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gap {
    pub info_type: InfoType,
    pub attribute: String,
    pub kind: GapKind,
}

impl Gap {
    pub fn missing(info_type: InfoType, attribute: impl Into<String>) -> Self {
        Self {
            info_type,
            attribute: attribute.into(),
            kind: GapKind::MissingFundamental,
        }
    }

    pub fn corroboration(info_type: InfoType, attribute: impl Into<String>) -> Self {
        Self {
            info_type,
            attribute: attribute.into(),
            kind: GapKind::Corroboration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fact_confidence_follows_authority() {
        let authoritative = Fact::new(
            InfoType::Identity,
            FactClaim::new("full_name", serde_json::json!("Alice Smith")),
            ProviderId::new("gov"),
            SourceAuthority::Authoritative,
        );
        let self_reported = Fact::new(
            InfoType::Identity,
            FactClaim::new("full_name", serde_json::json!("Alice Smith")),
            ProviderId::new("form"),
            SourceAuthority::SelfReported,
        );
        assert!(authoritative.confidence > self_reported.confidence);
    }

    #[test]
    fn claim_value_text_normalizes_strings() {
        let claim = FactClaim::new("full_name", serde_json::json!("  Alice SMITH "));
        assert_eq!(claim.value_text(), "alice smith");
    }

    #[test]
    fn gap_ordering_puts_fundamental_first() {
        assert!(GapKind::MissingFundamental < GapKind::Corroboration);
    }
}
