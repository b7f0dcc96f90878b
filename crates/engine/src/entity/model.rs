use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use screening_core::types::{EntityId, Jurisdiction, RoleCategory, ScreeningId, SubjectId, TenantId};

/// Identifying attributes of a screened person or organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectIdentifiers {
    pub full_name: String,
    pub dob: Option<NaiveDate>,
    /// SSN / national id is never stored raw; only its hash is kept.
    pub national_id_hash: Option<String>,
    pub addresses: Vec<String>,
}

impl SubjectIdentifiers {
    pub fn new(full_name: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            dob: None,
            national_id_hash: None,
            addresses: Vec::new(),
        }
    }

    pub fn with_dob(mut self, dob: NaiveDate) -> Self {
        self.dob = Some(dob);
        self
    }

    pub fn with_national_id(mut self, raw_id: &str) -> Self {
        self.national_id_hash = Some(hash_identifier(raw_id));
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.addresses.push(address.into());
        self
    }
}

/// Canonical hash of a national identifier, used for exact entity matching.
pub fn hash_identifier(raw: &str) -> String {
    let normalized: String = raw.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
    let mut hasher = Sha256::new();
    hasher.update(normalized.to_lowercase().as_bytes());
    hex::encode(hasher.finalize())
}

/// A screening subject as submitted by a tenant. Immutable after creation;
/// corrections create a new version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subject {
    pub id: SubjectId,
    pub tenant_id: TenantId,
    pub identifiers: SubjectIdentifiers,
    pub jurisdiction: Jurisdiction,
    pub role_category: RoleCategory,
    pub version: u32,
    pub created_at: DateTime<Utc>,
}

impl Subject {
    pub fn new(
        tenant_id: TenantId,
        identifiers: SubjectIdentifiers,
        jurisdiction: Jurisdiction,
        role_category: RoleCategory,
    ) -> Self {
        Self {
            id: SubjectId::new(),
            tenant_id,
            identifiers,
            jurisdiction,
            role_category,
            version: 1,
            created_at: Utc::now(),
        }
    }

    /// Produce the next version of this subject with updated identifiers.
    pub fn revised(&self, identifiers: SubjectIdentifiers) -> Self {
        Self {
            id: self.id,
            tenant_id: self.tenant_id,
            identifiers,
            jurisdiction: self.jurisdiction.clone(),
            role_category: self.role_category,
            version: self.version + 1,
            created_at: Utc::now(),
        }
    }
}

/// Resolved canonical entity. Multiple subjects referencing the same real
/// person share one entity; a subject references exactly one entity at a
/// time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRecord {
    pub id: EntityId,
    pub tenant_id: TenantId,
    pub canonical: SubjectIdentifiers,
    pub subject_ids: Vec<SubjectId>,
    pub screening_ids: Vec<ScreeningId>,
    pub updated_at: DateTime<Utc>,
}

impl EntityRecord {
    pub fn from_subject(subject: &Subject) -> Self {
        Self {
            id: EntityId::new(),
            tenant_id: subject.tenant_id,
            canonical: subject.identifiers.clone(),
            subject_ids: vec![subject.id],
            screening_ids: Vec::new(),
            updated_at: Utc::now(),
        }
    }
}

/// Record of a merge or split, kept for audit and reversal. A merge is
/// reversible until confirmed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityOperation {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub kind: EntityOperationKind,
    pub performed_at: DateTime<Utc>,
    pub confirmed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum EntityOperationKind {
    Merge {
        source: EntityId,
        target: EntityId,
        moved_screenings: Vec<ScreeningId>,
    },
    Split {
        source: EntityId,
        new_entity: EntityId,
        moved_screenings: Vec<ScreeningId>,
    },
}
