use chrono::Duration;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantId(pub Uuid);

impl TenantId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TenantId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubjectId(pub Uuid);

impl SubjectId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for SubjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId(pub Uuid);

impl EntityId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScreeningId(pub Uuid);

impl ScreeningId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for ScreeningId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FactId(pub Uuid);

impl FactId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for FactId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FindingId(pub Uuid);

impl FindingId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for FindingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for an external data provider, assigned at registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProviderId(pub String);

impl ProviderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Profile versions are strictly monotonic per entity, starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProfileVersion(pub u32);

impl ProfileVersion {
    pub fn first() -> Self {
        Self(1)
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl std::fmt::Display for ProfileVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Service level of a screening request.
///
/// Enhanced unlocks degree D3, tightens cache freshness windows and widens
/// the provider set available to the planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScreeningTier {
    Standard,
    Enhanced,
}

impl std::fmt::Display for ScreeningTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScreeningTier::Standard => write!(f, "standard"),
            ScreeningTier::Enhanced => write!(f, "enhanced"),
        }
    }
}

/// Depth of network expansion from the primary subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Degree {
    D1,
    D2,
    D3,
}

impl Degree {
    /// D3 expansion is only available on the Enhanced tier.
    pub fn is_compatible_with(&self, tier: ScreeningTier) -> bool {
        !matches!((self, tier), (Degree::D3, ScreeningTier::Standard))
    }

    pub fn depth(&self) -> u8 {
        match self {
            Degree::D1 => 1,
            Degree::D2 => 2,
            Degree::D3 => 3,
        }
    }
}

impl std::fmt::Display for Degree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Ordered phases of information gathering. Foundation must fully terminate
/// before Records begins, Records before Intelligence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InfoPhase {
    Foundation,
    Records,
    Intelligence,
}

impl InfoPhase {
    pub fn all() -> [InfoPhase; 3] {
        [
            InfoPhase::Foundation,
            InfoPhase::Records,
            InfoPhase::Intelligence,
        ]
    }
}

impl std::fmt::Display for InfoPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InfoPhase::Foundation => write!(f, "foundation"),
            InfoPhase::Records => write!(f, "records"),
            InfoPhase::Intelligence => write!(f, "intelligence"),
        }
    }
}

/// Closed enumeration of the information types an investigation gathers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InfoType {
    Identity,
    Employment,
    Education,
    Criminal,
    Civil,
    Financial,
    Licenses,
    Regulatory,
    Sanctions,
    AdverseMedia,
    DigitalFootprint,
}

impl InfoType {
    /// All info types in phase order; the SAR dispatcher iterates this.
    pub fn all() -> &'static [InfoType] {
        &[
            InfoType::Identity,
            InfoType::Employment,
            InfoType::Education,
            InfoType::Criminal,
            InfoType::Civil,
            InfoType::Financial,
            InfoType::Licenses,
            InfoType::Regulatory,
            InfoType::Sanctions,
            InfoType::AdverseMedia,
            InfoType::DigitalFootprint,
        ]
    }

    pub fn phase(&self) -> InfoPhase {
        match self {
            InfoType::Identity | InfoType::Employment | InfoType::Education => InfoPhase::Foundation,
            InfoType::Criminal
            | InfoType::Civil
            | InfoType::Financial
            | InfoType::Licenses
            | InfoType::Regulatory
            | InfoType::Sanctions => InfoPhase::Records,
            InfoType::AdverseMedia | InfoType::DigitalFootprint => InfoPhase::Intelligence,
        }
    }

    /// The provider-level check this info type is gathered through.
    pub fn check_type(&self) -> CheckType {
        match self {
            InfoType::Identity => CheckType::Identity,
            InfoType::Employment => CheckType::Employment,
            InfoType::Education => CheckType::Education,
            InfoType::Criminal => CheckType::Criminal,
            InfoType::Civil => CheckType::Civil,
            InfoType::Financial => CheckType::Credit,
            InfoType::Licenses => CheckType::Licenses,
            InfoType::Regulatory => CheckType::Regulatory,
            InfoType::Sanctions => CheckType::Sanctions,
            InfoType::AdverseMedia => CheckType::AdverseMedia,
            InfoType::DigitalFootprint => CheckType::DigitalFootprint,
        }
    }
}

impl std::fmt::Display for InfoType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            InfoType::Identity => "identity",
            InfoType::Employment => "employment",
            InfoType::Education => "education",
            InfoType::Criminal => "criminal",
            InfoType::Civil => "civil",
            InfoType::Financial => "financial",
            InfoType::Licenses => "licenses",
            InfoType::Regulatory => "regulatory",
            InfoType::Sanctions => "sanctions",
            InfoType::AdverseMedia => "adverse_media",
            InfoType::DigitalFootprint => "digital_footprint",
        };
        write!(f, "{}", name)
    }
}

/// Provider-level check categories, used by the compliance gate, the cache
/// freshness policy and the data source resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckType {
    Identity,
    Employment,
    Education,
    Criminal,
    Civil,
    Credit,
    Licenses,
    Regulatory,
    Sanctions,
    AdverseMedia,
    DigitalFootprint,
}

impl CheckType {
    pub fn all() -> &'static [CheckType] {
        &[
            CheckType::Identity,
            CheckType::Employment,
            CheckType::Education,
            CheckType::Criminal,
            CheckType::Civil,
            CheckType::Credit,
            CheckType::Licenses,
            CheckType::Regulatory,
            CheckType::Sanctions,
            CheckType::AdverseMedia,
            CheckType::DigitalFootprint,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckType::Identity => "identity",
            CheckType::Employment => "employment",
            CheckType::Education => "education",
            CheckType::Criminal => "criminal",
            CheckType::Civil => "civil",
            CheckType::Credit => "credit",
            CheckType::Licenses => "licenses",
            CheckType::Regulatory => "regulatory",
            CheckType::Sanctions => "sanctions",
            CheckType::AdverseMedia => "adverse_media",
            CheckType::DigitalFootprint => "digital_footprint",
        }
    }
}

impl std::fmt::Display for CheckType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Jurisdiction governing which compliance rules apply to a screening.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Jurisdiction {
    Us,
    Eu,
    Uk,
    Ca,
    Other(String),
}

impl std::fmt::Display for Jurisdiction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Jurisdiction::Us => write!(f, "us"),
            Jurisdiction::Eu => write!(f, "eu"),
            Jurisdiction::Uk => write!(f, "uk"),
            Jurisdiction::Ca => write!(f, "ca"),
            Jurisdiction::Other(code) => write!(f, "{}", code),
        }
    }
}

/// Role category of the screened subject, used for compliance matching and
/// the default vigilance mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleCategory {
    Government,
    Energy,
    Finance,
    Healthcare,
    Other,
}

impl std::fmt::Display for RoleCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoleCategory::Government => write!(f, "government"),
            RoleCategory::Energy => write!(f, "energy"),
            RoleCategory::Finance => write!(f, "finance"),
            RoleCategory::Healthcare => write!(f, "healthcare"),
            RoleCategory::Other => write!(f, "other"),
        }
    }
}

/// Monitoring cadence for an entity under ongoing vigilance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VigilanceLevel {
    /// Annual full re-investigation.
    V1,
    /// Monthly delta run over the high-risk source subset.
    V2,
    /// Bi-monthly full re-investigation.
    V3,
}

impl VigilanceLevel {
    pub fn interval(&self) -> Duration {
        match self {
            VigilanceLevel::V1 => Duration::days(365),
            VigilanceLevel::V2 => Duration::days(30),
            VigilanceLevel::V3 => Duration::days(15),
        }
    }

    /// V1 and V3 rerun the full investigation; V2 is delta-only.
    pub fn is_full_rerun(&self) -> bool {
        matches!(self, VigilanceLevel::V1 | VigilanceLevel::V3)
    }
}

impl std::fmt::Display for VigilanceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Severity of a finding. Ordered: Low < Medium < High < Critical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Numeric weight used by the risk aggregator's base score.
    pub fn weight(&self) -> f64 {
        match self {
            Severity::Low => 5.0,
            Severity::Medium => 15.0,
            Severity::High => 30.0,
            Severity::Critical => 50.0,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "LOW"),
            Severity::Medium => write!(f, "MEDIUM"),
            Severity::High => write!(f, "HIGH"),
            Severity::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Category assigned to a finding by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingCategory {
    Criminal,
    Financial,
    Regulatory,
    Reputation,
    Verification,
    Behavioral,
    Network,
}

impl std::fmt::Display for FindingCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FindingCategory::Criminal => "criminal",
            FindingCategory::Financial => "financial",
            FindingCategory::Regulatory => "regulatory",
            FindingCategory::Reputation => "reputation",
            FindingCategory::Verification => "verification",
            FindingCategory::Behavioral => "behavioral",
            FindingCategory::Network => "network",
        };
        write!(f, "{}", name)
    }
}
