use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use screening_core::types::{InfoType, ScreeningId};
use screening_gateway::SourceAuthority;

use super::fact::{Fact, Gap, Inconsistency};

/// Immutable view of an info type's accumulated knowledge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KbSnapshot {
    pub info_type: InfoType,
    pub facts: Vec<Fact>,
    pub inconsistencies: Vec<Inconsistency>,
    pub gaps: Vec<Gap>,
}

/// A connection to another entity surfaced by the investigation, feeding
/// degree expansion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionCandidate {
    pub kind: ConnectionKind,
    pub name: String,
    /// Shared identifiers strengthen the connection (addresses, phones)
    pub shared_identifiers: u32,
    /// Strength of any financial tie in [0, 1]
    pub financial_tie: f64,
    /// Closeness to the subject's role in [0, 1]
    pub role_proximity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionKind {
    Employer,
    Associate,
    Address,
    FinancialPartner,
}

impl ConnectionCandidate {
    /// Relevance ranking used by the degree orchestrator's expansion queue.
    pub fn relevance(&self) -> f64 {
        0.5 * self.role_proximity
            + 0.3 * self.financial_tie
            + 0.2 * (f64::from(self.shared_identifiers).min(5.0) / 5.0)
    }
}

struct KbInner {
    facts: Vec<Fact>,
    inconsistencies: Vec<Inconsistency>,
    gaps: Vec<Gap>,
}

/// Per-investigation knowledge base.
///
/// Facts are append-only and monotonic: nothing is ever removed within an
/// investigation. Query results assemble out of order, but commits for one
/// info type are serialized through that type's commit lock so iteration
/// boundaries stay clean.
pub struct KnowledgeBase {
    screening_id: ScreeningId,
    inner: RwLock<KbInner>,
    commit_locks: HashMap<InfoType, Arc<Mutex<()>>>,
}

impl KnowledgeBase {
    pub fn new(screening_id: ScreeningId) -> Self {
        let commit_locks = InfoType::all()
            .iter()
            .map(|t| (*t, Arc::new(Mutex::new(()))))
            .collect();
        Self {
            screening_id,
            inner: RwLock::new(KbInner {
                facts: Vec::new(),
                inconsistencies: Vec::new(),
                gaps: Vec::new(),
            }),
            commit_locks,
        }
    }

    pub fn screening_id(&self) -> ScreeningId {
        self.screening_id
    }

    /// Serialize commits for one info type. Held across an iteration's
    /// fact/inconsistency/gap write-back.
    pub fn commit_lock(&self, info_type: InfoType) -> Arc<Mutex<()>> {
        Arc::clone(
            self.commit_locks
                .get(&info_type)
                .expect("lock exists for every info type"),
        )
    }

    pub async fn add_facts(&self, facts: Vec<Fact>) {
        if facts.is_empty() {
            return;
        }
        let mut inner = self.inner.write().await;
        inner.facts.extend(facts);
    }

    pub async fn add_inconsistencies(&self, inconsistencies: Vec<Inconsistency>) {
        if inconsistencies.is_empty() {
            return;
        }
        let mut inner = self.inner.write().await;
        inner.inconsistencies.extend(inconsistencies);
    }

    /// Replace the open gaps for one info type with a fresh assessment.
    pub async fn set_gaps(&self, info_type: InfoType, gaps: Vec<Gap>) {
        let mut inner = self.inner.write().await;
        inner.gaps.retain(|g| g.info_type != info_type);
        inner.gaps.extend(gaps);
    }

    pub async fn snapshot(&self, info_type: InfoType) -> KbSnapshot {
        let inner = self.inner.read().await;
        KbSnapshot {
            info_type,
            facts: inner
                .facts
                .iter()
                .filter(|f| f.info_type == info_type)
                .cloned()
                .collect(),
            inconsistencies: inner
                .inconsistencies
                .iter()
                .filter(|i| i.info_type == info_type)
                .cloned()
                .collect(),
            gaps: inner
                .gaps
                .iter()
                .filter(|g| g.info_type == info_type)
                .cloned()
                .collect(),
        }
    }

    pub async fn all_facts(&self) -> Vec<Fact> {
        self.inner.read().await.facts.clone()
    }

    pub async fn all_inconsistencies(&self) -> Vec<Inconsistency> {
        self.inner.read().await.inconsistencies.clone()
    }

    pub async fn fact_count(&self) -> usize {
        self.inner.read().await.facts.len()
    }

    pub async fn open_inconsistency_count(&self) -> usize {
        self.inner
            .read()
            .await
            .inconsistencies
            .iter()
            .filter(|i| i.is_open())
            .count()
    }

    /// Best-supported value for an attribute: authoritative sources beat
    /// corroborated self-reports, which beat single-source self-reports.
    pub async fn best_value(&self, info_type: InfoType, attribute: &str) -> Option<String> {
        let inner = self.inner.read().await;
        let mut candidates: BTreeMap<String, (SourceAuthority, usize)> = BTreeMap::new();

        for fact in inner
            .facts
            .iter()
            .filter(|f| f.info_type == info_type && f.claim.attribute == attribute)
        {
            let entry = candidates
                .entry(fact.claim.value_text())
                .or_insert((fact.authority, 0));
            if fact.authority > entry.0 {
                entry.0 = fact.authority;
            }
            entry.1 += 1;
        }

        candidates
            .into_iter()
            .max_by(|a, b| {
                let (_, (auth_a, count_a)) = a;
                let (_, (auth_b, count_b)) = b;
                auth_a.cmp(auth_b).then(count_a.cmp(count_b))
            })
            .map(|(value, _)| value)
    }

    pub async fn primary_name(&self) -> Option<String> {
        self.best_value(InfoType::Identity, "full_name").await
    }

    pub async fn confirmed_dob(&self) -> Option<String> {
        self.best_value(InfoType::Identity, "dob").await
    }

    pub async fn latest_address(&self) -> Option<String> {
        let inner = self.inner.read().await;
        inner
            .facts
            .iter()
            .filter(|f| f.info_type == InfoType::Identity && f.claim.attribute == "address")
            .max_by_key(|f| f.discovered_at)
            .map(|f| f.claim.value_text())
    }

    /// Extract connected entities (employers, associates, shared addresses)
    /// from accumulated facts for degree expansion.
    pub async fn extract_connections(&self) -> Vec<ConnectionCandidate> {
        let inner = self.inner.read().await;
        let mut connections: BTreeMap<String, ConnectionCandidate> = BTreeMap::new();

        for fact in &inner.facts {
            let (kind, role_proximity, financial_tie) = match fact.claim.attribute.as_str() {
                "employer" => (ConnectionKind::Employer, 0.9, 0.6),
                "associate" => (ConnectionKind::Associate, 0.5, 0.2),
                "business_partner" => (ConnectionKind::FinancialPartner, 0.7, 0.9),
                "shared_address_with" => (ConnectionKind::Address, 0.3, 0.1),
                _ => continue,
            };
            let name = fact.claim.value_text();
            if name.is_empty() {
                continue;
            }
            let key = format!("{:?}:{}", kind, name);
            connections
                .entry(key)
                .and_modify(|c| c.shared_identifiers += 1)
                .or_insert(ConnectionCandidate {
                    kind,
                    name,
                    shared_identifiers: 1,
                    financial_tie,
                    role_proximity,
                });
        }

        let mut ranked: Vec<ConnectionCandidate> = connections.into_values().collect();
        ranked.sort_by(|a, b| {
            b.relevance()
                .partial_cmp(&a.relevance())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.name.cmp(&b.name))
        });
        ranked
    }
}
