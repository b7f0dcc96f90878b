use std::sync::Arc;
use tracing::debug;

use screening_core::audit::{AuditEvent, AuditLogger, EventType};
use screening_core::context::RequestContext;
use screening_core::error::Result;
use screening_core::types::EntityId;

use super::model::{EntityRecord, Subject, SubjectIdentifiers};
use super::store::EntityStore;

const NAME_WEIGHT: f64 = 0.5;
const DOB_WEIGHT: f64 = 0.3;
const ADDRESS_WEIGHT: f64 = 0.2;
const MATCH_THRESHOLD: f64 = 0.85;

/// Outcome of resolving a subject to a canonical entity.
#[derive(Debug, Clone)]
pub struct ResolutionOutcome {
    pub entity_id: EntityId,
    /// True when an existing entity matched; false when one was created
    pub matched: bool,
    pub score: f64,
}

/// Resolves incoming subjects to known entities: exact match on the
/// national-id hash first, then a weighted fuzzy score over name, date of
/// birth and address. Ties break toward the most recently updated entity.
pub struct EntityResolver {
    store: Arc<dyn EntityStore>,
    audit: AuditLogger,
}

impl EntityResolver {
    pub fn new(store: Arc<dyn EntityStore>, audit: AuditLogger) -> Self {
        Self { store, audit }
    }

    pub async fn resolve(&self, ctx: &RequestContext, subject: &Subject) -> Result<ResolutionOutcome> {
        if let Some(id_hash) = &subject.identifiers.national_id_hash {
            if let Some(entity) = self.store.find_by_identifier_hash(ctx, id_hash).await? {
                debug!(entity = %entity.id, "Exact identifier match");
                self.store.attach_subject(ctx, entity.id, subject.id).await?;
                self.log_resolution(ctx, entity.id, true, 1.0).await?;
                return Ok(ResolutionOutcome {
                    entity_id: entity.id,
                    matched: true,
                    score: 1.0,
                });
            }
        }

        let candidates = self.store.entities_for_tenant(ctx).await?;
        let mut best: Option<(&EntityRecord, f64)> = None;
        for candidate in &candidates {
            let score = composite_score(&subject.identifiers, &candidate.canonical);
            if score < MATCH_THRESHOLD {
                continue;
            }
            best = match best {
                None => Some((candidate, score)),
                Some((current, current_score)) => {
                    if score > current_score
                        || (score == current_score && candidate.updated_at > current.updated_at)
                    {
                        Some((candidate, score))
                    } else {
                        Some((current, current_score))
                    }
                }
            };
        }

        if let Some((entity, score)) = best {
            debug!(entity = %entity.id, score, "Fuzzy entity match");
            self.store.attach_subject(ctx, entity.id, subject.id).await?;
            self.log_resolution(ctx, entity.id, true, score).await?;
            return Ok(ResolutionOutcome {
                entity_id: entity.id,
                matched: true,
                score,
            });
        }

        let entity = EntityRecord::from_subject(subject);
        let entity_id = entity.id;
        self.store.upsert(ctx, entity).await?;
        self.log_resolution(ctx, entity_id, false, 0.0).await?;
        Ok(ResolutionOutcome {
            entity_id,
            matched: false,
            score: 0.0,
        })
    }

    async fn log_resolution(
        &self,
        ctx: &RequestContext,
        entity_id: EntityId,
        matched: bool,
        score: f64,
    ) -> Result<()> {
        let event = AuditEvent::builder(
            EventType::EntityResolved,
            if matched {
                format!("subject matched entity {} (score {:.2})", entity_id, score)
            } else {
                format!("created entity {}", entity_id)
            },
        )
        .resource("entity", entity_id.to_string())
        .metadata("matched", serde_json::json!(matched))
        .metadata("score", serde_json::json!(score))
        .build();
        self.audit.log_event(ctx, event).await
    }
}

/// Weighted composite similarity: name 0.5, DOB 0.3, address 0.2.
pub fn composite_score(a: &SubjectIdentifiers, b: &SubjectIdentifiers) -> f64 {
    let name = name_similarity(&a.full_name, &b.full_name);
    let dob = match (a.dob, b.dob) {
        (Some(x), Some(y)) if x == y => 1.0,
        (Some(_), Some(_)) => 0.0,
        // Missing on either side: neutral half credit.
        _ => 0.5,
    };
    let address = best_address_similarity(&a.addresses, &b.addresses);

    NAME_WEIGHT * name + DOB_WEIGHT * dob + ADDRESS_WEIGHT * address
}

fn best_address_similarity(a: &[String], b: &[String]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.5;
    }
    let mut best: f64 = 0.0;
    for left in a {
        for right in b {
            best = best.max(normalized_similarity(left, right));
        }
    }
    best
}

fn name_similarity(a: &str, b: &str) -> f64 {
    normalized_similarity(a, b)
}

/// Edit-distance similarity over normalized strings: `1 - lev / max_len`.
pub fn normalized_similarity(a: &str, b: &str) -> f64 {
    let a = normalize(a);
    let b = normalize(b);
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    let distance = levenshtein(&a, &b);
    1.0 - distance as f64 / max_len as f64
}

fn normalize(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0usize; b.len() + 1];

    for (i, &ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::store::MemoryEntityStore;
    use chrono::NaiveDate;
    use screening_core::audit::MemoryAuditStore;
    use screening_core::types::{Jurisdiction, RoleCategory, TenantId};

    fn resolver(store: Arc<MemoryEntityStore>) -> EntityResolver {
        EntityResolver::new(store, AuditLogger::new(Arc::new(MemoryAuditStore::new())))
    }

    fn subject(tenant: TenantId, identifiers: SubjectIdentifiers) -> Subject {
        Subject::new(tenant, identifiers, Jurisdiction::Us, RoleCategory::Other)
    }

    #[test]
    fn levenshtein_basics() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("same", "same"), 0);
    }

    #[test]
    fn similar_names_score_high() {
        assert!(normalized_similarity("Alice Smith", "alice  smith") > 0.99);
        assert!(normalized_similarity("Alice Smith", "Alyce Smith") > 0.8);
        assert!(normalized_similarity("Alice Smith", "Robert Jones") < 0.4);
    }

    #[tokio::test]
    async fn exact_identifier_match_wins() {
        let tenant = TenantId::new();
        let store = Arc::new(MemoryEntityStore::new());
        let resolver = resolver(store.clone());
        let ctx = RequestContext::new(tenant, Jurisdiction::Us);

        let first = subject(
            tenant,
            SubjectIdentifiers::new("Alice Smith").with_national_id("123-45-6789"),
        );
        let created = resolver.resolve(&ctx, &first).await.unwrap();
        assert!(!created.matched);

        // Different name spelling, same national id.
        let second = subject(
            tenant,
            SubjectIdentifiers::new("A. Smith").with_national_id("123456789"),
        );
        let matched = resolver.resolve(&ctx, &second).await.unwrap();
        assert!(matched.matched);
        assert_eq!(matched.entity_id, created.entity_id);
        assert_eq!(matched.score, 1.0);
    }

    #[tokio::test]
    async fn fuzzy_match_above_threshold() {
        let tenant = TenantId::new();
        let store = Arc::new(MemoryEntityStore::new());
        let resolver = resolver(store.clone());
        let ctx = RequestContext::new(tenant, Jurisdiction::Us);

        let dob = NaiveDate::from_ymd_opt(1990, 4, 2).unwrap();
        let first = subject(
            tenant,
            SubjectIdentifiers::new("Alice Smith")
                .with_dob(dob)
                .with_address("12 Main Street, Springfield"),
        );
        let created = resolver.resolve(&ctx, &first).await.unwrap();

        let second = subject(
            tenant,
            SubjectIdentifiers::new("Alice  Smith")
                .with_dob(dob)
                .with_address("12 Main St, Springfield"),
        );
        let matched = resolver.resolve(&ctx, &second).await.unwrap();
        assert!(matched.matched, "score was {}", matched.score);
        assert_eq!(matched.entity_id, created.entity_id);
    }

    #[tokio::test]
    async fn dissimilar_subject_creates_new_entity() {
        let tenant = TenantId::new();
        let store = Arc::new(MemoryEntityStore::new());
        let resolver = resolver(store.clone());
        let ctx = RequestContext::new(tenant, Jurisdiction::Us);

        let first = subject(tenant, SubjectIdentifiers::new("Alice Smith"));
        let second = subject(tenant, SubjectIdentifiers::new("Robert Jones"));

        let a = resolver.resolve(&ctx, &first).await.unwrap();
        let b = resolver.resolve(&ctx, &second).await.unwrap();
        assert_ne!(a.entity_id, b.entity_id);
    }
}
