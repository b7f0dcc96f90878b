use std::collections::HashSet;
use tracing::debug;

use screening_core::types::{InfoType, Jurisdiction, ScreeningTier};
use screening_gateway::DataSourceResolver;

use crate::knowledge::{Gap, GapKind, KnowledgeBase};

use super::query::{QueryPurpose, SearchQuery};

/// Generates gap-targeted follow-up queries for the refine step.
///
/// Missing fundamental data is pursued before corroboration; duplicates of
/// already-executed queries are dropped by `(provider, normalized params)`.
pub struct QueryRefiner<'a> {
    resolver: &'a DataSourceResolver,
}

impl<'a> QueryRefiner<'a> {
    pub fn new(resolver: &'a DataSourceResolver) -> Self {
        Self { resolver }
    }

    pub async fn refine_queries(
        &self,
        info_type: InfoType,
        gaps: &[Gap],
        kb: &KnowledgeBase,
        tier: ScreeningTier,
        jurisdiction: &Jurisdiction,
        executed: &HashSet<String>,
    ) -> Vec<SearchQuery> {
        let check_type = info_type.check_type();
        let providers = self.resolver.providers_for(check_type, tier, jurisdiction);
        if providers.is_empty() {
            return Vec::new();
        }

        // Anchor follow-ups on the best name and DOB known so far.
        let primary_name = kb.primary_name().await;
        let confirmed_dob = kb.confirmed_dob().await;

        let mut ordered: Vec<&Gap> = gaps.iter().collect();
        ordered.sort_by_key(|gap| gap.kind);

        let mut seen: HashSet<String> = HashSet::new();
        let mut queries = Vec::new();

        for gap in ordered {
            // Corroboration gaps go to a source other than the primary when
            // one exists; fundamental gaps go to the strongest source.
            let provider_pool: Vec<_> = match gap.kind {
                GapKind::MissingFundamental => providers.iter().take(1).collect(),
                GapKind::Corroboration => providers.iter().skip(1).take(1).collect(),
            };
            let provider = match provider_pool.first() {
                Some(provider) => (*provider).clone(),
                None => providers[0].clone(),
            };

            let intent = match gap.kind {
                GapKind::MissingFundamental => "locate",
                GapKind::Corroboration => "corroborate",
            };
            let mut query = SearchQuery::new(provider, check_type, QueryPurpose::GapFollowUp)
                .with_param("target_attribute", gap.attribute.clone())
                .with_param("intent", intent);
            if let Some(name) = &primary_name {
                query = query.with_param("full_name", name.clone());
            }
            if let Some(dob) = &confirmed_dob {
                query = query.with_param("dob", dob.clone());
            }

            let key = query.dedupe_key();
            if executed.contains(&key) || !seen.insert(key) {
                continue;
            }
            queries.push(query);
        }

        debug!(
            info_type = %info_type,
            gaps = gaps.len(),
            queries = queries.len(),
            "Refined follow-up queries"
        );
        queries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use screening_core::types::{CheckType, ProviderId, ScreeningId};
    use screening_gateway::ProviderRegistration;

    fn resolver() -> DataSourceResolver {
        DataSourceResolver::new()
            .with(
                ProviderRegistration::new(ProviderId::new("primary"), vec![CheckType::Identity])
                    .with_priority(1),
            )
            .with(
                ProviderRegistration::new(ProviderId::new("secondary"), vec![CheckType::Identity])
                    .with_priority(2),
            )
    }

    #[tokio::test]
    async fn fundamental_gaps_come_before_corroboration() {
        let resolver = resolver();
        let refiner = QueryRefiner::new(&resolver);
        let kb = KnowledgeBase::new(ScreeningId::new());
        let gaps = vec![
            Gap::corroboration(InfoType::Identity, "full_name"),
            Gap::missing(InfoType::Identity, "dob"),
        ];

        let queries = refiner
            .refine_queries(
                InfoType::Identity,
                &gaps,
                &kb,
                ScreeningTier::Standard,
                &Jurisdiction::Us,
                &HashSet::new(),
            )
            .await;

        assert_eq!(queries.len(), 2);
        assert_eq!(queries[0].params.get("target_attribute").map(String::as_str), Some("dob"));
        // Corroboration goes to the secondary source.
        assert_eq!(queries[1].provider_id, ProviderId::new("secondary"));
    }

    #[tokio::test]
    async fn executed_queries_are_not_repeated() {
        let resolver = resolver();
        let refiner = QueryRefiner::new(&resolver);
        let kb = KnowledgeBase::new(ScreeningId::new());
        let gaps = vec![Gap::missing(InfoType::Identity, "dob")];

        let first = refiner
            .refine_queries(
                InfoType::Identity,
                &gaps,
                &kb,
                ScreeningTier::Standard,
                &Jurisdiction::Us,
                &HashSet::new(),
            )
            .await;
        assert_eq!(first.len(), 1);

        let executed: HashSet<String> = first.iter().map(|q| q.dedupe_key()).collect();
        let second = refiner
            .refine_queries(
                InfoType::Identity,
                &gaps,
                &kb,
                ScreeningTier::Standard,
                &Jurisdiction::Us,
                &executed,
            )
            .await;
        assert!(second.is_empty());
    }
}
