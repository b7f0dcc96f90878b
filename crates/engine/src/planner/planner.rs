use tracing::debug;

use screening_core::types::{Degree, InfoType, Jurisdiction, ScreeningTier};
use screening_gateway::DataSourceResolver;

use crate::compliance::Ruleset;
use crate::entity::SubjectIdentifiers;

use super::query::{QueryPurpose, SearchQuery};

/// How many providers an initial pass fans out to, so corroboration is
/// possible without burning the whole chain up front.
const INITIAL_PROVIDER_FANOUT: usize = 2;

/// Generates the initial query set for one info type, bound to permitted
/// providers through the data source resolver. Compliance lookback limits
/// travel with the query as parameters.
pub struct QueryPlanner<'a> {
    resolver: &'a DataSourceResolver,
}

impl<'a> QueryPlanner<'a> {
    pub fn new(resolver: &'a DataSourceResolver) -> Self {
        Self { resolver }
    }

    pub fn initial_queries(
        &self,
        info_type: InfoType,
        identifiers: &SubjectIdentifiers,
        ruleset: &Ruleset,
        tier: ScreeningTier,
        degree: Degree,
        jurisdiction: &Jurisdiction,
    ) -> Vec<SearchQuery> {
        let check_type = info_type.check_type();
        if !ruleset.is_permitted(check_type) {
            return Vec::new();
        }

        let providers = self.resolver.providers_for(check_type, tier, jurisdiction);
        if providers.is_empty() {
            debug!(info_type = %info_type, "No providers available for check");
            return Vec::new();
        }

        let fanout = match info_type.phase() {
            // Foundation data benefits most from immediate corroboration.
            screening_core::types::InfoPhase::Foundation => INITIAL_PROVIDER_FANOUT,
            _ => 1,
        };

        providers
            .into_iter()
            .take(fanout.max(1))
            .map(|provider_id| {
                let mut query =
                    SearchQuery::new(provider_id, check_type, QueryPurpose::Initial)
                        .with_param("full_name", identifiers.full_name.clone())
                        .with_param("degree", degree.to_string());

                if let Some(dob) = identifiers.dob {
                    query = query.with_param("dob", dob.to_string());
                }
                if let Some(address) = identifiers.addresses.first() {
                    query = query.with_param("address", address.clone());
                }
                if let Some(lookback) = ruleset.lookback(check_type) {
                    query = query.with_param("lookback_days", lookback.num_days().to_string());
                }
                query
            })
            .collect()
    }
}
