use serde::{Deserialize, Serialize};

use screening_core::types::{CheckType, Jurisdiction, ProviderId, ScreeningTier};

/// Registration entry describing where a provider may be used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRegistration {
    pub provider_id: ProviderId,
    pub checks: Vec<CheckType>,
    /// Lowest tier that may use this provider
    pub min_tier: ScreeningTier,
    /// Jurisdictions served; `None` means all
    pub jurisdictions: Option<Vec<Jurisdiction>>,
    /// Lower numbers are tried first
    pub priority: u32,
}

impl ProviderRegistration {
    pub fn new(provider_id: ProviderId, checks: Vec<CheckType>) -> Self {
        Self {
            provider_id,
            checks,
            min_tier: ScreeningTier::Standard,
            jurisdictions: None,
            priority: 100,
        }
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    pub fn enhanced_only(mut self) -> Self {
        self.min_tier = ScreeningTier::Enhanced;
        self
    }

    pub fn in_jurisdictions(mut self, jurisdictions: Vec<Jurisdiction>) -> Self {
        self.jurisdictions = Some(jurisdictions);
        self
    }

    fn serves(&self, check: CheckType, tier: ScreeningTier, jurisdiction: &Jurisdiction) -> bool {
        if !self.checks.contains(&check) {
            return false;
        }
        if self.min_tier == ScreeningTier::Enhanced && tier == ScreeningTier::Standard {
            return false;
        }
        match &self.jurisdictions {
            Some(list) => list.contains(jurisdiction),
            None => true,
        }
    }
}

/// Maps a check type to the prioritized list of providers able to serve it
/// for a given tier and jurisdiction. The first entry is the primary source;
/// the rest are the fallback chain.
#[derive(Debug, Clone, Default)]
pub struct DataSourceResolver {
    registrations: Vec<ProviderRegistration>,
}

impl DataSourceResolver {
    pub fn new() -> Self {
        Self {
            registrations: Vec::new(),
        }
    }

    pub fn register(&mut self, registration: ProviderRegistration) {
        self.registrations.push(registration);
    }

    pub fn with(mut self, registration: ProviderRegistration) -> Self {
        self.register(registration);
        self
    }

    pub fn providers_for(
        &self,
        check: CheckType,
        tier: ScreeningTier,
        jurisdiction: &Jurisdiction,
    ) -> Vec<ProviderId> {
        let mut matches: Vec<&ProviderRegistration> = self
            .registrations
            .iter()
            .filter(|r| r.serves(check, tier, jurisdiction))
            .collect();
        matches.sort_by_key(|r| r.priority);
        matches.into_iter().map(|r| r.provider_id.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> DataSourceResolver {
        DataSourceResolver::new()
            .with(
                ProviderRegistration::new(
                    ProviderId::new("gov-registry"),
                    vec![CheckType::Identity, CheckType::Criminal],
                )
                .with_priority(10),
            )
            .with(
                ProviderRegistration::new(
                    ProviderId::new("aggregator"),
                    vec![CheckType::Identity, CheckType::Employment],
                )
                .with_priority(20),
            )
            .with(
                ProviderRegistration::new(ProviderId::new("deep-web"), vec![CheckType::Identity])
                    .with_priority(5)
                    .enhanced_only(),
            )
            .with(
                ProviderRegistration::new(ProviderId::new("us-courts"), vec![CheckType::Criminal])
                    .with_priority(1)
                    .in_jurisdictions(vec![Jurisdiction::Us]),
            )
    }

    #[test]
    fn providers_are_ordered_by_priority() {
        let providers =
            resolver().providers_for(CheckType::Identity, ScreeningTier::Standard, &Jurisdiction::Eu);
        assert_eq!(
            providers,
            vec![ProviderId::new("gov-registry"), ProviderId::new("aggregator")]
        );
    }

    #[test]
    fn enhanced_tier_widens_the_set() {
        let providers =
            resolver().providers_for(CheckType::Identity, ScreeningTier::Enhanced, &Jurisdiction::Eu);
        assert_eq!(providers[0], ProviderId::new("deep-web"));
        assert_eq!(providers.len(), 3);
    }

    #[test]
    fn jurisdiction_filters_apply() {
        let us = resolver().providers_for(CheckType::Criminal, ScreeningTier::Standard, &Jurisdiction::Us);
        assert_eq!(us[0], ProviderId::new("us-courts"));

        let eu = resolver().providers_for(CheckType::Criminal, ScreeningTier::Standard, &Jurisdiction::Eu);
        assert_eq!(eu, vec![ProviderId::new("gov-registry")]);
    }

    #[test]
    fn unknown_check_yields_empty_list() {
        let providers =
            resolver().providers_for(CheckType::Sanctions, ScreeningTier::Standard, &Jurisdiction::Us);
        assert!(providers.is_empty());
    }
}
