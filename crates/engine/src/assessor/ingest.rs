use screening_core::types::InfoType;
use screening_gateway::ProviderResponse;

use crate::knowledge::{Fact, FactClaim};

/// Extract attribute-level facts from a provider response. Each record
/// attribute becomes one fact evidenced by the record's source reference;
/// discovery time is the provider's retrieval time so cached payloads age
/// correctly.
pub fn facts_from_response(info_type: InfoType, response: &ProviderResponse) -> Vec<Fact> {
    let mut facts = Vec::new();
    for record in &response.records {
        for (attribute, value) in &record.attributes {
            let fact = Fact::new(
                info_type,
                FactClaim::new(attribute.clone(), value.clone()),
                response.provider_id.clone(),
                response.authority,
            )
            .with_evidence(record.source_ref.clone())
            .with_discovered_at(response.retrieved_at);
            facts.push(fact);
        }
    }
    facts
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use screening_core::types::{CheckType, ProviderId};
    use screening_gateway::{ProviderRecord, SourceAuthority};

    #[test]
    fn each_attribute_becomes_one_fact() {
        let response = ProviderResponse {
            provider_id: ProviderId::new("gov"),
            check_type: CheckType::Identity,
            authority: SourceAuthority::Authoritative,
            records: vec![
                ProviderRecord::new("rec-1")
                    .with_attribute("full_name", serde_json::json!("Alice Smith"))
                    .with_attribute("dob", serde_json::json!("1990-04-02")),
                ProviderRecord::new("rec-2")
                    .with_attribute("address", serde_json::json!("12 Main St")),
            ],
            retrieved_at: Utc::now(),
        };

        let facts = facts_from_response(InfoType::Identity, &response);
        assert_eq!(facts.len(), 3);
        assert!(facts.iter().all(|f| f.info_type == InfoType::Identity));
        assert!(facts
            .iter()
            .any(|f| f.claim.attribute == "dob" && f.evidence_refs == vec!["rec-1".to_string()]));
    }
}
