use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use screening_core::types::InfoType;

use crate::knowledge::{Fact, Gap, KbSnapshot};

const COVERAGE_WEIGHT: f64 = 0.5;
const CORROBORATION_WEIGHT: f64 = 0.3;
const RECENCY_WEIGHT: f64 = 0.2;
const INCONSISTENCY_PENALTY: f64 = 0.1;

/// The attribute slots a complete picture of each info type fills.
pub fn expected_attributes(info_type: InfoType) -> &'static [&'static str] {
    match info_type {
        InfoType::Identity => &["full_name", "dob", "ssn", "address"],
        InfoType::Employment => &["employer", "title", "start_date", "end_date"],
        InfoType::Education => &["institution", "degree", "graduation_date"],
        InfoType::Criminal => &["case_ref", "offense", "disposition", "decision_date"],
        InfoType::Civil => &["case_ref", "claim_type", "outcome"],
        InfoType::Financial => &["credit_standing", "delinquencies", "bankruptcies"],
        InfoType::Licenses => &["license_type", "status", "issuer"],
        InfoType::Regulatory => &["body", "action", "decision_date"],
        InfoType::Sanctions => &["list_name", "match_strength"],
        InfoType::AdverseMedia => &["headline", "source", "published_at"],
        InfoType::DigitalFootprint => &["platform", "handle", "signal"],
    }
}

/// Per-iteration assessment of an info type's knowledge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assessment {
    pub info_type: InfoType,
    pub confidence: f64,
    pub coverage: f64,
    pub corroboration: f64,
    pub new_facts: usize,
    pub new_inconsistencies: usize,
    pub queries_executed: usize,
    pub info_gain_rate: f64,
    pub gaps: Vec<Gap>,
}

/// Compute confidence over the cumulative snapshot for an info type.
///
/// Confidence blends expected-slot coverage, corroboration by independent
/// providers, fact recency, and subtracts a penalty per open inconsistency.
/// The result is clamped to [0, 1]. Monotonicity across iterations is
/// enforced by the SAR controller, which only lets confidence drop when an
/// iteration introduced new inconsistencies.
pub fn assess(
    snapshot: &KbSnapshot,
    new_facts: usize,
    new_inconsistencies: usize,
    queries_executed: usize,
) -> Assessment {
    let expected = expected_attributes(snapshot.info_type);
    let coverage = coverage_score(&snapshot.facts, expected);
    let corroboration = corroboration_score(&snapshot.facts, expected);
    let recency = recency_score(&snapshot.facts);
    let open_inconsistencies = snapshot.inconsistencies.iter().filter(|i| i.is_open()).count();

    let raw = COVERAGE_WEIGHT * coverage
        + CORROBORATION_WEIGHT * corroboration
        + RECENCY_WEIGHT * recency
        - INCONSISTENCY_PENALTY * open_inconsistencies as f64;
    let confidence = raw.clamp(0.0, 1.0);

    let info_gain_rate = if queries_executed == 0 {
        0.0
    } else {
        new_facts as f64 / queries_executed as f64
    };

    let gaps = find_gaps(snapshot.info_type, &snapshot.facts, expected);

    Assessment {
        info_type: snapshot.info_type,
        confidence,
        coverage,
        corroboration,
        new_facts,
        new_inconsistencies,
        queries_executed,
        info_gain_rate,
        gaps,
    }
}

fn filled_attributes<'a>(facts: &'a [Fact]) -> BTreeMap<&'a str, HashSet<&'a str>> {
    let mut filled: BTreeMap<&str, HashSet<&str>> = BTreeMap::new();
    for fact in facts {
        filled
            .entry(fact.claim.attribute.as_str())
            .or_default()
            .insert(fact.source_provider.as_str());
    }
    filled
}

fn coverage_score(facts: &[Fact], expected: &[&str]) -> f64 {
    if expected.is_empty() {
        return 1.0;
    }
    let filled = filled_attributes(facts);
    let hit = expected.iter().filter(|a| filled.contains_key(**a)).count();
    hit as f64 / expected.len() as f64
}

fn corroboration_score(facts: &[Fact], expected: &[&str]) -> f64 {
    if expected.is_empty() {
        return 1.0;
    }
    let filled = filled_attributes(facts);
    let corroborated = expected
        .iter()
        .filter(|a| filled.get(**a).map(|sources| sources.len() >= 2).unwrap_or(false))
        .count();
    corroborated as f64 / expected.len() as f64
}

/// Linear decay over two years, floored at 0.5 so old-but-valid data still
/// counts. An empty fact set has no recency signal at all.
fn recency_score(facts: &[Fact]) -> f64 {
    if facts.is_empty() {
        return 0.0;
    }
    let now = Utc::now();
    let total: f64 = facts
        .iter()
        .map(|fact| {
            let age_days = (now - fact.discovered_at).num_days().max(0) as f64;
            (1.0 - age_days / 730.0).max(0.5)
        })
        .sum();
    total / facts.len() as f64
}

fn find_gaps(info_type: InfoType, facts: &[Fact], expected: &[&str]) -> Vec<Gap> {
    let filled = filled_attributes(facts);
    let mut gaps = Vec::new();
    for attribute in expected {
        match filled.get(*attribute) {
            None => gaps.push(Gap::missing(info_type, *attribute)),
            Some(sources) if sources.len() < 2 => {
                gaps.push(Gap::corroboration(info_type, *attribute));
            }
            Some(_) => {}
        }
    }
    gaps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::{FactClaim, GapKind, Inconsistency, InconsistencyKind};
    use screening_core::types::ProviderId;
    use screening_gateway::SourceAuthority;

    fn fact(attribute: &str, value: &str, provider: &str) -> Fact {
        Fact::new(
            InfoType::Identity,
            FactClaim::new(attribute, serde_json::json!(value)),
            ProviderId::new(provider),
            SourceAuthority::Authoritative,
        )
    }

    fn snapshot(facts: Vec<Fact>, inconsistencies: Vec<Inconsistency>) -> KbSnapshot {
        KbSnapshot {
            info_type: InfoType::Identity,
            facts,
            inconsistencies,
            gaps: Vec::new(),
        }
    }

    #[test]
    fn fully_corroborated_identity_clears_the_foundation_threshold() {
        let mut facts = Vec::new();
        for provider in ["gov", "aggregator"] {
            facts.push(fact("full_name", "Alice Smith", provider));
            facts.push(fact("dob", "1990-04-02", provider));
            facts.push(fact("ssn", "xxx-xx-6789", provider));
            facts.push(fact("address", "12 Main St", provider));
        }

        let assessment = assess(&snapshot(facts, Vec::new()), 8, 0, 2);
        assert!(assessment.confidence >= 0.90, "confidence {}", assessment.confidence);
        assert!(assessment.gaps.is_empty());
    }

    #[test]
    fn missing_slots_limit_confidence_and_produce_gaps() {
        let facts = vec![fact("full_name", "Alice Smith", "gov")];
        let assessment = assess(&snapshot(facts, Vec::new()), 1, 0, 1);

        assert!(assessment.confidence < 0.60);
        let missing: Vec<_> = assessment
            .gaps
            .iter()
            .filter(|g| g.kind == GapKind::MissingFundamental)
            .collect();
        assert_eq!(missing.len(), 3);
        assert!(assessment
            .gaps
            .iter()
            .any(|g| g.kind == GapKind::Corroboration && g.attribute == "full_name"));
    }

    #[test]
    fn open_inconsistencies_penalize_confidence() {
        let facts = vec![
            fact("full_name", "Alice Smith", "gov"),
            fact("full_name", "Alicia Smythe", "aggregator"),
        ];
        let clean = assess(&snapshot(facts.clone(), Vec::new()), 2, 0, 1);
        let flagged = assess(
            &snapshot(
                facts,
                vec![Inconsistency::new(
                    InconsistencyKind::ClaimContradiction,
                    InfoType::Identity,
                    Vec::new(),
                    "name conflict",
                )],
            ),
            2,
            1,
            1,
        );
        assert!(flagged.confidence < clean.confidence);
    }

    #[test]
    fn info_gain_rate_is_facts_per_query() {
        let assessment = assess(&snapshot(Vec::new(), Vec::new()), 6, 0, 3);
        assert_eq!(assessment.info_gain_rate, 2.0);
        let zero_queries = assess(&snapshot(Vec::new(), Vec::new()), 0, 0, 0);
        assert_eq!(zero_queries.info_gain_rate, 0.0);
    }
}
