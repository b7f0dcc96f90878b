use chrono::NaiveDate;
use std::collections::{BTreeMap, HashSet};

use screening_core::types::InfoType;

use crate::knowledge::{Fact, Inconsistency, InconsistencyKind};

/// Attributes whose disagreement is an identifier mismatch rather than an
/// ordinary contradiction.
const IDENTIFIER_ATTRIBUTES: &[&str] = &["dob", "ssn", "national_id"];

/// Attributes that carry a single true value; multiple distinct values from
/// distinct sources contradict.
const SINGLE_VALUED_ATTRIBUTES: &[&str] = &[
    "full_name",
    "dob",
    "ssn",
    "national_id",
    "employer",
    "title",
    "institution",
    "degree",
];

/// Detect contradictions, identifier mismatches and timeline
/// impossibilities over the accumulated facts of one info type. Facts in
/// `known` have already been examined; only inconsistencies involving at
/// least one new fact are reported.
pub fn detect_inconsistencies(
    info_type: InfoType,
    facts: &[Fact],
    already_reported: &[Inconsistency],
) -> Vec<Inconsistency> {
    let mut found = Vec::new();
    found.extend(detect_value_conflicts(info_type, facts));
    found.extend(detect_timeline_impossibilities(info_type, facts));

    // Drop duplicates of previously reported inconsistencies: same kind over
    // the same fact set.
    let reported: HashSet<(InconsistencyKind, Vec<String>)> = already_reported
        .iter()
        .map(|i| (i.kind, fact_id_key(&i.fact_ids)))
        .collect();

    found
        .into_iter()
        .filter(|i| !reported.contains(&(i.kind, fact_id_key(&i.fact_ids))))
        .collect()
}

fn fact_id_key(ids: &[screening_core::types::FactId]) -> Vec<String> {
    let mut key: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
    key.sort();
    key
}

fn detect_value_conflicts(info_type: InfoType, facts: &[Fact]) -> Vec<Inconsistency> {
    let mut by_attribute: BTreeMap<&str, Vec<&Fact>> = BTreeMap::new();
    for fact in facts {
        if SINGLE_VALUED_ATTRIBUTES.contains(&fact.claim.attribute.as_str()) {
            by_attribute
                .entry(fact.claim.attribute.as_str())
                .or_default()
                .push(fact);
        }
    }

    let mut inconsistencies = Vec::new();
    for (attribute, group) in by_attribute {
        let mut by_value: BTreeMap<String, Vec<&Fact>> = BTreeMap::new();
        for fact in group {
            by_value.entry(fact.claim.value_text()).or_default().push(fact);
        }
        if by_value.len() < 2 {
            continue;
        }
        // Conflicts require distinct sources; one source restating itself
        // differently is a data-quality problem, not a contradiction.
        let sources: HashSet<_> = by_value
            .values()
            .flat_map(|facts| facts.iter().map(|f| f.source_provider.clone()))
            .collect();
        if sources.len() < 2 {
            continue;
        }

        let fact_ids: Vec<_> = by_value
            .values()
            .flat_map(|facts| facts.iter().map(|f| f.id))
            .collect();
        let values: Vec<String> = by_value.keys().cloned().collect();
        let kind = if IDENTIFIER_ATTRIBUTES.contains(&attribute) {
            InconsistencyKind::IdentifierMismatch
        } else {
            InconsistencyKind::ClaimContradiction
        };
        inconsistencies.push(Inconsistency::new(
            kind,
            info_type,
            fact_ids,
            format!("{} asserted as {}", attribute, values.join(" vs ")),
        ));
    }
    inconsistencies
}

fn detect_timeline_impossibilities(info_type: InfoType, facts: &[Fact]) -> Vec<Inconsistency> {
    // Group period attributes by evidencing record.
    let mut by_record: BTreeMap<&str, (Option<&Fact>, Option<&Fact>)> = BTreeMap::new();
    for fact in facts {
        let evidence = match fact.evidence_refs.first() {
            Some(evidence) => evidence.as_str(),
            None => continue,
        };
        let slot = by_record.entry(evidence).or_insert((None, None));
        match fact.claim.attribute.as_str() {
            "start_date" => slot.0 = Some(fact),
            "end_date" => slot.1 = Some(fact),
            _ => {}
        }
    }

    let mut inconsistencies = Vec::new();
    let mut periods: Vec<(&str, NaiveDate, NaiveDate, Vec<screening_core::types::FactId>)> =
        Vec::new();

    for (record, (start, end)) in by_record {
        let (start, end) = match (start, end) {
            (Some(start), Some(end)) => (start, end),
            _ => continue,
        };
        let (start_date, end_date) = match (parse_date(start), parse_date(end)) {
            (Some(s), Some(e)) => (s, e),
            _ => continue,
        };
        if end_date < start_date {
            inconsistencies.push(Inconsistency::new(
                InconsistencyKind::TimelineImpossibility,
                info_type,
                vec![start.id, end.id],
                format!(
                    "record {} ends {} before it starts {}",
                    record, end_date, start_date
                ),
            ));
        } else {
            periods.push((record, start_date, end_date, vec![start.id, end.id]));
        }
    }

    // Overlapping exclusive engagements (two full-time employment periods
    // covering the same span) are physically impossible.
    if info_type == InfoType::Employment {
        for i in 0..periods.len() {
            for j in (i + 1)..periods.len() {
                let (_, start_a, end_a, ids_a) = &periods[i];
                let (record_b, start_b, end_b, ids_b) = &periods[j];
                if start_a <= end_b && start_b <= end_a {
                    let overlap_days = (*end_a.min(end_b) - *start_a.max(start_b)).num_days();
                    // Short transitions overlap legitimately.
                    if overlap_days > 90 {
                        let mut fact_ids = ids_a.clone();
                        fact_ids.extend(ids_b.iter().copied());
                        inconsistencies.push(Inconsistency::new(
                            InconsistencyKind::TimelineImpossibility,
                            info_type,
                            fact_ids,
                            format!(
                                "employment periods overlap by {} days (record {})",
                                overlap_days, record_b
                            ),
                        ));
                    }
                }
            }
        }
    }

    inconsistencies
}

fn parse_date(fact: &Fact) -> Option<NaiveDate> {
    fact.claim
        .value
        .as_str()
        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::FactClaim;
    use screening_core::types::ProviderId;
    use screening_gateway::SourceAuthority;

    fn fact(info_type: InfoType, attribute: &str, value: &str, provider: &str, evidence: &str) -> Fact {
        Fact::new(
            info_type,
            FactClaim::new(attribute, serde_json::json!(value)),
            ProviderId::new(provider),
            SourceAuthority::Corroborative,
        )
        .with_evidence(evidence)
    }

    #[test]
    fn conflicting_names_from_distinct_sources_contradict() {
        let facts = vec![
            fact(InfoType::Identity, "full_name", "Alice Smith", "gov", "r1"),
            fact(InfoType::Identity, "full_name", "Alicia Smythe", "aggregator", "r2"),
        ];
        let found = detect_inconsistencies(InfoType::Identity, &facts, &[]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, InconsistencyKind::ClaimContradiction);
    }

    #[test]
    fn dob_disagreement_is_an_identifier_mismatch() {
        let facts = vec![
            fact(InfoType::Identity, "dob", "1990-04-02", "gov", "r1"),
            fact(InfoType::Identity, "dob", "1989-04-02", "aggregator", "r2"),
        ];
        let found = detect_inconsistencies(InfoType::Identity, &facts, &[]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, InconsistencyKind::IdentifierMismatch);
    }

    #[test]
    fn same_source_disagreement_is_not_a_contradiction() {
        let facts = vec![
            fact(InfoType::Identity, "full_name", "Alice Smith", "gov", "r1"),
            fact(InfoType::Identity, "full_name", "A Smith", "gov", "r2"),
        ];
        let found = detect_inconsistencies(InfoType::Identity, &facts, &[]);
        assert!(found.is_empty());
    }

    #[test]
    fn end_before_start_is_a_timeline_impossibility() {
        let facts = vec![
            fact(InfoType::Employment, "start_date", "2020-05-01", "hr", "r1"),
            fact(InfoType::Employment, "end_date", "2019-01-01", "hr", "r1"),
        ];
        let found = detect_inconsistencies(InfoType::Employment, &facts, &[]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, InconsistencyKind::TimelineImpossibility);
    }

    #[test]
    fn long_overlapping_employment_is_flagged() {
        let facts = vec![
            fact(InfoType::Employment, "start_date", "2018-01-01", "hr", "r1"),
            fact(InfoType::Employment, "end_date", "2020-01-01", "hr", "r1"),
            fact(InfoType::Employment, "start_date", "2018-06-01", "hr2", "r2"),
            fact(InfoType::Employment, "end_date", "2019-12-01", "hr2", "r2"),
        ];
        let found = detect_inconsistencies(InfoType::Employment, &facts, &[]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, InconsistencyKind::TimelineImpossibility);
    }

    #[test]
    fn already_reported_inconsistencies_are_not_duplicated() {
        let facts = vec![
            fact(InfoType::Identity, "dob", "1990-04-02", "gov", "r1"),
            fact(InfoType::Identity, "dob", "1989-04-02", "aggregator", "r2"),
        ];
        let first = detect_inconsistencies(InfoType::Identity, &facts, &[]);
        assert_eq!(first.len(), 1);
        let second = detect_inconsistencies(InfoType::Identity, &facts, &first);
        assert!(second.is_empty());
    }
}
