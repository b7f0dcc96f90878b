use chrono::NaiveDate;
use std::collections::BTreeMap;

use screening_core::types::InfoType;

use crate::knowledge::{Fact, Inconsistency, InconsistencyKind};

use super::finding::Finding;

/// Turn accumulated facts and open inconsistencies into candidate findings.
/// Categories and severities are assigned downstream; extraction only
/// decides what is notable and which facts evidence it.
pub fn extract_findings(facts: &[Fact], inconsistencies: &[Inconsistency]) -> Vec<Finding> {
    let mut findings = Vec::new();

    // Record-level extraction: group facts by evidencing record so one
    // court case or media article produces one finding.
    let mut by_record: BTreeMap<(InfoType, &str), Vec<&Fact>> = BTreeMap::new();
    for fact in facts {
        if let Some(evidence) = fact.evidence_refs.first() {
            by_record
                .entry((fact.info_type, evidence.as_str()))
                .or_default()
                .push(fact);
        }
    }

    for ((info_type, _record), group) in &by_record {
        if let Some(finding) = finding_from_record(*info_type, group) {
            findings.push(finding);
        }
    }

    findings.extend(employment_gap_findings(facts));

    for inconsistency in inconsistencies.iter().filter(|i| i.is_open()) {
        let subcategory = match inconsistency.kind {
            InconsistencyKind::TimelineImpossibility => "timeline_impossibility",
            InconsistencyKind::ClaimContradiction => {
                if inconsistency.info_type == InfoType::Education {
                    "credential_inflation"
                } else {
                    "unresolved_inconsistency"
                }
            }
            InconsistencyKind::IdentifierMismatch => "identifier_mismatch",
        };
        findings.push(Finding::new(
            subcategory,
            inconsistency.description.clone(),
            None,
            inconsistency.fact_ids.clone(),
        ));
    }

    // Stable output order for the deterministic aggregate downstream.
    findings.sort_by(|a, b| a.id.to_string().cmp(&b.id.to_string()));
    findings.dedup_by(|a, b| a.id == b.id);
    findings
}

fn attr<'a>(group: &'a [&Fact], attribute: &str) -> Option<&'a Fact> {
    group.iter().find(|f| f.claim.attribute == attribute).copied()
}

fn text(fact: Option<&Fact>) -> Option<String> {
    fact.map(|f| f.claim.value_text()).filter(|s| !s.is_empty())
}

fn date_of(group: &[&Fact], attribute: &str) -> Option<NaiveDate> {
    attr(group, attribute)
        .and_then(|f| f.claim.value.as_str().map(str::to_owned))
        .and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok())
}

fn fact_ids(group: &[&Fact]) -> Vec<screening_core::types::FactId> {
    group.iter().map(|f| f.id).collect()
}

fn finding_from_record(info_type: InfoType, group: &[&Fact]) -> Option<Finding> {
    match info_type {
        InfoType::Criminal => {
            let offense = text(attr(group, "offense"))?;
            let disposition = text(attr(group, "disposition")).unwrap_or_default();
            let subcategory = if offense.contains("felony") {
                "felony_conviction"
            } else if offense.contains("misdemeanor") {
                "misdemeanor"
            } else {
                "criminal_record"
            };
            Some(Finding::new(
                subcategory,
                format!("{} ({})", offense, disposition),
                date_of(group, "decision_date"),
                fact_ids(group),
            ))
        }
        InfoType::Sanctions => {
            let list_name = text(attr(group, "list_name"))?;
            Some(Finding::new(
                "sanctions_hit",
                format!("listed on {}", list_name),
                None,
                fact_ids(group),
            ))
        }
        InfoType::Regulatory => {
            let action = text(attr(group, "action"))?;
            let body = text(attr(group, "body")).unwrap_or_default();
            Some(Finding::new(
                "regulatory_action",
                format!("{} by {}", action, body),
                date_of(group, "decision_date"),
                fact_ids(group),
            ))
        }
        InfoType::Civil => {
            let claim_type = text(attr(group, "claim_type"))?;
            let outcome = text(attr(group, "outcome")).unwrap_or_default();
            Some(Finding::new(
                "civil_judgment",
                format!("{} ({})", claim_type, outcome),
                None,
                fact_ids(group),
            ))
        }
        InfoType::Financial => {
            let bankruptcies = attr(group, "bankruptcies")
                .and_then(|f| f.claim.value.as_u64())
                .unwrap_or(0);
            let delinquencies = attr(group, "delinquencies")
                .and_then(|f| f.claim.value.as_u64())
                .unwrap_or(0);
            if bankruptcies > 0 {
                Some(Finding::new(
                    "bankruptcy",
                    format!("{} bankruptcy filing(s) on record", bankruptcies),
                    None,
                    fact_ids(group),
                ))
            } else if delinquencies > 0 {
                Some(Finding::new(
                    "delinquency",
                    format!("{} delinquent account(s)", delinquencies),
                    None,
                    fact_ids(group),
                ))
            } else {
                None
            }
        }
        InfoType::AdverseMedia => {
            let headline = text(attr(group, "headline"))?;
            Some(Finding::new(
                "adverse_media_mention",
                headline,
                date_of(group, "published_at"),
                fact_ids(group),
            ))
        }
        InfoType::Licenses => {
            let status = text(attr(group, "status"))?;
            if status.contains("revoked") || status.contains("suspended") {
                let license = text(attr(group, "license_type")).unwrap_or_default();
                Some(Finding::new(
                    "license_action",
                    format!("{} license {}", license, status),
                    None,
                    fact_ids(group),
                ))
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Employment gaps: more than 180 days between consecutive verified
/// engagements.
fn employment_gap_findings(facts: &[Fact]) -> Vec<Finding> {
    let mut periods: BTreeMap<&str, (Option<NaiveDate>, Option<NaiveDate>, Vec<&Fact>)> =
        BTreeMap::new();
    for fact in facts.iter().filter(|f| f.info_type == InfoType::Employment) {
        let evidence = match fact.evidence_refs.first() {
            Some(e) => e.as_str(),
            None => continue,
        };
        let entry = periods.entry(evidence).or_insert((None, None, Vec::new()));
        let parsed = fact
            .claim
            .value
            .as_str()
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok());
        match fact.claim.attribute.as_str() {
            "start_date" => entry.0 = parsed,
            "end_date" => entry.1 = parsed,
            _ => {}
        }
        entry.2.push(fact);
    }

    let mut spans: Vec<(NaiveDate, NaiveDate, Vec<&Fact>)> = periods
        .into_values()
        .filter_map(|(start, end, facts)| Some((start?, end?, facts)))
        .collect();
    spans.sort_by_key(|(start, _, _)| *start);

    let mut findings = Vec::new();
    for window in spans.windows(2) {
        let (_, previous_end, previous_facts) = &window[0];
        let (next_start, _, next_facts) = &window[1];
        let gap_days = (*next_start - *previous_end).num_days();
        if gap_days > 180 {
            let mut supporting = previous_facts.iter().map(|f| f.id).collect::<Vec<_>>();
            supporting.extend(next_facts.iter().map(|f| f.id));
            findings.push(Finding::new(
                "employment_gap",
                format!("{} day gap between verified engagements", gap_days),
                Some(*previous_end),
                supporting,
            ));
        }
    }
    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::FactClaim;
    use screening_core::types::ProviderId;
    use screening_gateway::SourceAuthority;

    fn fact(info_type: InfoType, attribute: &str, value: serde_json::Value, evidence: &str) -> Fact {
        Fact::new(
            info_type,
            FactClaim::new(attribute, value),
            ProviderId::new("test"),
            SourceAuthority::Authoritative,
        )
        .with_evidence(evidence)
    }

    #[test]
    fn felony_record_becomes_a_finding() {
        let facts = vec![
            fact(InfoType::Criminal, "offense", serde_json::json!("Felony fraud"), "case-1"),
            fact(InfoType::Criminal, "disposition", serde_json::json!("Convicted"), "case-1"),
            fact(
                InfoType::Criminal,
                "decision_date",
                serde_json::json!("2019-06-01"),
                "case-1",
            ),
        ];
        let findings = extract_findings(&facts, &[]);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].subcategory, "felony_conviction");
        assert_eq!(findings[0].supporting_facts.len(), 3);
        assert!(findings[0].date.is_some());
    }

    #[test]
    fn employment_gap_over_180_days_is_extracted() {
        let facts = vec![
            fact(InfoType::Employment, "start_date", serde_json::json!("2015-01-01"), "job-1"),
            fact(InfoType::Employment, "end_date", serde_json::json!("2017-01-01"), "job-1"),
            fact(InfoType::Employment, "start_date", serde_json::json!("2018-06-01"), "job-2"),
            fact(InfoType::Employment, "end_date", serde_json::json!("2020-01-01"), "job-2"),
        ];
        let findings = extract_findings(&facts, &[]);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].subcategory, "employment_gap");
    }

    #[test]
    fn education_contradiction_reads_as_credential_inflation() {
        let inconsistency = Inconsistency::new(
            InconsistencyKind::ClaimContradiction,
            InfoType::Education,
            vec![screening_core::types::FactId::new()],
            "degree asserted as phd vs none",
        );
        let findings = extract_findings(&[], &[inconsistency]);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].subcategory, "credential_inflation");
    }

    #[test]
    fn extraction_is_deterministic() {
        let facts = vec![
            fact(InfoType::Criminal, "offense", serde_json::json!("Felony fraud"), "case-1"),
            fact(InfoType::Sanctions, "list_name", serde_json::json!("OFAC SDN"), "hit-1"),
        ];
        let first = extract_findings(&facts, &[]);
        let second = extract_findings(&facts, &[]);
        let ids_first: Vec<_> = first.iter().map(|f| f.id).collect();
        let ids_second: Vec<_> = second.iter().map(|f| f.id).collect();
        assert_eq!(ids_first, ids_second);
    }
}
