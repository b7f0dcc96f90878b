use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use screening_core::types::FindingCategory;

use super::finding::Finding;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    Escalation,
    FrequencyAnomaly,
    CrossDomainClustering,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskPattern {
    pub kind: PatternKind,
    pub description: String,
    /// Points added to the risk score by the aggregator
    pub score_adjustment: f64,
}

/// Recognize longitudinal patterns over the finding set: severity
/// escalation, bursts of activity, and clustering across domains.
pub fn recognize_patterns(findings: &[Finding]) -> Vec<RiskPattern> {
    let mut patterns = Vec::new();
    patterns.extend(escalation(findings));
    patterns.extend(frequency_anomaly(findings));
    patterns.extend(cross_domain_clustering(findings));
    patterns
}

/// Severity trending upward over time across dated findings.
fn escalation(findings: &[Finding]) -> Option<RiskPattern> {
    let mut dated: Vec<&Finding> = findings.iter().filter(|f| f.date.is_some()).collect();
    if dated.len() < 3 {
        return None;
    }
    dated.sort_by_key(|f| f.date);

    let mid = dated.len() / 2;
    let early: f64 = dated[..mid]
        .iter()
        .map(|f| f.severity.weight())
        .sum::<f64>()
        / mid as f64;
    let late: f64 = dated[mid..]
        .iter()
        .map(|f| f.severity.weight())
        .sum::<f64>()
        / (dated.len() - mid) as f64;

    if late > early * 1.5 {
        Some(RiskPattern {
            kind: PatternKind::Escalation,
            description: format!(
                "severity trend rising ({:.0} -> {:.0} average weight)",
                early, late
            ),
            score_adjustment: 7.0,
        })
    } else {
        None
    }
}

/// A burst year: one year holding three or more findings and more than
/// double the per-year average.
fn frequency_anomaly(findings: &[Finding]) -> Option<RiskPattern> {
    let mut by_year: BTreeMap<i32, usize> = BTreeMap::new();
    for finding in findings {
        if let Some(date) = finding.date {
            *by_year.entry(date.year()).or_default() += 1;
        }
    }
    if by_year.len() < 2 {
        return None;
    }
    let total: usize = by_year.values().sum();
    let average = total as f64 / by_year.len() as f64;
    let (year, peak) = by_year.iter().max_by_key(|(_, count)| **count)?;

    if *peak >= 3 && *peak as f64 > average * 2.0 {
        Some(RiskPattern {
            kind: PatternKind::FrequencyAnomaly,
            description: format!("{} findings clustered in {}", peak, year),
            score_adjustment: 5.0,
        })
    } else {
        None
    }
}

/// Findings spread across three or more risk domains.
fn cross_domain_clustering(findings: &[Finding]) -> Option<RiskPattern> {
    let domains: BTreeSet<FindingCategory> = findings
        .iter()
        .map(|f| f.category)
        .filter(|c| *c != FindingCategory::Verification)
        .collect();

    if domains.len() >= 3 {
        Some(RiskPattern {
            kind: PatternKind::CrossDomainClustering,
            description: format!("findings span {} risk domains", domains.len()),
            score_adjustment: 6.0,
        })
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use screening_core::types::{FactId, Severity};

    fn finding(
        subcategory: &str,
        category: FindingCategory,
        severity: Severity,
        date: Option<NaiveDate>,
    ) -> Finding {
        let mut finding = Finding::new(
            subcategory,
            format!("{} test", subcategory),
            date,
            vec![FactId::new()],
        );
        finding.category = category;
        finding.severity = severity;
        finding
    }

    fn date(year: i32, month: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(year, month, 1)
    }

    #[test]
    fn rising_severity_is_escalation() {
        let findings = vec![
            finding("a", FindingCategory::Criminal, Severity::Low, date(2015, 1)),
            finding("b", FindingCategory::Criminal, Severity::Low, date(2017, 1)),
            finding("c", FindingCategory::Criminal, Severity::High, date(2019, 1)),
            finding("d", FindingCategory::Criminal, Severity::Critical, date(2021, 1)),
        ];
        let patterns = recognize_patterns(&findings);
        assert!(patterns.iter().any(|p| p.kind == PatternKind::Escalation));
    }

    #[test]
    fn flat_severity_is_not_escalation() {
        let findings = vec![
            finding("a", FindingCategory::Criminal, Severity::Medium, date(2015, 1)),
            finding("b", FindingCategory::Criminal, Severity::Medium, date(2017, 1)),
            finding("c", FindingCategory::Criminal, Severity::Medium, date(2019, 1)),
        ];
        let patterns = recognize_patterns(&findings);
        assert!(!patterns.iter().any(|p| p.kind == PatternKind::Escalation));
    }

    #[test]
    fn burst_year_is_a_frequency_anomaly() {
        let findings = vec![
            finding("a", FindingCategory::Financial, Severity::Medium, date(2018, 1)),
            finding("b", FindingCategory::Financial, Severity::Medium, date(2021, 1)),
            finding("c", FindingCategory::Financial, Severity::Medium, date(2021, 5)),
            finding("d", FindingCategory::Financial, Severity::Medium, date(2021, 9)),
        ];
        let patterns = recognize_patterns(&findings);
        assert!(patterns
            .iter()
            .any(|p| p.kind == PatternKind::FrequencyAnomaly));
    }

    #[test]
    fn three_domains_cluster() {
        let findings = vec![
            finding("a", FindingCategory::Criminal, Severity::Medium, None),
            finding("b", FindingCategory::Financial, Severity::Medium, None),
            finding("c", FindingCategory::Regulatory, Severity::Medium, None),
        ];
        let patterns = recognize_patterns(&findings);
        assert!(patterns
            .iter()
            .any(|p| p.kind == PatternKind::CrossDomainClustering));
    }

    #[test]
    fn verification_findings_do_not_count_as_a_domain() {
        let findings = vec![
            finding("a", FindingCategory::Verification, Severity::Low, None),
            finding("b", FindingCategory::Verification, Severity::Low, None),
            finding("c", FindingCategory::Criminal, Severity::Medium, None),
            finding("d", FindingCategory::Financial, Severity::Medium, None),
        ];
        let patterns = recognize_patterns(&findings);
        assert!(!patterns
            .iter()
            .any(|p| p.kind == PatternKind::CrossDomainClustering));
    }
}
