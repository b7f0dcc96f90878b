use serde::{Deserialize, Serialize};

use screening_core::types::{FindingCategory, RoleCategory};

use super::anomaly::Anomaly;
use super::connection::{network_adjustment, ConnectionRisk};
use super::finding::Finding;
use super::pattern::RiskPattern;

/// Disposition recommended to the consuming workflow based on the final
/// score band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Clear,
    Review,
    EnhancedReview,
    AdverseActionCandidate,
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Recommendation::Clear => "clear",
            Recommendation::Review => "review",
            Recommendation::EnhancedReview => "enhanced_review",
            Recommendation::AdverseActionCandidate => "adverse_action_candidate",
        };
        write!(f, "{}", name)
    }
}

/// Coarse banding of the final score, carried on the profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Moderate,
    Elevated,
    Critical,
}

impl RiskLevel {
    pub fn from_score(score: f64) -> Self {
        if score <= 25.0 {
            RiskLevel::Low
        } else if score <= 50.0 {
            RiskLevel::Moderate
        } else if score <= 75.0 {
            RiskLevel::Elevated
        } else {
            RiskLevel::Critical
        }
    }
}

/// Itemized adjustments applied on top of the base score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAdjustments {
    pub patterns: f64,
    pub anomalies: f64,
    pub network: f64,
}

impl RiskAdjustments {
    pub fn total(&self) -> f64 {
        self.patterns + self.anomalies + self.network
    }
}

/// Final output of the risk pipeline. Deterministic for identical inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComprehensiveRiskAssessment {
    pub final_score: f64,
    pub base_score: f64,
    pub adjustments: RiskAdjustments,
    pub recommendation: Recommendation,
    pub risk_level: RiskLevel,
}

/// Role relevance of a finding category. The base score weights each
/// finding by how much its domain matters for the subject's role.
pub fn role_relevance(category: FindingCategory, role: RoleCategory) -> f64 {
    match (role, category) {
        (RoleCategory::Finance, FindingCategory::Financial) => 1.0,
        (RoleCategory::Finance, FindingCategory::Regulatory) => 0.9,
        (RoleCategory::Finance, FindingCategory::Criminal) => 0.9,

        (RoleCategory::Government, FindingCategory::Criminal) => 1.0,
        (RoleCategory::Government, FindingCategory::Regulatory) => 0.9,
        (RoleCategory::Government, FindingCategory::Reputation) => 0.8,

        (RoleCategory::Energy, FindingCategory::Regulatory) => 1.0,
        (RoleCategory::Energy, FindingCategory::Criminal) => 0.9,

        (RoleCategory::Healthcare, FindingCategory::Criminal) => 1.0,
        (RoleCategory::Healthcare, FindingCategory::Regulatory) => 0.9,

        (_, FindingCategory::Criminal) => 0.9,
        (_, FindingCategory::Financial) => 0.7,
        (_, FindingCategory::Regulatory) => 0.7,
        (_, FindingCategory::Reputation) => 0.6,
        (_, FindingCategory::Behavioral) => 0.6,
        (_, FindingCategory::Verification) => 0.5,
        (_, FindingCategory::Network) => 0.4,
    }
}

/// `final = clamp(base + patterns + anomalies + network, 0, 100)` where base
/// is the relevance-weighted severity sum capped at 100.
pub fn aggregate(
    findings: &[Finding],
    patterns: &[RiskPattern],
    anomalies: &[Anomaly],
    connections: &[ConnectionRisk],
) -> ComprehensiveRiskAssessment {
    // Findings arrive sorted by id from extraction; summation order is
    // stable so the same inputs always produce the same score.
    let base_score: f64 = findings
        .iter()
        .map(|f| f.relevance_to_role * f.severity.weight())
        .sum::<f64>()
        .min(100.0);

    let adjustments = RiskAdjustments {
        patterns: patterns.iter().map(|p| p.score_adjustment).sum(),
        anomalies: anomalies.iter().map(|a| a.score_adjustment).sum(),
        network: network_adjustment(connections),
    };

    let final_score = (base_score + adjustments.total()).clamp(0.0, 100.0);

    let recommendation = if final_score <= 25.0 {
        Recommendation::Clear
    } else if final_score <= 50.0 {
        Recommendation::Review
    } else if final_score <= 75.0 {
        Recommendation::EnhancedReview
    } else {
        Recommendation::AdverseActionCandidate
    };

    ComprehensiveRiskAssessment {
        final_score,
        base_score,
        adjustments,
        recommendation,
        risk_level: RiskLevel::from_score(final_score),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use screening_core::types::{FactId, Severity};

    fn finding(category: FindingCategory, severity: Severity, relevance: f64) -> Finding {
        let mut finding = Finding::new(
            format!("{}-{:?}", category, severity),
            "test finding",
            None,
            vec![FactId::new()],
        );
        finding.category = category;
        finding.severity = severity;
        finding.relevance_to_role = relevance;
        finding
    }

    #[test]
    fn clean_subject_is_clear() {
        let assessment = aggregate(&[], &[], &[], &[]);
        assert_eq!(assessment.final_score, 0.0);
        assert_eq!(assessment.recommendation, Recommendation::Clear);
        assert_eq!(assessment.risk_level, RiskLevel::Low);
    }

    #[test]
    fn recommendation_bands_match_contract() {
        // One fully relevant critical finding: 50 points -> review band edge.
        let findings = vec![finding(FindingCategory::Criminal, Severity::Critical, 1.0)];
        let assessment = aggregate(&findings, &[], &[], &[]);
        assert_eq!(assessment.base_score, 50.0);
        assert_eq!(assessment.recommendation, Recommendation::Review);

        // Two critical findings push into enhanced review and beyond.
        let findings = vec![
            finding(FindingCategory::Criminal, Severity::Critical, 1.0),
            finding(FindingCategory::Regulatory, Severity::Critical, 1.0),
        ];
        let assessment = aggregate(&findings, &[], &[], &[]);
        assert_eq!(assessment.base_score, 100.0);
        assert_eq!(
            assessment.recommendation,
            Recommendation::AdverseActionCandidate
        );
    }

    #[test]
    fn adjustments_add_and_clamp() {
        let findings = vec![finding(FindingCategory::Criminal, Severity::Critical, 1.0)];
        let patterns = vec![super::super::pattern::RiskPattern {
            kind: super::super::pattern::PatternKind::Escalation,
            description: "rising".to_string(),
            score_adjustment: 7.0,
        }];
        let anomalies = vec![super::super::anomaly::Anomaly {
            kind: super::super::anomaly::AnomalyKind::SystematicInconsistency,
            description: "inconsistent".to_string(),
            score_adjustment: 8.0,
        }];

        let assessment = aggregate(&findings, &patterns, &anomalies, &[]);
        assert_eq!(assessment.final_score, 65.0);
        assert_eq!(assessment.recommendation, Recommendation::EnhancedReview);
    }

    #[test]
    fn aggregation_is_deterministic() {
        let findings = vec![
            finding(FindingCategory::Criminal, Severity::High, 0.9),
            finding(FindingCategory::Financial, Severity::Medium, 0.7),
        ];
        let first = aggregate(&findings, &[], &[], &[]);
        let second = aggregate(&findings, &[], &[], &[]);
        assert_eq!(first.final_score, second.final_score);
        assert_eq!(first.base_score, second.base_score);
    }

    #[test]
    fn role_relevance_prefers_domain_match() {
        assert!(
            role_relevance(FindingCategory::Financial, RoleCategory::Finance)
                > role_relevance(FindingCategory::Financial, RoleCategory::Other)
        );
        assert_eq!(role_relevance(FindingCategory::Criminal, RoleCategory::Government), 1.0);
    }
}
