use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::knowledge::{Fact, Inconsistency, InconsistencyKind};

/// Threshold for the systematic-inconsistency flag.
const SYSTEMATIC_INCONSISTENCY_COUNT: usize = 4;
/// Z-score beyond which a numeric fact is an outlier.
const OUTLIER_Z: f64 = 3.0;
/// Minimum samples before outlier detection is meaningful.
const MIN_SAMPLES: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    StatisticalOutlier,
    SystematicInconsistency,
    DeceptionIndicator,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Anomaly {
    pub kind: AnomalyKind,
    pub description: String,
    /// Points added to the risk score by the aggregator
    pub score_adjustment: f64,
}

/// Flag statistical outliers, systematic inconsistency patterns and
/// deception indicators over the investigation's accumulated knowledge.
pub fn detect_anomalies(facts: &[Fact], inconsistencies: &[Inconsistency]) -> Vec<Anomaly> {
    let mut anomalies = Vec::new();
    anomalies.extend(numeric_outliers(facts));

    let open: Vec<&Inconsistency> = inconsistencies.iter().filter(|i| i.is_open()).collect();
    if open.len() >= SYSTEMATIC_INCONSISTENCY_COUNT {
        anomalies.push(Anomaly {
            kind: AnomalyKind::SystematicInconsistency,
            description: format!(
                "{} unresolved inconsistencies across the investigation",
                open.len()
            ),
            score_adjustment: 8.0,
        });
    }

    anomalies.extend(deception_indicators(&open));
    anomalies
}

fn numeric_outliers(facts: &[Fact]) -> Vec<Anomaly> {
    let mut by_attribute: BTreeMap<&str, Vec<(&Fact, f64)>> = BTreeMap::new();
    for fact in facts {
        if let Some(value) = fact.claim.value.as_f64() {
            by_attribute
                .entry(fact.claim.attribute.as_str())
                .or_default()
                .push((fact, value));
        }
    }

    let mut anomalies = Vec::new();
    for (attribute, samples) in by_attribute {
        if samples.len() < MIN_SAMPLES {
            continue;
        }
        let values: Vec<f64> = samples.iter().map(|(_, v)| *v).collect();
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        let variance =
            values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
        let std_dev = variance.sqrt();
        if std_dev == 0.0 {
            continue;
        }
        for (_, value) in &samples {
            let z = (value - mean) / std_dev;
            if z.abs() >= OUTLIER_Z {
                anomalies.push(Anomaly {
                    kind: AnomalyKind::StatisticalOutlier,
                    description: format!(
                        "{} value {:.1} deviates {:.1} sigma from the distribution",
                        attribute, value, z
                    ),
                    score_adjustment: 3.0,
                });
            }
        }
    }
    anomalies
}

/// Deception indicators are specific inconsistency shapes: fabricated
/// timelines and inflated credentials.
fn deception_indicators(open: &[&Inconsistency]) -> Vec<Anomaly> {
    let mut anomalies = Vec::new();

    let timeline_count = open
        .iter()
        .filter(|i| i.kind == InconsistencyKind::TimelineImpossibility)
        .count();
    let education_contradictions = open
        .iter()
        .filter(|i| {
            i.kind == InconsistencyKind::ClaimContradiction
                && i.info_type == screening_core::types::InfoType::Education
        })
        .count();

    if timeline_count > 0 && education_contradictions > 0 {
        anomalies.push(Anomaly {
            kind: AnomalyKind::DeceptionIndicator,
            description: format!(
                "timeline impossibilities ({}) combined with credential contradictions ({})",
                timeline_count, education_contradictions
            ),
            score_adjustment: 10.0,
        });
    } else if timeline_count >= 2 {
        anomalies.push(Anomaly {
            kind: AnomalyKind::DeceptionIndicator,
            description: format!("{} independent timeline impossibilities", timeline_count),
            score_adjustment: 6.0,
        });
    }

    anomalies
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::FactClaim;
    use screening_core::types::{FactId, InfoType, ProviderId};
    use screening_gateway::SourceAuthority;

    fn numeric_fact(attribute: &str, value: f64) -> Fact {
        Fact::new(
            InfoType::Financial,
            FactClaim::new(attribute, serde_json::json!(value)),
            ProviderId::new("bureau"),
            SourceAuthority::Authoritative,
        )
    }

    fn inconsistency(kind: InconsistencyKind, info_type: InfoType) -> Inconsistency {
        Inconsistency::new(kind, info_type, vec![FactId::new()], "test")
    }

    #[test]
    fn outlier_detection_needs_spread_and_samples() {
        // Tight cluster with one extreme value.
        let mut facts: Vec<Fact> = (0..8).map(|_| numeric_fact("balance", 100.0)).collect();
        facts.push(numeric_fact("balance", 100.5));
        facts.push(numeric_fact("balance", 5000.0));

        let anomalies = detect_anomalies(&facts, &[]);
        assert!(anomalies
            .iter()
            .any(|a| a.kind == AnomalyKind::StatisticalOutlier));

        // Too few samples: no outlier flagged.
        let few = vec![numeric_fact("balance", 1.0), numeric_fact("balance", 5000.0)];
        assert!(detect_anomalies(&few, &[]).is_empty());
    }

    #[test]
    fn four_open_inconsistencies_are_systematic() {
        let inconsistencies: Vec<Inconsistency> = (0..4)
            .map(|_| inconsistency(InconsistencyKind::ClaimContradiction, InfoType::Identity))
            .collect();
        let anomalies = detect_anomalies(&[], &inconsistencies);
        assert!(anomalies
            .iter()
            .any(|a| a.kind == AnomalyKind::SystematicInconsistency));

        let three: Vec<Inconsistency> = inconsistencies.into_iter().take(3).collect();
        assert!(!detect_anomalies(&[], &three)
            .iter()
            .any(|a| a.kind == AnomalyKind::SystematicInconsistency));
    }

    #[test]
    fn timeline_plus_credential_contradiction_indicates_deception() {
        let inconsistencies = vec![
            inconsistency(InconsistencyKind::TimelineImpossibility, InfoType::Employment),
            inconsistency(InconsistencyKind::ClaimContradiction, InfoType::Education),
        ];
        let anomalies = detect_anomalies(&[], &inconsistencies);
        assert!(anomalies
            .iter()
            .any(|a| a.kind == AnomalyKind::DeceptionIndicator));
    }
}
