use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use screening_core::types::{EntityId, FindingId, ProfileVersion, Severity};

use crate::risk::Finding;

use super::model::Profile;

/// Named pattern detected on a profile delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvolutionSignal {
    RiskEscalation,
    NetworkExpansion,
    CriticalFindingsSurge,
}

impl std::fmt::Display for EvolutionSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EvolutionSignal::RiskEscalation => "risk_escalation",
            EvolutionSignal::NetworkExpansion => "network_expansion",
            EvolutionSignal::CriticalFindingsSurge => "critical_findings_surge",
        };
        write!(f, "{}", name)
    }
}

/// A finding present in both versions whose severity or supporting facts
/// changed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangedFinding {
    pub id: FindingId,
    pub old_severity: Severity,
    pub new_severity: Severity,
    pub facts_changed: bool,
}

/// Structured difference between two profile versions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileDelta {
    pub entity_id: EntityId,
    pub old_version: ProfileVersion,
    pub new_version: ProfileVersion,
    pub new_findings: Vec<Finding>,
    pub resolved_findings: Vec<Finding>,
    pub changed_findings: Vec<ChangedFinding>,
    pub risk_score_change: f64,
    pub connection_changes: i64,
    pub evolution_signals: Vec<EvolutionSignal>,
}

impl ProfileDelta {
    pub fn is_empty(&self) -> bool {
        self.new_findings.is_empty()
            && self.resolved_findings.is_empty()
            && self.changed_findings.is_empty()
            && self.risk_score_change == 0.0
            && self.connection_changes == 0
    }
}

const RISK_ESCALATION_FRACTION: f64 = 0.30;
const NETWORK_EXPANSION_EDGES: i64 = 10;
const CRITICAL_SURGE_COUNT: usize = 3;

/// Compare two profile versions by finding id.
pub fn delta(old: &Profile, new: &Profile) -> ProfileDelta {
    let old_by_id: BTreeMap<FindingId, &Finding> =
        old.findings.iter().map(|f| (f.id, f)).collect();
    let new_by_id: BTreeMap<FindingId, &Finding> =
        new.findings.iter().map(|f| (f.id, f)).collect();

    let new_findings: Vec<Finding> = new
        .findings
        .iter()
        .filter(|f| !old_by_id.contains_key(&f.id))
        .cloned()
        .collect();
    let resolved_findings: Vec<Finding> = old
        .findings
        .iter()
        .filter(|f| !new_by_id.contains_key(&f.id))
        .cloned()
        .collect();

    let mut changed_findings = Vec::new();
    for (id, old_finding) in &old_by_id {
        if let Some(new_finding) = new_by_id.get(id) {
            let severity_changed = old_finding.severity != new_finding.severity;
            let facts_changed = old_finding.supporting_facts != new_finding.supporting_facts;
            if severity_changed || facts_changed {
                changed_findings.push(ChangedFinding {
                    id: *id,
                    old_severity: old_finding.severity,
                    new_severity: new_finding.severity,
                    facts_changed,
                });
            }
        }
    }

    let risk_score_change = new.risk_score - old.risk_score;
    let connection_changes =
        new.entity_graph.edge_count() as i64 - old.entity_graph.edge_count() as i64;

    let mut evolution_signals = Vec::new();
    if risk_score_change > RISK_ESCALATION_FRACTION * 100.0 {
        evolution_signals.push(EvolutionSignal::RiskEscalation);
    }
    if connection_changes > NETWORK_EXPANSION_EDGES {
        evolution_signals.push(EvolutionSignal::NetworkExpansion);
    }
    let new_critical = new_findings
        .iter()
        .filter(|f| f.severity == Severity::Critical)
        .count();
    if new_critical >= CRITICAL_SURGE_COUNT {
        evolution_signals.push(EvolutionSignal::CriticalFindingsSurge);
    }

    ProfileDelta {
        entity_id: new.entity_id,
        old_version: old.version,
        new_version: new.version,
        new_findings,
        resolved_findings,
        changed_findings,
        risk_score_change,
        connection_changes,
        evolution_signals,
    }
}
