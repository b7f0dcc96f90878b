pub mod aggregate;
pub mod anomaly;
pub mod classifier;
pub mod connection;
pub mod extract;
pub mod finding;
pub mod pattern;
pub mod severity;

pub use aggregate::{
    aggregate, role_relevance, ComprehensiveRiskAssessment, Recommendation, RiskAdjustments,
    RiskLevel,
};
pub use anomaly::{detect_anomalies, Anomaly, AnomalyKind};
pub use classifier::{classify, validate_external};
pub use connection::{network_adjustment, ConnectionRisk};
pub use extract::extract_findings;
pub use finding::Finding;
pub use pattern::{recognize_patterns, PatternKind, RiskPattern};
pub use severity::severity_for;

use screening_core::audit::AuditLogger;
use screening_core::context::RequestContext;
use screening_core::error::Result;
use screening_core::types::{EntityId, RoleCategory};

use crate::knowledge::{Fact, Inconsistency};

/// Output of a full risk pipeline run.
#[derive(Debug, Clone)]
pub struct RiskOutcome {
    pub findings: Vec<Finding>,
    pub patterns: Vec<RiskPattern>,
    pub anomalies: Vec<Anomaly>,
    pub assessment: ComprehensiveRiskAssessment,
}

/// The full pipeline: extraction, classification, severity, role relevance,
/// anomaly and pattern analysis, network contribution, aggregation.
/// Deterministic given the same facts, inconsistencies and connections.
pub struct RiskPipeline {
    audit: AuditLogger,
}

impl RiskPipeline {
    pub fn new(audit: AuditLogger) -> Self {
        Self { audit }
    }

    pub async fn assess(
        &self,
        ctx: &RequestContext,
        entity_id: EntityId,
        role: RoleCategory,
        facts: &[Fact],
        inconsistencies: &[Inconsistency],
        connections: &[ConnectionRisk],
    ) -> Result<RiskOutcome> {
        let mut findings = extract_findings(facts, inconsistencies);
        for finding in &mut findings {
            finding.category = classify(&finding.subcategory, &finding.description);
            finding.severity = severity_for(&finding.subcategory, &finding.description);
            finding.relevance_to_role = role_relevance(finding.category, role);
        }

        let anomalies = detect_anomalies(facts, inconsistencies);
        let patterns = recognize_patterns(&findings);
        let assessment = aggregate(&findings, &patterns, &anomalies, connections);

        self.audit
            .log_risk_assessed(
                ctx,
                &entity_id.to_string(),
                assessment.final_score,
                &assessment.recommendation.to_string(),
            )
            .await?;

        Ok(RiskOutcome {
            findings,
            patterns,
            anomalies,
            assessment,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::FactClaim;
    use screening_core::audit::MemoryAuditStore;
    use screening_core::types::{InfoType, Jurisdiction, ProviderId, TenantId};
    use screening_gateway::SourceAuthority;
    use std::sync::Arc;

    fn pipeline() -> RiskPipeline {
        RiskPipeline::new(AuditLogger::new(Arc::new(MemoryAuditStore::new())))
    }

    fn criminal_fact(attribute: &str, value: &str) -> Fact {
        Fact::new(
            InfoType::Criminal,
            FactClaim::new(attribute, serde_json::json!(value)),
            ProviderId::new("courts"),
            SourceAuthority::Authoritative,
        )
        .with_evidence("case-1")
    }

    #[tokio::test]
    async fn felony_produces_scored_categorized_finding() {
        let ctx = RequestContext::new(TenantId::new(), Jurisdiction::Us);
        let facts = vec![
            criminal_fact("offense", "Felony fraud"),
            criminal_fact("disposition", "Convicted"),
        ];

        let outcome = pipeline()
            .assess(
                &ctx,
                EntityId::new(),
                RoleCategory::Finance,
                &facts,
                &[],
                &[],
            )
            .await
            .unwrap();

        assert_eq!(outcome.findings.len(), 1);
        let finding = &outcome.findings[0];
        assert_eq!(finding.category, screening_core::types::FindingCategory::Criminal);
        assert_eq!(finding.severity, screening_core::types::Severity::Critical);
        assert!(!finding.supporting_facts.is_empty());
        assert!(outcome.assessment.final_score > 25.0);
    }

    #[tokio::test]
    async fn pipeline_is_deterministic() {
        let ctx = RequestContext::new(TenantId::new(), Jurisdiction::Us);
        let facts = vec![
            criminal_fact("offense", "Felony fraud"),
            criminal_fact("disposition", "Convicted"),
        ];

        let first = pipeline()
            .assess(&ctx, EntityId::new(), RoleCategory::Other, &facts, &[], &[])
            .await
            .unwrap();
        let second = pipeline()
            .assess(&ctx, EntityId::new(), RoleCategory::Other, &facts, &[], &[])
            .await
            .unwrap();

        assert_eq!(first.assessment.final_score, second.assessment.final_score);
        let ids_first: Vec<_> = first.findings.iter().map(|f| f.id).collect();
        let ids_second: Vec<_> = second.findings.iter().map(|f| f.id).collect();
        assert_eq!(ids_first, ids_second);
    }
}
