use async_trait::async_trait;
use tokio::sync::RwLock;

use screening_core::context::RequestContext;
use screening_core::error::Result;
use screening_core::types::{CheckType, Jurisdiction, RoleCategory};

use super::rule::{ComplianceRule, ConsentScope, RuleLogic};

/// Storage seam for compliance rules. Implementations return only active
/// rules for the jurisdiction; role filtering happens in the evaluator.
#[async_trait]
pub trait ComplianceRuleStore: Send + Sync {
    async fn active_rules(
        &self,
        ctx: &RequestContext,
        jurisdiction: &Jurisdiction,
    ) -> Result<Vec<ComplianceRule>>;

    async fn put_rule(&self, ctx: &RequestContext, rule: ComplianceRule) -> Result<()>;
}

/// In-memory rule store.
pub struct MemoryComplianceRuleStore {
    rules: RwLock<Vec<ComplianceRule>>,
}

impl MemoryComplianceRuleStore {
    pub fn new() -> Self {
        Self {
            rules: RwLock::new(Vec::new()),
        }
    }

    pub fn with_rules(rules: Vec<ComplianceRule>) -> Self {
        Self {
            rules: RwLock::new(rules),
        }
    }

    /// Baseline rulebook used by default wiring and scenario tests.
    ///
    /// US permits the full check set. The EU permits foundation checks,
    /// sanctions, regulatory and adverse media for every role; criminal
    /// checks are limited to government roles with a ten-year lookback and
    /// enhanced consent.
    pub fn with_default_rulebook() -> Self {
        let mut rules = Vec::new();

        rules.push(
            ComplianceRule::new(
                Jurisdiction::Us,
                RuleLogic::CheckPermitted {
                    checks: CheckType::all().to_vec(),
                },
            )
            .with_priority(10),
        );
        rules.push(
            ComplianceRule::new(
                Jurisdiction::Us,
                RuleLogic::LookbackLimit {
                    check_type: CheckType::Criminal,
                    days: 2555,
                },
            )
            .with_priority(20),
        );
        rules.push(
            ComplianceRule::new(
                Jurisdiction::Us,
                RuleLogic::RedactionRequired {
                    check_type: CheckType::Credit,
                    fields: vec!["account_number".to_string()],
                },
            )
            .with_priority(30),
        );

        rules.push(
            ComplianceRule::new(
                Jurisdiction::Eu,
                RuleLogic::CheckPermitted {
                    checks: vec![
                        CheckType::Identity,
                        CheckType::Employment,
                        CheckType::Education,
                        CheckType::Sanctions,
                        CheckType::Regulatory,
                        CheckType::AdverseMedia,
                    ],
                },
            )
            .with_priority(10),
        );
        rules.push(
            ComplianceRule::new(
                Jurisdiction::Eu,
                RuleLogic::CheckPermitted {
                    checks: vec![CheckType::Criminal],
                },
            )
            .for_role(RoleCategory::Government)
            .with_priority(20),
        );
        rules.push(
            ComplianceRule::new(
                Jurisdiction::Eu,
                RuleLogic::LookbackLimit {
                    check_type: CheckType::Criminal,
                    days: 3650,
                },
            )
            .for_role(RoleCategory::Government)
            .with_priority(21),
        );
        rules.push(
            ComplianceRule::new(
                Jurisdiction::Eu,
                RuleLogic::ConsentRequired {
                    scope: ConsentScope::Enhanced,
                },
            )
            .with_priority(40),
        );
        rules.push(
            ComplianceRule::new(
                Jurisdiction::Eu,
                RuleLogic::DisclosureRequired {
                    text_key: "gdpr_processing_notice".to_string(),
                },
            )
            .with_priority(41),
        );
        rules.push(
            ComplianceRule::new(
                Jurisdiction::Eu,
                RuleLogic::RetentionLimit { days: 365 },
            )
            .with_priority(50),
        );

        Self::with_rules(rules)
    }
}

impl Default for MemoryComplianceRuleStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ComplianceRuleStore for MemoryComplianceRuleStore {
    async fn active_rules(
        &self,
        _ctx: &RequestContext,
        jurisdiction: &Jurisdiction,
    ) -> Result<Vec<ComplianceRule>> {
        let rules = self.rules.read().await;
        Ok(rules
            .iter()
            .filter(|rule| rule.active && &rule.jurisdiction == jurisdiction)
            .cloned()
            .collect())
    }

    async fn put_rule(&self, _ctx: &RequestContext, rule: ComplianceRule) -> Result<()> {
        self.rules.write().await.push(rule);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use screening_core::types::TenantId;

    #[tokio::test]
    async fn default_rulebook_scopes_by_jurisdiction() {
        let store = MemoryComplianceRuleStore::with_default_rulebook();
        let ctx = RequestContext::new(TenantId::new(), Jurisdiction::Eu);

        let eu = store.active_rules(&ctx, &Jurisdiction::Eu).await.unwrap();
        assert!(!eu.is_empty());
        assert!(eu.iter().all(|r| r.jurisdiction == Jurisdiction::Eu));

        let uk = store.active_rules(&ctx, &Jurisdiction::Uk).await.unwrap();
        assert!(uk.is_empty());
    }
}
