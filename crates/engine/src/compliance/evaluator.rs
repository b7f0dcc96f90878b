use chrono::Duration;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, warn};

use screening_core::audit::{AuditEvent, AuditLogger, EventType};
use screening_core::context::RequestContext;
use screening_core::error::Result;
use screening_core::types::{CheckType, Jurisdiction, RoleCategory};
use screening_gateway::ComplianceGate;

use super::rule::{ComplianceRule, ConsentScope, RuleLogic};
use super::store::ComplianceRuleStore;

/// Evaluated compliance outcome for one `(jurisdiction, role)` pair.
///
/// The ruleset fails closed: with no matching rules nothing is permitted.
#[derive(Debug, Clone)]
pub struct Ruleset {
    pub jurisdiction: Jurisdiction,
    pub role_category: RoleCategory,
    pub permitted_checks: BTreeSet<CheckType>,
    pub lookback_limits: BTreeMap<CheckType, Duration>,
    pub redaction_rules: BTreeMap<CheckType, BTreeSet<String>>,
    pub disclosure_requirements: Vec<String>,
    pub consent_scope: ConsentScope,
    pub retention_limit: Option<Duration>,
}

impl Ruleset {
    fn empty(jurisdiction: Jurisdiction, role_category: RoleCategory) -> Self {
        Self {
            jurisdiction,
            role_category,
            permitted_checks: BTreeSet::new(),
            lookback_limits: BTreeMap::new(),
            redaction_rules: BTreeMap::new(),
            disclosure_requirements: Vec::new(),
            consent_scope: ConsentScope::default(),
            retention_limit: None,
        }
    }

    pub fn is_permitted(&self, check_type: CheckType) -> bool {
        self.permitted_checks.contains(&check_type)
    }

    pub fn lookback(&self, check_type: CheckType) -> Option<Duration> {
        self.lookback_limits.get(&check_type).copied()
    }

    pub fn redactions(&self, check_type: CheckType) -> Option<&BTreeSet<String>> {
        self.redaction_rules.get(&check_type)
    }

    /// Fold one rule into the set. Most-restrictive wins: lookbacks take the
    /// minimum, consent the maximum scope, redactions the union.
    fn fold(&mut self, rule: &ComplianceRule) {
        match &rule.logic {
            RuleLogic::CheckPermitted { checks } => {
                self.permitted_checks.extend(checks.iter().copied());
            }
            RuleLogic::LookbackLimit { check_type, days } => {
                let limit = Duration::days(*days);
                self.lookback_limits
                    .entry(*check_type)
                    .and_modify(|existing| {
                        if limit < *existing {
                            *existing = limit;
                        }
                    })
                    .or_insert(limit);
            }
            RuleLogic::RedactionRequired { check_type, fields } => {
                self.redaction_rules
                    .entry(*check_type)
                    .or_default()
                    .extend(fields.iter().cloned());
            }
            RuleLogic::ConsentRequired { scope } => {
                if *scope > self.consent_scope {
                    self.consent_scope = *scope;
                }
            }
            RuleLogic::DisclosureRequired { text_key } => {
                if !self.disclosure_requirements.contains(text_key) {
                    self.disclosure_requirements.push(text_key.clone());
                }
            }
            RuleLogic::RetentionLimit { days } => {
                let limit = Duration::days(*days);
                self.retention_limit = Some(match self.retention_limit {
                    Some(existing) if existing < limit => existing,
                    _ => limit,
                });
            }
        }
    }
}

impl ComplianceGate for Ruleset {
    fn is_permitted(&self, check: CheckType) -> bool {
        Ruleset::is_permitted(self, check)
    }
}

/// Evaluates the active rules for an investigation into a `Ruleset`.
pub struct ComplianceEvaluator {
    store: Arc<dyn ComplianceRuleStore>,
    audit: AuditLogger,
}

impl ComplianceEvaluator {
    pub fn new(store: Arc<dyn ComplianceRuleStore>, audit: AuditLogger) -> Self {
        Self { store, audit }
    }

    pub async fn evaluate(
        &self,
        ctx: &RequestContext,
        jurisdiction: &Jurisdiction,
        role: RoleCategory,
    ) -> Result<Ruleset> {
        let mut rules: Vec<ComplianceRule> = self
            .store
            .active_rules(ctx, jurisdiction)
            .await?
            .into_iter()
            .filter(|rule| rule.matches(jurisdiction, role))
            .collect();
        rules.sort_by_key(|rule| rule.priority);

        let mut ruleset = Ruleset::empty(jurisdiction.clone(), role);
        if rules.is_empty() {
            // No rules loaded means nothing is permitted. Never fail open.
            warn!(
                jurisdiction = %jurisdiction,
                role = %role,
                "No compliance rules loaded; ruleset permits nothing"
            );
        }
        for rule in &rules {
            ruleset.fold(rule);
        }

        debug!(
            jurisdiction = %jurisdiction,
            role = %role,
            permitted = ruleset.permitted_checks.len(),
            "Evaluated compliance ruleset"
        );

        let event = AuditEvent::builder(
            EventType::RulesetEvaluated,
            format!(
                "ruleset for {}/{}: {} checks permitted",
                jurisdiction,
                role,
                ruleset.permitted_checks.len()
            ),
        )
        .metadata("rule_count", serde_json::json!(rules.len()))
        .metadata(
            "permitted_checks",
            serde_json::json!(ruleset
                .permitted_checks
                .iter()
                .map(|c| c.as_str())
                .collect::<Vec<_>>()),
        )
        .build();
        self.audit.log_event(ctx, event).await?;

        Ok(ruleset)
    }
}
