use serde::{Deserialize, Serialize};
use uuid::Uuid;

use screening_core::types::{CheckType, Jurisdiction, RoleCategory};

/// Consent scope escalates along `Basic < Enhanced < Premium`; the evaluator
/// keeps the highest scope any rule demands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsentScope {
    Basic,
    Enhanced,
    Premium,
}

impl Default for ConsentScope {
    fn default() -> Self {
        ConsentScope::Basic
    }
}

/// Rule payloads are heterogeneous but structured: a tagged variant per rule
/// type, each carrying only its own fields. Nothing downstream ever handles
/// a free-form map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule_type", rename_all = "snake_case")]
pub enum RuleLogic {
    CheckPermitted {
        checks: Vec<CheckType>,
    },
    LookbackLimit {
        check_type: CheckType,
        days: i64,
    },
    RedactionRequired {
        check_type: CheckType,
        fields: Vec<String>,
    },
    ConsentRequired {
        scope: ConsentScope,
    },
    DisclosureRequired {
        text_key: String,
    },
    RetentionLimit {
        days: i64,
    },
}

impl RuleLogic {
    pub fn rule_type(&self) -> &'static str {
        match self {
            RuleLogic::CheckPermitted { .. } => "check_permitted",
            RuleLogic::LookbackLimit { .. } => "lookback_limit",
            RuleLogic::RedactionRequired { .. } => "redaction_required",
            RuleLogic::ConsentRequired { .. } => "consent_required",
            RuleLogic::DisclosureRequired { .. } => "disclosure_required",
            RuleLogic::RetentionLimit { .. } => "retention_limit",
        }
    }
}

/// One compliance rule, matched on jurisdiction and (optionally) role.
/// A `None` role applies to every role in the jurisdiction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceRule {
    pub id: Uuid,
    pub jurisdiction: Jurisdiction,
    pub role_category: Option<RoleCategory>,
    pub logic: RuleLogic,
    pub active: bool,
    /// Lower priority folds first; later (higher-priority-number) rules see
    /// the accumulated ruleset. Most-restrictive folding makes the order
    /// irrelevant for limits, but it is kept deterministic regardless.
    pub priority: i32,
}

impl ComplianceRule {
    pub fn new(jurisdiction: Jurisdiction, logic: RuleLogic) -> Self {
        Self {
            id: Uuid::new_v4(),
            jurisdiction,
            role_category: None,
            logic,
            active: true,
            priority: 100,
        }
    }

    pub fn for_role(mut self, role: RoleCategory) -> Self {
        self.role_category = Some(role);
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// Whether this rule applies to the given (jurisdiction, role) pair.
    pub fn matches(&self, jurisdiction: &Jurisdiction, role: RoleCategory) -> bool {
        if !self.active || &self.jurisdiction != jurisdiction {
            return false;
        }
        match self.role_category {
            None => true,
            Some(rule_role) => rule_role == role,
        }
    }
}
