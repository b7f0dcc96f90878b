use screening_core::types::Severity;

/// Severity rule table keyed by subcategory. Rules come first; the keyword
/// heuristic below only fills in where no rule matches.
fn severity_by_rule(subcategory: &str) -> Option<Severity> {
    match subcategory {
        "felony_conviction" | "sanctions_hit" => Some(Severity::Critical),
        "regulatory_action" | "bankruptcy" | "credential_inflation" | "license_action" => {
            Some(Severity::High)
        }
        "misdemeanor" | "civil_judgment" | "delinquency" | "adverse_media_mention"
        | "timeline_impossibility" | "identifier_mismatch" | "unresolved_inconsistency" => {
            Some(Severity::Medium)
        }
        "employment_gap" | "criminal_record" => Some(Severity::Low),
        _ => None,
    }
}

/// Assign severity for a finding.
pub fn severity_for(subcategory: &str, description: &str) -> Severity {
    if let Some(severity) = severity_by_rule(subcategory) {
        return severity;
    }

    // Heuristic assist for subcategories outside the rule table.
    let text = description.to_lowercase();
    if ["fraud", "violence", "weapon", "trafficking", "terror"]
        .iter()
        .any(|k| text.contains(k))
    {
        Severity::High
    } else if ["dispute", "allegation", "pending"].iter().any(|k| text.contains(k)) {
        Severity::Medium
    } else {
        Severity::Low
    }
}
