use once_cell::sync::Lazy;
use regex::RegexSet;

use screening_core::types::FindingCategory;

/// Keyword tables per category, applied rule-first. An externally assigned
/// category is only accepted when its keyword coverage validates it;
/// anything unmatched falls back to `Verification`.
static CATEGORY_PATTERNS: Lazy<Vec<(FindingCategory, RegexSet)>> = Lazy::new(|| {
    vec![
        (
            FindingCategory::Criminal,
            RegexSet::new([
                r"felony",
                r"misdemeanor",
                r"conviction",
                r"offense",
                r"criminal",
                r"arrest",
            ])
            .expect("criminal patterns"),
        ),
        (
            FindingCategory::Financial,
            RegexSet::new([
                r"bankruptcy",
                r"delinquen",
                r"debt",
                r"credit",
                r"lien",
                r"default",
            ])
            .expect("financial patterns"),
        ),
        (
            FindingCategory::Regulatory,
            RegexSet::new([
                r"regulat",
                r"sanction",
                r"license",
                r"debar",
                r"enforcement",
                r"violation",
            ])
            .expect("regulatory patterns"),
        ),
        (
            FindingCategory::Reputation,
            RegexSet::new([r"media", r"headline", r"scandal", r"allegation", r"article"])
                .expect("reputation patterns"),
        ),
        (
            FindingCategory::Behavioral,
            RegexSet::new([
                r"deception",
                r"inflation",
                r"timeline",
                r"impossib",
                r"misrepresent",
                r"gap",
            ])
            .expect("behavioral patterns"),
        ),
        (
            FindingCategory::Network,
            RegexSet::new([r"associate", r"connection", r"network", r"affiliat"])
                .expect("network patterns"),
        ),
    ]
});

/// Subcategory-level rules take precedence over keyword scans; they encode
/// the extraction vocabulary directly.
fn category_by_rule(subcategory: &str) -> Option<FindingCategory> {
    match subcategory {
        "felony_conviction" | "misdemeanor" | "criminal_record" => Some(FindingCategory::Criminal),
        "bankruptcy" | "delinquency" => Some(FindingCategory::Financial),
        "sanctions_hit" | "regulatory_action" | "license_action" => {
            Some(FindingCategory::Regulatory)
        }
        "civil_judgment" => Some(FindingCategory::Financial),
        "adverse_media_mention" => Some(FindingCategory::Reputation),
        "employment_gap" => Some(FindingCategory::Verification),
        "timeline_impossibility" | "credential_inflation" => Some(FindingCategory::Behavioral),
        "unresolved_inconsistency" | "identifier_mismatch" => Some(FindingCategory::Verification),
        "network_exposure" => Some(FindingCategory::Network),
        _ => None,
    }
}

/// Classify a finding from its subcategory and description.
pub fn classify(subcategory: &str, description: &str) -> FindingCategory {
    if let Some(category) = category_by_rule(subcategory) {
        return category;
    }

    let haystack = format!("{} {}", subcategory, description).to_lowercase();
    let mut best: Option<(FindingCategory, usize)> = None;
    for (category, patterns) in CATEGORY_PATTERNS.iter() {
        let hits = patterns.matches(&haystack).iter().count();
        if hits == 0 {
            continue;
        }
        best = match best {
            Some((_, best_hits)) if best_hits >= hits => best,
            _ => Some((*category, hits)),
        };
    }

    best.map(|(category, _)| category)
        .unwrap_or(FindingCategory::Verification)
}

/// Validate an externally assigned category against the keyword tables.
/// Accepts it only when at least one of the category's keywords appears;
/// otherwise falls back to rule-based classification.
pub fn validate_external(
    assigned: FindingCategory,
    subcategory: &str,
    description: &str,
) -> FindingCategory {
    let haystack = format!("{} {}", subcategory, description).to_lowercase();
    let coverage = CATEGORY_PATTERNS
        .iter()
        .find(|(category, _)| *category == assigned)
        .map(|(_, patterns)| patterns.matches(&haystack).iter().count())
        .unwrap_or(0);

    if coverage > 0 {
        assigned
    } else {
        classify(subcategory, description)
    }
}
