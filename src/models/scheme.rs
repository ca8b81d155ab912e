//! Scheme eligibility, resource suggestions, and legal assistance payloads.

use serde::{Deserialize, Serialize};

/// Eligibility verdict for one scheme, for one beneficiary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemeVerdict {
    pub scheme_name: String,
    pub eligibility: bool,
    /// Short explanations when not eligible; empty when eligible.
    #[serde(default)]
    pub reasons: Vec<String>,
}

/// Per-beneficiary scheme verdicts from `/get-scheme-eligibility`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemeEligibility {
    pub beneficiary_id: String,
    #[serde(default)]
    pub schemes_eligibility: Vec<SchemeVerdict>,
}

impl SchemeEligibility {
    pub fn eligible_count(&self) -> usize {
        self.schemes_eligibility
            .iter()
            .filter(|v| v.eligibility)
            .count()
    }
}

/// One suggested intervention from `/suggest-resources`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intervention {
    pub scheme: String,
    pub description: String,
    #[serde(default)]
    pub priority: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceSuggestions {
    #[serde(default)]
    pub interventions: Vec<Intervention>,
}

/// Answer from `POST /legal-assistance`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegalAssistance {
    pub issue_description: String,
    #[serde(default)]
    pub tips: Vec<String>,
    #[serde(default)]
    pub relevant_sections: Vec<String>,
}
