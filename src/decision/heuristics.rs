//! Keyword heuristics over fixed vocabularies.
//!
//! Platform detection and complex/sensitive-content detection are plain
//! substring matchers kept standalone so the phrase tables stay a single
//! point of change and each matcher is testable on its own.

use crate::bus::JsonMap;
use crate::types::Job;

/// Fallback platform name for unrecognized URLs
pub const UNKNOWN_PLATFORM: &str = "unknown";

/// URL substring -> platform name, first match wins
const PLATFORM_MARKERS: &[(&str, &str)] = &[
    ("linkedin.com", "linkedin"),
    ("greenhouse.io", "greenhouse"),
    ("greenhouse", "greenhouse"),
    ("lever.co", "lever"),
    ("myworkdayjobs", "workday"),
    ("workday", "workday"),
    ("smartrecruiters", "smartrecruiters"),
    ("icims", "icims"),
];

/// Phrases that disqualify a job from fully automated handling
const COMPLEX_INDICATORS: &[&str] = &[
    "cover letter required",
    "portfolio required",
    "portfolio link",
    "why do you want",
    "why are you interested",
    "writing sample",
    "work sample",
    "take-home assignment",
    "coding challenge",
    "essay question",
];

/// Form-field name substrings that disqualify auto-submission
const SENSITIVE_PATTERNS: &[&str] = &[
    "salary",
    "compensation",
    "ssn",
    "social security",
    "references",
    "legal",
    "authorization",
    "visa",
    "citizenship",
    "background check",
];

/// Detect the application platform from its URL
pub fn detect_platform(url: &str) -> &'static str {
    let url_lower = url.to_lowercase();
    PLATFORM_MARKERS
        .iter()
        .find(|(marker, _)| url_lower.contains(marker))
        .map(|(_, platform)| *platform)
        .unwrap_or(UNKNOWN_PLATFORM)
}

/// Whether the job text mentions essays, portfolios, take-home work, or
/// coding challenges
pub fn has_complex_requirements(job: &Job) -> bool {
    let combined = format!(
        "{} {}",
        job.description.to_lowercase(),
        job.qualifications.to_lowercase()
    );
    COMPLEX_INDICATORS
        .iter()
        .any(|indicator| combined.contains(indicator))
}

/// Whether any form-field name matches a sensitive pattern
pub fn has_sensitive_fields(form_data: &JsonMap) -> bool {
    form_data.keys().any(|field_name| {
        let field_lower = field_name.to_lowercase();
        SENSITIVE_PATTERNS
            .iter()
            .any(|pattern| field_lower.contains(pattern))
    })
}
