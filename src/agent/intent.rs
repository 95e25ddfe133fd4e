//! Keyword-based intent classification.
//!
//! Intentionally coarse substring matching over fixed phrase sets; the
//! routing behavior of the pipelines depends on these exact tables, so this
//! must not be silently upgraded to semantic matching.

use once_cell::sync::Lazy;
use regex::Regex;

/// Job-role keywords recognized in search requests
const COMMON_ROLES: &[&str] = &[
    "engineer",
    "developer",
    "software",
    "ml",
    "data scientist",
    "analyst",
    "manager",
    "designer",
    "product",
    "intern",
];

const FIND_KEYWORDS: &[&str] = &["find", "search", "look for", "get me"];
const APPLY_KEYWORDS: &[&str] = &["apply", "submit", "send"];
const STATUS_KEYWORDS: &[&str] = &["status", "check", "how many", "applications"];
const PROFILE_KEYWORDS: &[&str] = &["update", "change", "profile", "resume"];
const HELP_KEYWORDS: &[&str] = &["help", "what can you", "how do"];

/// Matches "in San Francisco" style location mentions
static LOCATION_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bin\s+([A-Z][a-z]+(?:\s+[A-Z][a-z]+)*)").expect("valid regex"));

/// Classified user intent with extracted parameters
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    FindJobs {
        keywords: Vec<String>,
        location: String,
        auto_apply: bool,
    },
    ApplyToJobs {
        auto: bool,
    },
    CheckStatus,
    UpdateProfile,
    Help,
    Unknown,
}

impl Intent {
    /// Classify a free-text user message. Earlier phrase sets win.
    pub fn classify(message: &str) -> Intent {
        let lower = message.to_lowercase();
        let contains_any = |keywords: &[&str]| keywords.iter().any(|k| lower.contains(k));

        if contains_any(FIND_KEYWORDS) {
            Intent::FindJobs {
                keywords: extract_keywords(&lower),
                location: extract_location(message),
                auto_apply: lower.contains("apply") || lower.contains("submit"),
            }
        } else if contains_any(APPLY_KEYWORDS) {
            Intent::ApplyToJobs {
                auto: lower.contains("automatic") || lower.contains("all"),
            }
        } else if contains_any(STATUS_KEYWORDS) {
            Intent::CheckStatus
        } else if contains_any(PROFILE_KEYWORDS) {
            Intent::UpdateProfile
        } else if contains_any(HELP_KEYWORDS) {
            Intent::Help
        } else {
            Intent::Unknown
        }
    }
}

/// Pull recognized role keywords out of a lowercased message
fn extract_keywords(lower: &str) -> Vec<String> {
    COMMON_ROLES
        .iter()
        .filter(|role| lower.contains(*role))
        .map(|role| role.to_string())
        .collect()
}

/// Pull a capitalized location following "in" out of the original message
fn extract_location(message: &str) -> String {
    LOCATION_PATTERN
        .captures(message)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}
