//! Shared value types for jobs, applications, and user preferences.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A job listing as returned by the persistence collaborator
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Job {
    pub job_id: String,
    pub title: String,

    #[serde(default)]
    pub company_name: String,

    /// Profile match score, 0-100
    #[serde(default)]
    pub match_score: f64,

    #[serde(default)]
    pub application_url: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub qualifications: String,

    #[serde(default)]
    pub posted_date: Option<DateTime<Utc>>,

    #[serde(default)]
    pub location: String,

    #[serde(default)]
    pub employment_type: String,
}

/// Status of a submitted (or attempted) application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Submitted,
    Pending,
    RequiresManual,
    Failed,
    Rejected,
    InterviewScheduled,
    OfferReceived,
}

impl ApplicationStatus {
    /// Terminal statuses never receive a follow-up
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ApplicationStatus::Rejected
                | ApplicationStatus::InterviewScheduled
                | ApplicationStatus::OfferReceived
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Submitted => "submitted",
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::RequiresManual => "requires_manual",
            ApplicationStatus::Failed => "failed",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::InterviewScheduled => "interview_scheduled",
            ApplicationStatus::OfferReceived => "offer_received",
        }
    }
}

/// A tracked application, as read back from the store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    pub job_id: String,
    pub status: ApplicationStatus,

    #[serde(default)]
    pub match_score: f64,

    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
}

/// User preferences consulted during job prioritization
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserPreferences {
    #[serde(default)]
    pub preferred_locations: Vec<String>,

    #[serde(default)]
    pub employment_types: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(ApplicationStatus::Rejected.is_terminal());
        assert!(ApplicationStatus::InterviewScheduled.is_terminal());
        assert!(ApplicationStatus::OfferReceived.is_terminal());
        assert!(!ApplicationStatus::Submitted.is_terminal());
        assert!(!ApplicationStatus::Pending.is_terminal());
    }

    #[test]
    fn test_status_wire_names() {
        let json = serde_json::to_string(&ApplicationStatus::InterviewScheduled).unwrap();
        assert_eq!(json, "\"interview_scheduled\"");

        let status: ApplicationStatus = serde_json::from_str("\"requires_manual\"").unwrap();
        assert_eq!(status, ApplicationStatus::RequiresManual);
    }

    #[test]
    fn test_job_deserializes_with_defaults() {
        let job: Job = serde_json::from_str(r#"{"job_id": "j1", "title": "ML Engineer"}"#).unwrap();
        assert_eq!(job.job_id, "j1");
        assert_eq!(job.match_score, 0.0);
        assert!(job.posted_date.is_none());
    }
}
