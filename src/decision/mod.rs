//! Decision engine for autonomous workflow verdicts.
//!
//! Turns match scores, platform and content heuristics, and a sliding
//! daily application cap into auto-apply/review/priority/follow-up
//! verdicts. Negative outcomes are values, never errors.

pub mod heuristics;

pub use heuristics::{detect_platform, has_complex_requirements, has_sensitive_fields};

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::bus::JsonMap;
use crate::types::{Application, Job, UserPreferences};

/// Thresholds and allow-lists, supplied at construction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionConfig {
    pub min_auto_apply_score: f64,
    pub max_applications_per_day: usize,
    pub trusted_platforms: HashSet<String>,
    pub review_threshold: f64,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            min_auto_apply_score: 90.0,
            max_applications_per_day: 10,
            trusted_platforms: ["linkedin", "greenhouse", "lever", "workday"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            review_threshold: 75.0,
        }
    }
}

/// A boolean decision with its human-readable reason
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub allow: bool,
    pub reason: String,
}

impl Verdict {
    pub fn yes(reason: impl Into<String>) -> Self {
        Self {
            allow: true,
            reason: reason.into(),
        }
    }

    pub fn no(reason: impl Into<String>) -> Self {
        Self {
            allow: false,
            reason: reason.into(),
        }
    }
}

/// Application priority bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

/// Recommended approach for one job application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationStrategy {
    pub auto_apply: bool,
    pub generate_documents: bool,
    pub require_review: bool,
    pub priority: Priority,
    pub estimated_minutes: u32,
}

/// Per-user application counters derived from the rate-limit state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionStats {
    pub applications_today: usize,
    pub applications_this_week: usize,
    pub remaining_today: usize,
    pub daily_limit: usize,
    pub min_auto_apply_score: f64,
}

/// Makes workflow decisions and enforces the daily application cap.
///
/// Scoring functions are pure over their inputs; the only state is the
/// per-user list of application timestamps (pruned to a 30-day window).
pub struct DecisionEngine {
    config: DecisionConfig,
    application_history: Mutex<HashMap<String, Vec<DateTime<Utc>>>>,
}

impl DecisionEngine {
    pub fn new(config: DecisionConfig) -> Self {
        info!(
            min_score = config.min_auto_apply_score,
            max_daily = config.max_applications_per_day,
            "decision engine initialized"
        );
        Self {
            config,
            application_history: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(DecisionConfig::default())
    }

    pub fn config(&self) -> &DecisionConfig {
        &self.config
    }

    /// Decide whether an application may be auto-submitted.
    ///
    /// Checks short-circuit in order: daily cap, match score, platform
    /// trust, complex requirements, sensitive form fields.
    pub fn should_auto_apply(
        &self,
        user_id: &str,
        job: &Job,
        form_data: Option<&JsonMap>,
    ) -> Verdict {
        if !self.under_daily_limit(user_id) {
            return Verdict::no("Daily application limit reached");
        }

        if job.match_score < self.config.min_auto_apply_score {
            return Verdict::no(format!(
                "Match score {} below threshold {}",
                job.match_score, self.config.min_auto_apply_score
            ));
        }

        let platform = detect_platform(&job.application_url);
        if !self.config.trusted_platforms.contains(platform) {
            return Verdict::no(format!("Platform '{}' not in trusted list", platform));
        }

        if has_complex_requirements(job) {
            return Verdict::no("Job has complex requirements (essays/portfolio)");
        }

        if let Some(form) = form_data {
            if has_sensitive_fields(form) {
                return Verdict::no("Application contains sensitive fields");
            }
        }

        Verdict::yes(format!(
            "Auto-apply approved (score={}, platform={})",
            job.match_score, platform
        ))
    }

    /// Decide whether generated documents need a human pass.
    /// Complex requirements force review regardless of score.
    pub fn needs_human_review(&self, job: &Job, _documents: Option<&JsonMap>) -> Verdict {
        if has_complex_requirements(job) {
            return Verdict::yes("Complex requirements detected");
        }

        if job.match_score >= self.config.min_auto_apply_score {
            return Verdict::no("High confidence match");
        }

        if job.match_score >= self.config.review_threshold {
            return Verdict::yes("Medium confidence - quick review recommended");
        }

        Verdict::yes("Low confidence - thorough review required")
    }

    /// Order jobs for application, highest priority first.
    /// Stable sort, so equal scores keep their input order.
    pub fn prioritize_jobs(
        &self,
        jobs: Vec<Job>,
        preferences: Option<&UserPreferences>,
    ) -> Vec<Job> {
        let mut scored: Vec<(f64, Job)> = jobs
            .into_iter()
            .map(|job| (self.priority_score(&job, preferences), job))
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        info!(count = scored.len(), "prioritized jobs");
        scored.into_iter().map(|(_, job)| job).collect()
    }

    /// Weighted priority: 40% match score, 20% recency (30-day linear
    /// decay), 15 platform trust, 15 simplicity, 5+5 preference alignment
    fn priority_score(&self, job: &Job, preferences: Option<&UserPreferences>) -> f64 {
        let mut priority = (job.match_score / 100.0) * 40.0;

        if let Some(posted) = job.posted_date {
            let days_ago = (Utc::now() - posted).num_days() as f64;
            priority += ((30.0 - days_ago) / 30.0).max(0.0) * 20.0;
        }

        let platform = detect_platform(&job.application_url);
        if self.config.trusted_platforms.contains(platform) {
            priority += 15.0;
        }

        if !has_complex_requirements(job) {
            priority += 15.0;
        }

        if let Some(prefs) = preferences {
            if prefs.preferred_locations.contains(&job.location) {
                priority += 5.0;
            }
            if prefs.employment_types.contains(&job.employment_type) {
                priority += 5.0;
            }
        }

        priority
    }

    /// Decide whether a follow-up is due for an application
    pub fn should_send_follow_up(
        &self,
        application: &Application,
        days_since_application: i64,
    ) -> Verdict {
        if application.status.is_terminal() {
            return Verdict::no(format!(
                "Application status is '{}'",
                application.status.as_str()
            ));
        }

        if days_since_application >= 7 && application.match_score >= 85.0 {
            return Verdict::yes("High priority job, 7+ days since application");
        }

        if days_since_application >= 14 {
            return Verdict::yes("Standard follow-up after 14 days");
        }

        Verdict::no("Too early for follow-up")
    }

    /// Pick the application approach for one job
    pub fn select_application_strategy(&self, job: &Job) -> ApplicationStrategy {
        let platform = detect_platform(&job.application_url);
        let trusted = self.config.trusted_platforms.contains(platform);
        let complex = has_complex_requirements(job);

        let mut strategy = ApplicationStrategy {
            auto_apply: false,
            generate_documents: true,
            require_review: false,
            priority: Priority::Medium,
            estimated_minutes: 5,
        };

        if job.match_score >= self.config.min_auto_apply_score && trusted && !complex {
            strategy.auto_apply = true;
            strategy.priority = Priority::High;
            strategy.estimated_minutes = 3;
        } else if job.match_score < self.config.min_auto_apply_score || complex {
            strategy.require_review = true;
            strategy.priority = if job.match_score >= self.config.review_threshold {
                Priority::Medium
            } else {
                Priority::Low
            };
            strategy.estimated_minutes = if complex { 10 } else { 5 };
        }

        debug!(
            job = %job.title,
            auto_apply = strategy.auto_apply,
            priority = strategy.priority.as_str(),
            "selected application strategy"
        );
        strategy
    }

    /// Record a submitted application and prune entries older than 30 days
    pub fn record_application(&self, user_id: &str) {
        let now = Utc::now();
        let cutoff = now - Duration::days(30);

        let mut history = self.application_history.lock().expect("history lock poisoned");
        let entries = history.entry(user_id.to_string()).or_default();
        entries.push(now);
        entries.retain(|dt| *dt > cutoff);
    }

    /// Today's/this week's counters for the status pipeline
    pub fn statistics(&self, user_id: &str) -> DecisionStats {
        let today = Utc::now().date_naive();
        let week_start = today - Duration::days(7);

        let history = self.application_history.lock().expect("history lock poisoned");
        let entries = history.get(user_id).map(Vec::as_slice).unwrap_or(&[]);

        let applications_today = entries
            .iter()
            .filter(|dt| dt.date_naive() == today)
            .count();
        let applications_this_week = entries
            .iter()
            .filter(|dt| dt.date_naive() >= week_start)
            .count();

        DecisionStats {
            applications_today,
            applications_this_week,
            remaining_today: self
                .config
                .max_applications_per_day
                .saturating_sub(applications_today),
            daily_limit: self.config.max_applications_per_day,
            min_auto_apply_score: self.config.min_auto_apply_score,
        }
    }

    fn under_daily_limit(&self, user_id: &str) -> bool {
        let today = Utc::now().date_naive();
        let history = self.application_history.lock().expect("history lock poisoned");
        let today_count = history
            .get(user_id)
            .map(|entries| entries.iter().filter(|dt| dt.date_naive() == today).count())
            .unwrap_or(0);

        let under = today_count < self.config.max_applications_per_day;
        if !under {
            warn!(
                user = %user_id,
                today_count,
                limit = self.config.max_applications_per_day,
                "daily application limit reached"
            );
        }
        under
    }
}

impl Default for DecisionEngine {
    fn default() -> Self {
        Self::with_defaults()
    }
}
