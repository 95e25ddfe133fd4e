//! Pipeline orchestrator - main coordinator.
//!
//! Composes the communication bus, conversation state tracker, and decision
//! engine into the search, apply, and status pipelines, driven per turn by
//! keyword intent classification. Every pipeline returns a response object;
//! bus failures degrade to partial user-readable text instead of
//! propagating.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::{error, info};

use crate::agent::intent::Intent;
use crate::bus::{CommunicationBus, JsonMap, Message, Response};
use crate::decision::{DecisionConfig, DecisionEngine, DecisionStats};
use crate::errors::Result;
use crate::state::{ConversationState, PipelinePhase};
use crate::store::JobStore;
use crate::types::{ApplicationStatus, Job};

/// Endpoint name the orchestrator sends from
pub const ORCHESTRATOR_NAME: &str = "orchestrator";

/// Worker endpoint names the pipelines dispatch to
pub const SCOUT_AGENT: &str = "scout";
pub const MATCHER_AGENT: &str = "matcher";
pub const APPLICATION_AGENT: &str = "application";

/// Maximum jobs processed per apply batch
pub const MAX_APPLY_BATCH: usize = 10;

/// Orchestrator tuning knobs
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Deadline for each worker request
    pub send_timeout: Duration,

    /// Minimum match score requested from the matcher
    pub min_match_score: f64,

    /// Pause after each item in the apply batch (external rate limits)
    pub batch_delay: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            send_timeout: Duration::from_secs(30),
            min_match_score: 60.0,
            batch_delay: Duration::from_millis(250),
        }
    }
}

/// Tallied outcomes of one apply batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct ApplySummary {
    pub auto_submitted: usize,
    pub pending_review: usize,
    pub manual_required: usize,
    pub failed: usize,
}

/// Per-turn response returned to the hosting CLI/chat/UI layer.
///
/// `needs_human_input` signals a checkpoint, not an error.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct UserResponse {
    pub message: String,
    pub needs_human_input: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_action: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub jobs: Option<Vec<Job>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub statistics: Option<DecisionStats>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<ApplySummary>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UserResponse {
    fn checkpoint(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            needs_human_input: true,
            ..Default::default()
        }
    }
}

/// Orchestrator coordinating all worker agents and per-user workflows
pub struct Orchestrator {
    bus: Arc<CommunicationBus>,
    state: ConversationState,
    engine: DecisionEngine,
    store: Arc<dyn JobStore>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn JobStore>,
        decision_config: DecisionConfig,
        config: OrchestratorConfig,
    ) -> Self {
        info!("orchestrator initialized");
        Self {
            bus: Arc::new(CommunicationBus::new()),
            state: ConversationState::new(),
            engine: DecisionEngine::new(decision_config),
            store,
            config,
        }
    }

    pub fn with_defaults(store: Arc<dyn JobStore>) -> Self {
        Self::new(store, DecisionConfig::default(), OrchestratorConfig::default())
    }

    pub fn bus(&self) -> &Arc<CommunicationBus> {
        &self.bus
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    pub fn engine(&self) -> &DecisionEngine {
        &self.engine
    }

    /// Register a worker agent against the bus
    pub fn register_agent(
        &self,
        name: impl Into<String>,
        handler: Arc<dyn crate::bus::AgentHandler>,
    ) {
        self.bus.register_agent(name, handler);
    }

    /// Main entry point - handle one user turn and orchestrate the response
    pub async fn handle_user_message(&self, user_id: &str, text: &str) -> UserResponse {
        info!(user = %user_id, "handling user message");

        self.state.increment_message_count(user_id);
        self.state.add_history(user_id, text, "user", None);

        let intent = Intent::classify(text);
        info!(user = %user_id, intent = ?intent, "classified intent");

        let response = match intent {
            Intent::FindJobs {
                keywords,
                location,
                auto_apply,
            } => {
                self.search_pipeline(user_id, keywords, location, auto_apply)
                    .await
            }
            Intent::ApplyToJobs { .. } => self.apply_pipeline(user_id).await,
            Intent::CheckStatus => self.status_pipeline(user_id),
            Intent::UpdateProfile => self.profile_pipeline(),
            Intent::Help => self.help_response(),
            Intent::Unknown => UserResponse::checkpoint(
                "I'm not sure what you'd like me to do. \
                 Try: 'Find me jobs' or 'Check my status'",
            ),
        };

        self.state
            .add_history(user_id, &response.message, "assistant", None);
        response
    }

    /// Search pipeline: scout -> matcher -> selection or checkpoint
    async fn search_pipeline(
        &self,
        user_id: &str,
        keywords: Vec<String>,
        location: String,
        auto_apply: bool,
    ) -> UserResponse {
        info!(user = %user_id, "starting job search pipeline");
        self.state.set_phase(user_id, PipelinePhase::Searching);

        if !self.bus.is_registered(SCOUT_AGENT) {
            let mut response = UserResponse::checkpoint(
                "Scout agent not available. Please ensure all agents are registered.",
            );
            response.error = Some("scout_not_available".to_string());
            return response;
        }

        let criteria = json!({
            "keywords": keywords,
            "location": location,
            "user_id": user_id,
        });
        self.state.save_search_criteria(user_id, criteria.clone());

        let mut text = String::from("Searching for jobs");
        if !keywords.is_empty() {
            text.push_str(&format!(" matching: {}", keywords.join(", ")));
        }
        if !location.is_empty() {
            text.push_str(&format!(" in {}", location));
        }
        text.push_str("...\n\n");

        // Step 1: scout for listings; a failed step degrades to 0 results
        let mut params = JsonMap::new();
        params.insert("criteria".to_string(), criteria);
        let job_count = match self.send_to_agent(SCOUT_AGENT, "search_jobs", params).await {
            Ok(response) => {
                let count = response
                    .as_ref()
                    .and_then(|r| r.get("job_count"))
                    .and_then(Value::as_u64)
                    .unwrap_or(0);
                text.push_str(&format!("Found {} job listings\n", count));
                count
            }
            Err(e) => {
                error!(user = %user_id, error = %e, "scout step failed");
                text.push_str(&format!("Search failed: {}\n", e));
                0
            }
        };

        // Step 2: match against the user's profile
        self.state.set_phase(user_id, PipelinePhase::Matching);

        if self.bus.is_registered(MATCHER_AGENT) && job_count > 0 {
            let mut params = JsonMap::new();
            params.insert("user_id".to_string(), json!(user_id));
            params.insert("min_score".to_string(), json!(self.config.min_match_score));

            match self.send_to_agent(MATCHER_AGENT, "rank_jobs", params).await {
                Ok(response) => {
                    let matched: Vec<Job> = response
                        .as_ref()
                        .and_then(|r| r.get("jobs"))
                        .and_then(|v| serde_json::from_value(v.clone()).ok())
                        .unwrap_or_default();

                    text.push_str(&format!("Matched {} jobs to your profile\n\n", matched.len()));

                    if !matched.is_empty() {
                        let job_ids: Vec<String> =
                            matched.iter().map(|j| j.job_id.clone()).collect();
                        self.state.save_job_selection(user_id, job_ids.clone());

                        text.push_str("Top matches:\n");
                        for (i, job) in matched.iter().take(5).enumerate() {
                            text.push_str(&format!(
                                "  {}. {} at {} (Score: {:.0}/100)\n",
                                i + 1,
                                job.title,
                                job.company_name,
                                job.match_score
                            ));
                        }

                        if auto_apply {
                            text.push_str(
                                "\nYou requested automatic application. \
                                 I'll now apply to the top matches.",
                            );
                            let top_ids: Vec<String> =
                                job_ids.into_iter().take(MAX_APPLY_BATCH).collect();
                            self.state.set_pending_action(
                                user_id,
                                "apply_to_jobs",
                                json!({"job_ids": top_ids, "auto": true}),
                                None,
                            );
                            return UserResponse {
                                message: text,
                                needs_human_input: false,
                                next_action: Some("apply_to_jobs".to_string()),
                                jobs: Some(matched.into_iter().take(MAX_APPLY_BATCH).collect()),
                                ..Default::default()
                            };
                        }

                        return UserResponse {
                            message: text,
                            needs_human_input: true,
                            options: Some(vec![
                                "Apply to all jobs scored 90+".to_string(),
                                "Apply to top 5".to_string(),
                                "Show me details for review".to_string(),
                                "Refine search".to_string(),
                            ]),
                            next_action: Some("await_job_selection".to_string()),
                            jobs: Some(matched),
                            ..Default::default()
                        };
                    }

                    text.push_str(&format!(
                        "No jobs matched your profile criteria (min score: {:.0})",
                        self.config.min_match_score
                    ));
                }
                Err(e) => {
                    error!(user = %user_id, error = %e, "matcher step failed");
                    text.push_str(&format!("Matching failed: {}\n", e));
                }
            }
        }

        self.state.set_phase(user_id, PipelinePhase::Idle);
        UserResponse::checkpoint(text)
    }

    /// Apply pipeline: strategy per job, dispatch, tally, record
    async fn apply_pipeline(&self, user_id: &str) -> UserResponse {
        info!(user = %user_id, "starting application pipeline");
        self.state.set_phase(user_id, PipelinePhase::Applying);

        if !self.bus.is_registered(APPLICATION_AGENT) {
            let mut response = UserResponse::checkpoint(
                "Application agents not available. Please ensure all agents are registered.",
            );
            response.error = Some("application_agents_not_available".to_string());
            return response;
        }

        let selected = self.state.get_job_selection(user_id);
        if selected.is_empty() {
            return UserResponse::checkpoint("No jobs selected. Please search for jobs first.");
        }

        let mut text = format!("Preparing applications for {} jobs...\n\n", selected.len());
        self.state.set_phase(user_id, PipelinePhase::GeneratingDocs);

        let mut summary = ApplySummary::default();
        let batch: Vec<&String> = selected.iter().take(MAX_APPLY_BATCH).collect();
        let batch_len = batch.len();

        for (index, job_id) in batch.into_iter().enumerate() {
            let job = match self.store.get_job(job_id).await {
                Ok(Some(job)) => job,
                Ok(None) => {
                    summary.failed += 1;
                    continue;
                }
                Err(e) => {
                    error!(user = %user_id, job = %job_id, error = %e, "job lookup failed");
                    summary.failed += 1;
                    continue;
                }
            };

            let strategy = self.engine.select_application_strategy(&job);

            let mut params = JsonMap::new();
            params.insert("job_id".to_string(), json!(job_id));
            params.insert("user_id".to_string(), json!(user_id));
            params.insert("documents".to_string(), json!({}));
            params.insert("auto_submit".to_string(), json!(strategy.auto_apply));

            let status = match self
                .send_to_agent(APPLICATION_AGENT, "apply_to_job", params)
                .await
            {
                Ok(response) => response
                    .as_ref()
                    .and_then(|r| r.get("result"))
                    .and_then(|r| r.get("status"))
                    .and_then(Value::as_str)
                    .and_then(parse_application_status)
                    .unwrap_or(ApplicationStatus::Failed),
                Err(e) => {
                    error!(user = %user_id, job = %job_id, error = %e, "application failed");
                    ApplicationStatus::Failed
                }
            };

            match status {
                ApplicationStatus::Submitted => {
                    summary.auto_submitted += 1;
                    text.push_str(&format!("Applied to {}\n", job.title));
                    self.engine.record_application(user_id);
                }
                ApplicationStatus::Pending => {
                    summary.pending_review += 1;
                    text.push_str(&format!(
                        "Prepared application for {} (needs review)\n",
                        job.title
                    ));
                }
                ApplicationStatus::RequiresManual => {
                    summary.manual_required += 1;
                    text.push_str(&format!("{} requires manual application\n", job.title));
                }
                _ => {
                    summary.failed += 1;
                }
            }

            if let Err(e) = self
                .store
                .record_application_status(user_id, job_id, status)
                .await
            {
                error!(user = %user_id, job = %job_id, error = %e, "status record failed");
            }

            // Pause between items, never before the first
            if index + 1 < batch_len && !self.config.batch_delay.is_zero() {
                tokio::time::sleep(self.config.batch_delay).await;
            }
        }

        text.push_str("\nSummary:\n");
        if summary.auto_submitted > 0 {
            text.push_str(&format!(
                "  - {} applications submitted automatically\n",
                summary.auto_submitted
            ));
        }
        if summary.pending_review > 0 {
            text.push_str(&format!(
                "  - {} applications ready for review\n",
                summary.pending_review
            ));
        }
        if summary.manual_required > 0 {
            text.push_str(&format!(
                "  - {} applications require manual submission\n",
                summary.manual_required
            ));
        }
        if summary.failed > 0 {
            text.push_str(&format!("  - {} applications failed\n", summary.failed));
        }

        let stats = self.engine.statistics(user_id);
        text.push_str(&format!(
            "\nToday's stats: {}/{} applications sent",
            stats.applications_today, stats.daily_limit
        ));

        self.state.set_phase(user_id, PipelinePhase::Completed);

        UserResponse {
            message: text,
            needs_human_input: summary.pending_review > 0 || summary.manual_required > 0,
            statistics: Some(stats),
            summary: Some(summary),
            ..Default::default()
        }
    }

    /// Status pipeline: read-only snapshot of stats, phase, pending action
    fn status_pipeline(&self, user_id: &str) -> UserResponse {
        info!(user = %user_id, "getting status");

        let stats = self.engine.statistics(user_id);
        let phase = self.state.get_phase(user_id);

        let mut text = String::from("Your Application Status\n\n");
        text.push_str(&format!(
            "Today: {}/{} applications\n",
            stats.applications_today, stats.daily_limit
        ));
        text.push_str(&format!(
            "This Week: {} applications\n",
            stats.applications_this_week
        ));
        text.push_str(&format!(
            "Remaining Today: {} applications\n\n",
            stats.remaining_today
        ));
        text.push_str(&format!("Current State: {}\n", phase.as_str()));

        if let Some(pending) = self.state.get_pending_action(user_id) {
            text.push_str(&format!("\nPending Action: {}", pending.action_type));
        }

        UserResponse {
            message: text,
            needs_human_input: false,
            statistics: Some(stats),
            ..Default::default()
        }
    }

    fn profile_pipeline(&self) -> UserResponse {
        UserResponse::checkpoint("Profile management is handled outside this assistant for now.")
    }

    fn help_response(&self) -> UserResponse {
        let text = "\
Job Application Agent - What I Can Do

Job Search:
- \"Find ML engineer jobs in San Francisco\"
- \"Search for software engineering internships\"

Applications:
- \"Apply to the top 5 matches\"
- \"Submit applications automatically\"

Status:
- \"Check my status\"
- \"What's my daily limit?\"

High-confidence matches on trusted platforms are applied to \
automatically, within daily safety limits; everything else waits \
for your confirmation.";

        UserResponse {
            message: text.to_string(),
            needs_human_input: false,
            ..Default::default()
        }
    }

    async fn send_to_agent(
        &self,
        to_agent: &str,
        action: &str,
        params: JsonMap,
    ) -> Result<Option<Response>> {
        let message = Message::request(ORCHESTRATOR_NAME, to_agent, action, params);
        self.bus.send(message, self.config.send_timeout).await
    }
}

fn parse_application_status(status: &str) -> Option<ApplicationStatus> {
    match status {
        "submitted" => Some(ApplicationStatus::Submitted),
        "pending" => Some(ApplicationStatus::Pending),
        "requires_manual" => Some(ApplicationStatus::RequiresManual),
        "failed" => Some(ApplicationStatus::Failed),
        _ => None,
    }
}
