//! Per-user pipeline state tracking.
//!
//! Holds conversation context, the current pipeline phase, at most one
//! pending action with expiry, and a bounded rolling message history.
//! All state is in-process memory; nothing survives a restart.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::bus::JsonMap;

/// Context key used by the job-selection convenience wrappers
pub const SELECTED_JOBS_KEY: &str = "selected_jobs";

/// Maximum retained conversation history entries per user
pub const MAX_HISTORY_MESSAGES: usize = 100;

/// Default pending-action lifetime
pub const DEFAULT_ACTION_TTL_SECS: i64 = 3600;

/// Default inactivity window before session cleanup
pub const DEFAULT_SESSION_MAX_AGE_HOURS: i64 = 24;

/// Coarse stage of a user's current multi-step workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelinePhase {
    Idle,
    Searching,
    Matching,
    GeneratingDocs,
    Applying,
    AwaitingApproval,
    AwaitingReview,
    Completed,
    Error,
}

impl PipelinePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelinePhase::Idle => "idle",
            PipelinePhase::Searching => "searching",
            PipelinePhase::Matching => "matching",
            PipelinePhase::GeneratingDocs => "generating_docs",
            PipelinePhase::Applying => "applying",
            PipelinePhase::AwaitingApproval => "awaiting_approval",
            PipelinePhase::AwaitingReview => "awaiting_review",
            PipelinePhase::Completed => "completed",
            PipelinePhase::Error => "error",
        }
    }

    /// Only Idle and Completed may start a new pipeline cycle
    pub fn can_restart(&self) -> bool {
        matches!(self, PipelinePhase::Idle | PipelinePhase::Completed)
    }
}

impl Default for PipelinePhase {
    fn default() -> Self {
        PipelinePhase::Idle
    }
}

/// A stored, time-boxed action awaiting explicit human confirmation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingAction {
    pub action_type: String,
    pub action_data: Value,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl PendingAction {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| now > at)
    }
}

/// One conversation turn in a user's rolling history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub message: String,
    pub role: String,
    pub timestamp: DateTime<Utc>,
    pub metadata: JsonMap,
}

/// Session bookkeeping used by expiry cleanup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub message_count: u64,
}

#[derive(Default)]
struct Inner {
    contexts: HashMap<String, HashMap<String, Value>>,
    pending: HashMap<String, PendingAction>,
    phases: HashMap<String, PipelinePhase>,
    sessions: HashMap<String, SessionInfo>,
    histories: HashMap<String, VecDeque<HistoryEntry>>,
}

/// Manage conversation context and pending actions across users.
///
/// Interior locking keeps the tracker shareable across concurrent user
/// tasks; each operation touches one user's state, so no multi-key
/// atomicity is needed.
pub struct ConversationState {
    inner: Mutex<Inner>,
}

impl ConversationState {
    pub fn new() -> Self {
        info!("conversation state tracker initialized");
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Create a new session for a user, resetting any prior state.
    /// The returned session id embeds a timestamp for traceability only.
    pub fn create_session(&self, user_id: &str) -> String {
        let now = Utc::now();
        let session_id = format!("{}_{}", user_id, now.format("%Y%m%d_%H%M%S"));

        let mut inner = self.inner.lock().expect("state lock poisoned");
        inner.contexts.insert(user_id.to_string(), HashMap::new());
        inner.pending.remove(user_id);
        inner.phases.insert(user_id.to_string(), PipelinePhase::Idle);
        inner.sessions.insert(
            user_id.to_string(),
            SessionInfo {
                session_id: session_id.clone(),
                user_id: user_id.to_string(),
                created_at: now,
                last_activity: now,
                message_count: 0,
            },
        );

        info!(user = %user_id, session = %session_id, "created session");
        session_id
    }

    pub fn save_context(&self, user_id: &str, key: &str, value: Value) {
        let mut inner = self.inner.lock().expect("state lock poisoned");
        inner
            .contexts
            .entry(user_id.to_string())
            .or_default()
            .insert(key.to_string(), value);
        debug!(user = %user_id, key = %key, "saved context");
    }

    pub fn get_context(&self, user_id: &str, key: &str) -> Option<Value> {
        let inner = self.inner.lock().expect("state lock poisoned");
        inner.contexts.get(user_id).and_then(|ctx| ctx.get(key)).cloned()
    }

    pub fn get_all_context(&self, user_id: &str) -> HashMap<String, Value> {
        let inner = self.inner.lock().expect("state lock poisoned");
        inner.contexts.get(user_id).cloned().unwrap_or_default()
    }

    /// Clear one context key, or the whole map when `key` is None
    pub fn clear_context(&self, user_id: &str, key: Option<&str>) {
        let mut inner = self.inner.lock().expect("state lock poisoned");
        match key {
            Some(k) => {
                if let Some(ctx) = inner.contexts.get_mut(user_id) {
                    ctx.remove(k);
                    debug!(user = %user_id, key = %k, "cleared context key");
                }
            }
            None => {
                if let Some(ctx) = inner.contexts.get_mut(user_id) {
                    ctx.clear();
                    info!(user = %user_id, "cleared all context");
                }
            }
        }
    }

    /// Store an action awaiting user confirmation.
    /// At most one per user; a new action overwrites the old.
    pub fn set_pending_action(
        &self,
        user_id: &str,
        action_type: &str,
        action_data: Value,
        expires_in: Option<Duration>,
    ) {
        let now = Utc::now();
        let ttl = expires_in.unwrap_or_else(|| Duration::seconds(DEFAULT_ACTION_TTL_SECS));
        let action = PendingAction {
            action_type: action_type.to_string(),
            action_data,
            created_at: now,
            expires_at: Some(now + ttl),
        };

        let mut inner = self.inner.lock().expect("state lock poisoned");
        inner.pending.insert(user_id.to_string(), action);
        info!(user = %user_id, action = %action_type, "set pending action");
    }

    /// Current pending action, lazily evicting it once expired
    pub fn get_pending_action(&self, user_id: &str) -> Option<PendingAction> {
        let mut inner = self.inner.lock().expect("state lock poisoned");
        let expired = inner
            .pending
            .get(user_id)
            .is_some_and(|a| a.is_expired(Utc::now()));

        if expired {
            inner.pending.remove(user_id);
            info!(user = %user_id, "pending action expired");
            return None;
        }

        inner.pending.get(user_id).cloned()
    }

    pub fn clear_pending_action(&self, user_id: &str) {
        let mut inner = self.inner.lock().expect("state lock poisoned");
        if inner.pending.remove(user_id).is_some() {
            info!(user = %user_id, "cleared pending action");
        }
    }

    pub fn set_phase(&self, user_id: &str, phase: PipelinePhase) {
        let mut inner = self.inner.lock().expect("state lock poisoned");
        inner.phases.insert(user_id.to_string(), phase);
        info!(user = %user_id, phase = phase.as_str(), "set pipeline phase");
    }

    /// Current phase; unknown users are simply Idle
    pub fn get_phase(&self, user_id: &str) -> PipelinePhase {
        let inner = self.inner.lock().expect("state lock poisoned");
        inner.phases.get(user_id).copied().unwrap_or_default()
    }

    /// Append a conversation turn, trimming to the last 100 entries
    pub fn add_history(&self, user_id: &str, message: &str, role: &str, metadata: Option<JsonMap>) {
        let entry = HistoryEntry {
            message: message.to_string(),
            role: role.to_string(),
            timestamp: Utc::now(),
            metadata: metadata.unwrap_or_default(),
        };

        let mut inner = self.inner.lock().expect("state lock poisoned");
        let history = inner.histories.entry(user_id.to_string()).or_default();
        history.push_back(entry);
        while history.len() > MAX_HISTORY_MESSAGES {
            history.pop_front();
        }
    }

    /// Most recent `limit` turns in chronological order
    pub fn get_history(&self, user_id: &str, limit: usize) -> Vec<HistoryEntry> {
        let inner = self.inner.lock().expect("state lock poisoned");
        let history = match inner.histories.get(user_id) {
            Some(h) => h,
            None => return Vec::new(),
        };
        let skip = history.len().saturating_sub(limit);
        history.iter().skip(skip).cloned().collect()
    }

    pub fn save_job_selection(&self, user_id: &str, job_ids: Vec<String>) {
        let count = job_ids.len();
        self.save_context(user_id, SELECTED_JOBS_KEY, serde_json::json!(job_ids));
        self.save_context(
            user_id,
            "selection_time",
            serde_json::json!(Utc::now().to_rfc3339()),
        );
        info!(user = %user_id, count, "saved job selection");
    }

    pub fn get_job_selection(&self, user_id: &str) -> Vec<String> {
        self.get_context(user_id, SELECTED_JOBS_KEY)
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default()
    }

    pub fn save_search_criteria(&self, user_id: &str, criteria: Value) {
        self.save_context(user_id, "search_criteria", criteria);
        info!(user = %user_id, "saved search criteria");
    }

    pub fn get_search_criteria(&self, user_id: &str) -> Option<Value> {
        self.get_context(user_id, "search_criteria")
    }

    /// Bump the session message counter, creating the session on first touch
    pub fn increment_message_count(&self, user_id: &str) {
        {
            let mut inner = self.inner.lock().expect("state lock poisoned");
            if let Some(session) = inner.sessions.get_mut(user_id) {
                session.message_count += 1;
                session.last_activity = Utc::now();
                return;
            }
        }
        self.create_session(user_id);
    }

    pub fn session_info(&self, user_id: &str) -> Option<SessionInfo> {
        let inner = self.inner.lock().expect("state lock poisoned");
        inner.sessions.get(user_id).cloned()
    }

    /// Batch sweep discarding context, pending action, and phase for users
    /// inactive beyond the age threshold. Callers invoke this periodically;
    /// reads do not trigger it. Returns the number of sessions removed.
    pub fn cleanup_expired_sessions(&self, max_age_hours: i64) -> usize {
        let now = Utc::now();
        let mut inner = self.inner.lock().expect("state lock poisoned");

        let expired: Vec<String> = inner
            .sessions
            .iter()
            .filter(|(_, s)| now - s.last_activity > Duration::hours(max_age_hours))
            .map(|(user, _)| user.clone())
            .collect();

        for user in &expired {
            inner.sessions.remove(user);
            inner.contexts.remove(user);
            inner.pending.remove(user);
            inner.phases.remove(user);
        }

        if !expired.is_empty() {
            info!(count = expired.len(), "cleaned up expired sessions");
        }
        expired.len()
    }
}

impl Default for ConversationState {
    fn default() -> Self {
        Self::new()
    }
}
