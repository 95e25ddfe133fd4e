//! jobpilot - agent orchestration core for job-search-and-apply workflows.
//!
//! Coordinates independent worker agents (scout, matcher, writer,
//! application, tracker) that cooperate on a multi-stage pipeline:
//! search, extract, score, write, apply, track.
//!
//! # Architecture
//!
//! - **bus**: point-to-point and broadcast messaging with response
//!   correlation, timeouts, and a bounded audit history
//! - **state**: per-user pipeline phase, context, expiring pending actions
//! - **decision**: auto-apply/review/priority verdicts and rate limiting
//! - **agent**: the orchestrator driving the named pipelines
//!
//! All state is in-process memory; the graph store, LLM clients, and job
//! APIs are external collaborators behind narrow traits.

pub mod errors;
pub mod types;
pub mod bus;
pub mod state;
pub mod decision;
pub mod store;
pub mod agent;
pub mod config;

// Re-export commonly used types
pub use errors::{AgentError, Result};

pub use agent::{Intent, Orchestrator, OrchestratorConfig, UserResponse};
pub use bus::{AgentHandler, CommunicationBus, Message, MessageBody, MessageType, Response};
pub use decision::{DecisionConfig, DecisionEngine, Verdict};
pub use state::{ConversationState, PendingAction, PipelinePhase};
pub use store::{InMemoryJobStore, JobStore};
pub use types::{Application, ApplicationStatus, Job, UserPreferences};
