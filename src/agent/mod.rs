//! Orchestration layer: intent classification and pipeline coordination.

pub mod intent;
pub mod orchestrator;

pub use intent::Intent;
pub use orchestrator::{
    ApplySummary, Orchestrator, OrchestratorConfig, UserResponse, APPLICATION_AGENT,
    MATCHER_AGENT, MAX_APPLY_BATCH, ORCHESTRATOR_NAME, SCOUT_AGENT,
};
