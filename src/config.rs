use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::agent::OrchestratorConfig;
use crate::decision::DecisionConfig;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub autonomy: AutonomyConfig,

    #[serde(default)]
    pub bus: BusConfig,

    #[serde(default)]
    pub sessions: SessionConfig,
}

/// Auto-apply thresholds and the trusted-platform allow-list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutonomyConfig {
    pub min_match_score: f64,
    pub max_per_day: usize,
    pub trusted_platforms: Vec<String>,
    pub review_threshold: f64,
}

impl Default for AutonomyConfig {
    fn default() -> Self {
        Self {
            min_match_score: 90.0,
            max_per_day: 10,
            trusted_platforms: vec![
                "linkedin".to_string(),
                "greenhouse".to_string(),
                "lever".to_string(),
                "workday".to_string(),
            ],
            review_threshold: 75.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    pub send_timeout_secs: u64,
    pub batch_delay_ms: u64,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            send_timeout_secs: 30,
            batch_delay_ms: 250,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub max_age_hours: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { max_age_hours: 24 }
    }
}

impl Config {
    /// Load configuration from file, creating default if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            let config = Config::default();
            config.save()?;
            return Ok(config);
        }

        let contents =
            fs::read_to_string(&config_path).context("Failed to read config file")?;

        let config: Config =
            toml::from_str(&contents).context("Failed to parse config file")?;

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let toml_string = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&config_path, toml_string).context("Failed to write config file")?;

        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;

        Ok(home.join(".jobpilot").join("config.toml"))
    }

    pub fn decision_config(&self) -> DecisionConfig {
        DecisionConfig {
            min_auto_apply_score: self.autonomy.min_match_score,
            max_applications_per_day: self.autonomy.max_per_day,
            trusted_platforms: self
                .autonomy
                .trusted_platforms
                .iter()
                .cloned()
                .collect::<HashSet<String>>(),
            review_threshold: self.autonomy.review_threshold,
        }
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            send_timeout: Duration::from_secs(self.bus.send_timeout_secs),
            batch_delay: Duration::from_millis(self.bus.batch_delay_ms),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.autonomy.min_match_score, 90.0);
        assert_eq!(config.autonomy.max_per_day, 10);
        assert_eq!(config.autonomy.trusted_platforms.len(), 4);
        assert_eq!(config.bus.send_timeout_secs, 30);
        assert_eq!(config.sessions.max_age_hours, 24);
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();

        let toml_string = toml::to_string(&config).unwrap();
        assert!(toml_string.contains("linkedin"));

        let deserialized: Config = toml::from_str(&toml_string).unwrap();
        assert_eq!(deserialized.autonomy.max_per_day, 10);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [autonomy]
            min_match_score = 85.0
            max_per_day = 5
            trusted_platforms = ["linkedin"]
            review_threshold = 70.0
            "#,
        )
        .unwrap();

        assert_eq!(config.autonomy.max_per_day, 5);
        assert_eq!(config.bus.send_timeout_secs, 30);
    }

    #[test]
    fn test_decision_config_conversion() {
        let config = Config::default();
        let decision = config.decision_config();
        assert!(decision.trusted_platforms.contains("lever"));
        assert_eq!(decision.max_applications_per_day, 10);
    }
}
