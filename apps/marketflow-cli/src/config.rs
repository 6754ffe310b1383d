//! CLI configuration: a single YAML file with defaults and validation.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Top-level configuration schema.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MarketflowConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Environment variable holding the API key; never the key itself.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key_env: default_api_key_env(),
            model: default_model(),
            temperature: default_temperature(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

fn default_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_api_key_env() -> String {
    "MARKETFLOW_API_KEY".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f32 {
    0.2
}

fn default_llm_timeout() -> u64 {
    60
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Wall-clock cap on one interpretation, in seconds.
    #[serde(default = "default_interpretation_cap")]
    pub interpretation_cap_secs: u64,
    #[serde(default = "default_true")]
    pub relevance_gate: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            interpretation_cap_secs: default_interpretation_cap(),
            relevance_gate: true,
        }
    }
}

fn default_interpretation_cap() -> u64 {
    600
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Load configuration from a YAML file; a missing file yields defaults.
pub fn load_config(path: &Path) -> Result<MarketflowConfig, ConfigError> {
    if !path.exists() {
        return Ok(MarketflowConfig::default());
    }
    let content = fs::read_to_string(path)?;
    let config: MarketflowConfig = serde_yaml::from_str(&content)?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &MarketflowConfig) -> Result<(), ConfigError> {
    if config.llm.endpoint.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "llm.endpoint must not be empty".to_string(),
        ));
    }
    if config.llm.model.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "llm.model must not be empty".to_string(),
        ));
    }
    if config.engine.interpretation_cap_secs == 0 {
        return Err(ConfigError::Invalid(
            "engine.interpretation_cap_secs must be > 0".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(validate_config(&MarketflowConfig::default()).is_ok());
    }

    #[test]
    fn test_zero_cap_is_rejected() {
        let config: MarketflowConfig =
            serde_yaml::from_str("engine:\n  interpretation_cap_secs: 0\n").unwrap();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_partial_files_fill_in_defaults() {
        let config: MarketflowConfig =
            serde_yaml::from_str("llm:\n  model: gpt-4o\n").unwrap();
        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.engine.interpretation_cap_secs, 600);
    }
}
