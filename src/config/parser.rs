use std::collections::HashSet;
use std::path::Path;
use crate::agents::Tier;
use crate::errors::QuorumError;
use crate::prompts::MIN_SOURCE_TOKENS;
use super::types::QuorumConfig;
use super::security::validate_security_patterns;
use super::schema::CONFIG_SCHEMA;
use tracing::warn;

pub async fn parse_config(path: &Path) -> Result<QuorumConfig, QuorumError> {
    if !path.exists() {
        return Err(QuorumError::Config(format!("Config file not found: {}", path.display())));
    }

    let metadata = tokio::fs::metadata(path).await?;
    if metadata.len() > 1_048_576 {
        return Err(QuorumError::Config("Config file exceeds 1MB limit".into()));
    }

    let content = tokio::fs::read_to_string(path).await?;
    parse_config_str(&content)
}

/// Parse and validate YAML config text.
pub fn parse_config_str(content: &str) -> Result<QuorumConfig, QuorumError> {
    let yaml: serde_yaml::Value = serde_yaml::from_str(content)?;
    if yaml.is_null() {
        return Ok(QuorumConfig::default());
    }

    validate_security_patterns(&yaml)?;
    validate_schema(&yaml)?;

    let config: QuorumConfig = serde_yaml::from_value(yaml)?;
    validate_conflicts(&config)?;

    Ok(config)
}

/// Validate config against the JSON schema for structural correctness.
fn validate_schema(yaml: &serde_yaml::Value) -> Result<(), QuorumError> {
    let json_value = serde_json::to_value(yaml)
        .map_err(|e| QuorumError::Config(format!("Config conversion error: {}", e)))?;

    let compiled = jsonschema::JSONSchema::compile(&CONFIG_SCHEMA)
        .map_err(|e| QuorumError::Config(format!("Schema compilation error: {}", e)))?;

    if let Err(errors) = compiled.validate(&json_value) {
        // Advisory: typed deserialization and conflict checks below are authoritative.
        for e in errors {
            warn!(validation_error = %format!("{} at {}", e, e.instance_path), "Config schema warning");
        }
    }

    Ok(())
}

/// Detect semantic conflicts in the parsed configuration.
fn validate_conflicts(config: &QuorumConfig) -> Result<(), QuorumError> {
    if let Some(agents) = &config.agents {
        let mut seen = HashSet::new();
        for agent in agents {
            if !seen.insert(agent.id.as_str()) {
                return Err(QuorumError::Config(format!("Duplicate agent id: {}", agent.id)));
            }
        }
        // Surfaces tiers without analysis agents or without a supervisor.
        config.registry()?;
    }

    for tier in Tier::ALL {
        let policy = config.tier_policy(tier);
        if policy.token_budget < MIN_SOURCE_TOKENS * 2 {
            return Err(QuorumError::Config(format!(
                "tiers.{}.token_budget of {} leaves no room for contract source",
                tier, policy.token_budget
            )));
        }
        if policy.call_timeout.is_zero() || policy.supervisor_timeout.is_zero() {
            return Err(QuorumError::Config(format!("tiers.{} timeouts must be positive", tier)));
        }
        if policy.supervisor_token_budget < policy.token_budget {
            warn!(tier = %tier, "Supervisor token budget is smaller than the agent budget");
        }
    }

    let scoring = config.scoring_policy();
    if scoring.floor > 100 {
        return Err(QuorumError::Config("scoring.floor must be within 0-100".into()));
    }
    let penalties = [scoring.critical_penalty, scoring.high_penalty, scoring.medium_penalty];
    if penalties.iter().any(|p| *p > 100) {
        return Err(QuorumError::Config("scoring penalties must be within 0-100".into()));
    }
    if scoring.critical_penalty < scoring.high_penalty || scoring.high_penalty < scoring.medium_penalty {
        warn!("Scoring penalties are not ordered by severity");
    }

    if let Some(dispatch) = &config.dispatch {
        if dispatch.max_concurrency == Some(0) {
            warn!("dispatch.max_concurrency of 0 treated as 1");
        }
    }

    Ok(())
}
