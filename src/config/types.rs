use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use crate::agents::{AgentRegistry, AgentSpec, Tier, TierPolicy};
use crate::consensus::ScoringPolicy;
use crate::errors::{QuorumError, RetryConfig};
use crate::models::PromptVariant;
use crate::pipeline::dispatcher::DispatchSettings;
use super::credentials::resolve_credential;

/// Default global bound on concurrent agent calls.
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct QuorumConfig {
    pub llm: Option<LLMConfig>,
    pub tiers: Option<TiersConfig>,
    pub dispatch: Option<DispatchConfig>,
    pub scoring: Option<ScoringConfig>,
    pub agents: Option<Vec<AgentSpec>>,
    pub explorer: Option<ExplorerConfig>,
    pub prompts: Option<PromptsConfig>,
    pub output: Option<OutputConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct LLMConfig {
    /// Provider the top-level `api_key` and `base_url` apply to. Defaults to openrouter.
    pub provider: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    /// Keys for other providers, by provider id. `$VAR` values resolve from the environment.
    pub provider_keys: Option<HashMap<String, String>>,
}

impl LLMConfig {
    pub fn default_provider(&self) -> &str {
        self.provider.as_deref().unwrap_or("openrouter")
    }

    /// API key for a provider: explicit per-provider key, then the top-level key
    /// when the provider is the default one, then the catalog's environment variable.
    pub fn api_key_for(&self, provider: &str) -> String {
        if let Some(key) = self.provider_keys.as_ref().and_then(|m| m.get(provider)) {
            return resolve_credential(key);
        }
        if provider == self.default_provider() {
            if let Some(key) = &self.api_key {
                return resolve_credential(key);
            }
        }
        crate::llm::catalog::env_var_for(provider)
            .and_then(|var| std::env::var(var).ok())
            .unwrap_or_default()
    }

    pub fn base_url_for(&self, provider: &str) -> Option<&str> {
        if provider == self.default_provider() {
            self.base_url.as_deref()
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct TiersConfig {
    pub free: Option<TierOverrides>,
    pub premium: Option<TierOverrides>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct TierOverrides {
    pub token_budget: Option<usize>,
    pub supervisor_token_budget: Option<usize>,
    pub call_timeout_secs: Option<u64>,
    pub supervisor_timeout_secs: Option<u64>,
    pub analysis_depth: Option<String>,
    pub prompt_variant: Option<PromptVariant>,
}

impl TierOverrides {
    fn apply(&self, mut policy: TierPolicy) -> TierPolicy {
        if let Some(v) = self.token_budget { policy.token_budget = v; }
        if let Some(v) = self.supervisor_token_budget { policy.supervisor_token_budget = v; }
        if let Some(v) = self.call_timeout_secs { policy.call_timeout = Duration::from_secs(v); }
        if let Some(v) = self.supervisor_timeout_secs { policy.supervisor_timeout = Duration::from_secs(v); }
        if let Some(v) = &self.analysis_depth { policy.analysis_depth = v.clone(); }
        if let Some(v) = self.prompt_variant { policy.prompt_variant = v; }
        policy
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct DispatchConfig {
    pub max_concurrency: Option<usize>,
    pub max_retries: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ScoringConfig {
    pub critical_penalty: Option<u8>,
    pub high_penalty: Option<u8>,
    pub medium_penalty: Option<u8>,
    pub floor: Option<u8>,
}

/// Etherscan-compatible block explorer used by `audit --address`.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ExplorerConfig {
    pub api_key: Option<String>,
    /// Per-network API base URLs, overriding the built-in ones.
    pub networks: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct PromptsConfig {
    pub directory: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct OutputConfig {
    pub directory: Option<String>,
    pub format: Option<String>,
}

impl QuorumConfig {
    pub fn llm(&self) -> LLMConfig {
        self.llm.clone().unwrap_or_default()
    }

    pub fn tier_policy(&self, tier: Tier) -> TierPolicy {
        let base = TierPolicy::defaults_for(tier);
        let overrides = self.tiers.as_ref().and_then(|t| match tier {
            Tier::Free => t.free.as_ref(),
            Tier::Premium => t.premium.as_ref(),
        });
        match overrides {
            Some(o) => o.apply(base),
            None => base,
        }
    }

    pub fn scoring_policy(&self) -> ScoringPolicy {
        let defaults = ScoringPolicy::default();
        match &self.scoring {
            Some(s) => ScoringPolicy {
                critical_penalty: s.critical_penalty.unwrap_or(defaults.critical_penalty),
                high_penalty: s.high_penalty.unwrap_or(defaults.high_penalty),
                medium_penalty: s.medium_penalty.unwrap_or(defaults.medium_penalty),
                floor: s.floor.unwrap_or(defaults.floor),
            },
            None => defaults,
        }
    }

    pub fn dispatch_settings(&self) -> DispatchSettings {
        let dispatch = self.dispatch.clone().unwrap_or_default();
        DispatchSettings {
            max_concurrency: dispatch.max_concurrency.unwrap_or(DEFAULT_MAX_CONCURRENCY).max(1),
            retry: RetryConfig {
                max_retries: dispatch.max_retries.unwrap_or(RetryConfig::default().max_retries),
            },
        }
    }

    pub fn registry(&self) -> Result<AgentRegistry, QuorumError> {
        AgentRegistry::with_overrides(self.agents.clone().unwrap_or_default())
    }

    pub fn prompts_dir(&self) -> PathBuf {
        self.prompts
            .as_ref()
            .and_then(|p| p.directory.as_ref())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("prompts"))
    }

    pub fn output_dir(&self) -> PathBuf {
        self.output
            .as_ref()
            .and_then(|o| o.directory.as_ref())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("audits"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = QuorumConfig::default();
        assert_eq!(config.tier_policy(Tier::Free), TierPolicy::defaults_for(Tier::Free));
        assert_eq!(config.scoring_policy(), ScoringPolicy::default());
        assert_eq!(config.dispatch_settings().max_concurrency, DEFAULT_MAX_CONCURRENCY);
        assert_eq!(config.output_dir(), PathBuf::from("audits"));
    }

    #[test]
    fn test_tier_overrides_apply() {
        let config: QuorumConfig = serde_yaml::from_str(
            "tiers:\n  premium:\n    token_budget: 30000\n    call_timeout_secs: 45\n    prompt_variant: security_focused\n",
        )
        .unwrap();
        let policy = config.tier_policy(Tier::Premium);
        assert_eq!(policy.token_budget, 30_000);
        assert_eq!(policy.call_timeout, Duration::from_secs(45));
        assert_eq!(policy.prompt_variant, PromptVariant::SecurityFocused);
        assert_eq!(policy.analysis_depth, "deep");
        assert_eq!(config.tier_policy(Tier::Free), TierPolicy::defaults_for(Tier::Free));
    }

    #[test]
    fn test_scoring_overrides_partial() {
        let config: QuorumConfig = serde_yaml::from_str("scoring:\n  critical_penalty: 40\n").unwrap();
        let policy = config.scoring_policy();
        assert_eq!(policy.critical_penalty, 40);
        assert_eq!(policy.high_penalty, ScoringPolicy::default().high_penalty);
    }

    #[test]
    fn test_api_key_resolution_order() {
        std::env::set_var("TEST_QUORUM_ANTHROPIC_KEY", "sk-ant-test");
        let llm = LLMConfig {
            provider: Some("openrouter".into()),
            api_key: Some("sk-or-literal".into()),
            base_url: None,
            provider_keys: Some(HashMap::from([(
                "anthropic".to_string(),
                "$TEST_QUORUM_ANTHROPIC_KEY".to_string(),
            )])),
        };
        assert_eq!(llm.api_key_for("openrouter"), "sk-or-literal");
        assert_eq!(llm.api_key_for("anthropic"), "sk-ant-test");
        std::env::remove_var("TEST_QUORUM_ANTHROPIC_KEY");
    }

    #[test]
    fn test_zero_concurrency_clamped() {
        let config: QuorumConfig = serde_yaml::from_str("dispatch:\n  max_concurrency: 0\n").unwrap();
        assert_eq!(config.dispatch_settings().max_concurrency, 1);
    }
}
