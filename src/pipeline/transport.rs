use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use crate::agents::AgentSpec;
use crate::config::credentials::redact_credentials;
use crate::config::LLMConfig;
use crate::errors::QuorumError;
use crate::llm::{create_provider, LLMProvider};
use tracing::debug;

/// Carries one prompt to one agent's model and returns the raw reply text.
#[async_trait]
pub trait AnalysisTransport: Send + Sync {
    async fn call(&self, agent: &AgentSpec, prompt: &str, system: &str) -> Result<String, QuorumError>;
}

/// Transport backed by the hosted chat APIs in [`crate::llm`].
///
/// Providers are built once per agent up front. An agent whose provider could
/// not be built (missing key, unknown provider) fails at call time, so one
/// misconfigured agent never blocks the others.
pub struct ProviderTransport {
    providers: HashMap<String, Result<Arc<dyn LLMProvider>, QuorumError>>,
    secrets: Vec<String>,
}

impl ProviderTransport {
    pub fn new<'a>(llm: &LLMConfig, agents: impl IntoIterator<Item = &'a AgentSpec>) -> Self {
        let mut providers = HashMap::new();
        let mut secrets = Vec::new();
        for agent in agents {
            let key = llm.api_key_for(&agent.provider);
            if !key.is_empty() && !secrets.contains(&key) {
                secrets.push(key.clone());
            }
            let provider = create_provider(
                &agent.provider,
                &key,
                Some(&agent.model),
                llm.base_url_for(&agent.provider),
            );
            providers.insert(agent.id.clone(), provider);
        }
        Self { providers, secrets }
    }

    fn redact(&self, err: QuorumError) -> QuorumError {
        let secrets: Vec<&str> = self.secrets.iter().map(String::as_str).collect();
        let scrub = |msg: String| redact_credentials(&msg, &secrets);
        match err {
            QuorumError::LLMApi(m) => QuorumError::LLMApi(scrub(m)),
            QuorumError::Authentication(m) => QuorumError::Authentication(scrub(m)),
            QuorumError::Network(m) => QuorumError::Network(scrub(m)),
            QuorumError::RateLimit(m) => QuorumError::RateLimit(scrub(m)),
            QuorumError::Billing(m) => QuorumError::Billing(scrub(m)),
            QuorumError::Timeout(m) => QuorumError::Timeout(scrub(m)),
            other => other,
        }
    }
}

/// Rebuilds a construction error for each call, keeping its classification.
fn replay(err: &QuorumError) -> QuorumError {
    match err {
        QuorumError::Authentication(m) => QuorumError::Authentication(m.clone()),
        QuorumError::Config(m) => QuorumError::Config(m.clone()),
        other => QuorumError::Internal(other.to_string()),
    }
}

#[async_trait]
impl AnalysisTransport for ProviderTransport {
    async fn call(&self, agent: &AgentSpec, prompt: &str, system: &str) -> Result<String, QuorumError> {
        let provider = match self.providers.get(&agent.id) {
            Some(Ok(provider)) => provider.clone(),
            Some(Err(e)) => return Err(replay(e)),
            None => {
                return Err(QuorumError::Config(format!("No provider configured for agent {}", agent.id)));
            }
        };

        let response = provider
            .complete(prompt, Some(system))
            .await
            .map_err(|e| self.redact(e))?;

        debug!(
            agent = %agent.id,
            model = %response.model,
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            "Agent reply received"
        );
        Ok(response.content)
    }
}
