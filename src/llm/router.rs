use std::sync::Arc;

use crate::errors::QuorumError;
use super::provider::LLMProvider;
use super::anthropic::AnthropicProvider;
use super::openai::OpenAIProvider;
use super::openrouter::OpenRouterProvider;
use super::catalog::{self, Backend};

pub fn create_provider(
    provider_name: &str,
    api_key: &str,
    model: Option<&str>,
    base_url: Option<&str>,
) -> Result<Arc<dyn LLMProvider>, QuorumError> {
    let info = catalog::get_provider(provider_name)
        .ok_or_else(|| QuorumError::Config(format!("Unknown LLM provider: {}", provider_name)))?;

    if api_key.is_empty() && info.backend != Backend::OpenAICompatible {
        return Err(QuorumError::Authentication(format!(
            "No API key for {}; set {} or llm.api_key in the config",
            info.name, info.env_var
        )));
    }

    match info.backend {
        Backend::Anthropic => Ok(Arc::new(AnthropicProvider::new(api_key, model, base_url))),
        Backend::OpenAI => Ok(Arc::new(match base_url {
            Some(url) => OpenAIProvider::with_base_url(api_key, model, url),
            None => OpenAIProvider::new(api_key, model),
        })),
        Backend::OpenRouter => Ok(Arc::new(OpenRouterProvider::new(api_key, model, base_url))),
        Backend::OpenAICompatible => {
            // Explicit base_url override wins over the catalog default.
            let url = base_url
                .or(info.base_url)
                .unwrap_or("https://api.openai.com/v1");
            Ok(Arc::new(OpenAIProvider::with_base_url(api_key, model, url)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_provider_rejected() {
        assert!(matches!(create_provider("nope", "k", None, None), Err(QuorumError::Config(_))));
    }

    #[test]
    fn test_missing_key_rejected_for_hosted_provider() {
        assert!(matches!(
            create_provider("openrouter", "", None, None),
            Err(QuorumError::Authentication(_))
        ));
    }

    #[test]
    fn test_local_needs_no_key() {
        let provider = create_provider("local", "", Some("qwen2.5-coder:7b"), None).unwrap();
        assert_eq!(provider.provider_name(), "openai");
        assert_eq!(provider.model_name(), "qwen2.5-coder:7b");
    }
}
