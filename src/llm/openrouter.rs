use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use crate::errors::QuorumError;
use super::provider::LLMProvider;
use super::types::{chat_completion_content, status_error, CompletionOptions, LLMResponse};

const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1";

pub struct OpenRouterProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    options: CompletionOptions,
}

impl OpenRouterProvider {
    pub fn new(api_key: &str, model: Option<&str>, base_url: Option<&str>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            model: model.unwrap_or("deepseek/deepseek-chat-v3-0324:free").to_string(),
            base_url: base_url.unwrap_or(OPENROUTER_URL).trim_end_matches('/').to_string(),
            options: CompletionOptions::default(),
        }
    }
}

#[async_trait]
impl LLMProvider for OpenRouterProvider {
    async fn complete(&self, prompt: &str, system: Option<&str>) -> Result<LLMResponse, QuorumError> {
        let mut messages = Vec::new();
        if let Some(sys) = system {
            messages.push(json!({"role": "system", "content": sys}));
        }
        messages.push(json!({"role": "user", "content": prompt}));

        let body = json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": self.options.max_tokens,
            "temperature": self.options.temperature,
        });

        let resp = self.client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("X-Title", "quorum")
            .json(&body)
            .send()
            .await
            .map_err(|e| QuorumError::Network(format!("OpenRouter request failed: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(status_error("OpenRouter", status, &text));
        }

        let data: Value = resp.json().await
            .map_err(|e| QuorumError::LLMApi(format!("Parse error: {}", e)))?;

        let content = chat_completion_content("OpenRouter", &data)?;
        let input_tokens = data["usage"]["prompt_tokens"].as_u64();
        let output_tokens = data["usage"]["completion_tokens"].as_u64();

        Ok(LLMResponse { content, input_tokens, output_tokens, model: self.model.clone() })
    }

    fn provider_name(&self) -> &str { "openrouter" }
    fn model_name(&self) -> &str { &self.model }
}
