use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use crate::errors::QuorumError;
use super::provider::LLMProvider;
use super::types::{status_error, CompletionOptions, LLMResponse};
use tracing::debug;

pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    options: CompletionOptions,
}

impl AnthropicProvider {
    pub fn new(api_key: &str, model: Option<&str>, base_url: Option<&str>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            model: model.unwrap_or("claude-sonnet-4-5-20250929").to_string(),
            base_url: base_url.unwrap_or("https://api.anthropic.com").trim_end_matches('/').to_string(),
            options: CompletionOptions::default(),
        }
    }
}

#[async_trait]
impl LLMProvider for AnthropicProvider {
    async fn complete(&self, prompt: &str, system: Option<&str>) -> Result<LLMResponse, QuorumError> {
        let mut body = json!({
            "model": self.model,
            "max_tokens": self.options.max_tokens,
            "temperature": self.options.temperature,
            "messages": [{"role": "user", "content": prompt}]
        });

        if let Some(sys) = system {
            body["system"] = json!(sys);
        }

        let resp = self.client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| QuorumError::Network(format!("Anthropic API request failed: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            if text.contains("credit balance") || text.contains("billing") {
                return Err(QuorumError::Billing(format!("Anthropic: {}", text.trim())));
            }
            return Err(status_error("Anthropic", status, &text));
        }

        let data: Value = resp.json().await
            .map_err(|e| QuorumError::LLMApi(format!("Failed to parse Anthropic response: {}", e)))?;

        if let Some(error) = data.get("error") {
            let msg = error["message"].as_str().unwrap_or("Unknown error");
            return Err(QuorumError::LLMApi(msg.to_string()));
        }

        // Concatenate every text block; tool or thinking blocks carry no answer.
        let content: String = data["content"]
            .as_array()
            .map(|blocks| {
                blocks.iter()
                    .filter(|b| b["type"] == "text")
                    .filter_map(|b| b["text"].as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .ok_or_else(|| QuorumError::LLMApi("No content in Anthropic response".into()))?;
        if content.trim().is_empty() {
            return Err(QuorumError::EmptyResponse("Anthropic returned no text".into()));
        }

        let input_tokens = data["usage"]["input_tokens"].as_u64();
        let output_tokens = data["usage"]["output_tokens"].as_u64();

        debug!(model = %self.model, input_tokens, output_tokens, "Anthropic completion");

        Ok(LLMResponse {
            content,
            input_tokens,
            output_tokens,
            model: self.model.clone(),
        })
    }

    fn provider_name(&self) -> &str { "anthropic" }
    fn model_name(&self) -> &str { &self.model }
}
