use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use crate::errors::QuorumError;
use crate::utils::truncation::truncate_error;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMResponse {
    pub content: String,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    pub model: String,
}

/// Generation settings shared by every provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionOptions {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self { max_tokens: 4096, temperature: 0.1 }
    }
}

/// Map a non-success HTTP status to the error variant the retry layer understands.
pub fn status_error(provider: &str, status: StatusCode, body: &str) -> QuorumError {
    let detail = format!("{} returned {}: {}", provider, status.as_u16(), truncate_error(body.trim()));
    match status.as_u16() {
        401 | 403 => QuorumError::Authentication(detail),
        402 => QuorumError::Billing(detail),
        408 | 504 => QuorumError::Timeout(detail),
        429 => QuorumError::RateLimit(detail),
        500..=599 => QuorumError::Network(detail),
        _ => QuorumError::LLMApi(detail),
    }
}

/// Pull the assistant text out of an OpenAI-style chat completion envelope.
pub fn chat_completion_content(provider: &str, data: &Value) -> Result<String, QuorumError> {
    if let Some(error) = data.get("error") {
        let msg = error["message"].as_str().unwrap_or("Unknown error");
        if msg.contains("billing") || msg.contains("quota") || msg.contains("credits") {
            return Err(QuorumError::Billing(msg.to_string()));
        }
        if msg.contains("rate limit") || msg.contains("Rate limit") {
            return Err(QuorumError::RateLimit(msg.to_string()));
        }
        return Err(QuorumError::LLMApi(format!("{}: {}", provider, msg)));
    }

    let content = data["choices"][0]["message"]["content"]
        .as_str()
        .ok_or_else(|| QuorumError::LLMApi(format!("No content in {} response", provider)))?;
    if content.trim().is_empty() {
        return Err(QuorumError::EmptyResponse(format!("{} returned an empty completion", provider)));
    }
    Ok(content.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_error_mapping() {
        assert!(matches!(status_error("x", StatusCode::TOO_MANY_REQUESTS, ""), QuorumError::RateLimit(_)));
        assert!(matches!(status_error("x", StatusCode::UNAUTHORIZED, ""), QuorumError::Authentication(_)));
        assert!(matches!(status_error("x", StatusCode::BAD_GATEWAY, ""), QuorumError::Network(_)));
        assert!(matches!(status_error("x", StatusCode::BAD_REQUEST, "bad"), QuorumError::LLMApi(_)));
    }

    #[test]
    fn test_chat_completion_content() {
        let ok = json!({"choices": [{"message": {"content": "{\"findings\": []}"}}]});
        assert_eq!(chat_completion_content("x", &ok).unwrap(), "{\"findings\": []}");

        let empty = json!({"choices": [{"message": {"content": "  "}}]});
        assert!(matches!(chat_completion_content("x", &empty), Err(QuorumError::EmptyResponse(_))));

        let missing = json!({"choices": []});
        assert!(matches!(chat_completion_content("x", &missing), Err(QuorumError::LLMApi(_))));

        let quota = json!({"error": {"message": "insufficient credits"}});
        assert!(matches!(chat_completion_content("x", &quota), Err(QuorumError::Billing(_))));
    }
}
