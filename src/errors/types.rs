use thiserror::Error;

/// Caller mistakes that make an audit impossible to start. These are the only
/// failures `run_audit` reports; everything upstream is absorbed into the report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("contract source is empty")]
    EmptySource,

    #[error("contract name is empty")]
    EmptyContractName,

    #[error("insufficient prompt budget: {available} tokens available for source, at least {required} required")]
    InsufficientBudget { available: usize, required: usize },

    #[error("unknown tier: {0}")]
    UnknownTier(String),

    #[error("invalid contract address: {0}")]
    InvalidAddress(String),
}

#[derive(Debug, Error)]
pub enum QuorumError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("LLM API error: {0}")]
    LLMApi(String),

    #[error("Rate limited: {0}")]
    RateLimit(String),

    #[error("Billing/quota error: {0}")]
    Billing(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Empty response: {0}")]
    EmptyResponse(String),

    #[error("Contract source not verified: {0}")]
    NotVerified(String),

    #[error("Invalid input: {0}")]
    Input(#[from] InputError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Prompt error: {0}")]
    Prompt(String),

    #[error("Persist error: {0}")]
    Persist(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
