/// Wire protocol a provider speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    OpenRouter,
    OpenAI,
    Anthropic,
    OpenAICompatible,
}

pub struct ProviderInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub env_var: &'static str,
    pub backend: Backend,
    pub base_url: Option<&'static str>,
}

pub static PROVIDERS: &[ProviderInfo] = &[
    ProviderInfo {
        id: "openrouter",
        name: "OpenRouter",
        env_var: "OPENROUTER_API_KEY",
        backend: Backend::OpenRouter,
        base_url: None,
    },
    ProviderInfo {
        id: "openai",
        name: "OpenAI",
        env_var: "OPENAI_API_KEY",
        backend: Backend::OpenAI,
        base_url: None,
    },
    ProviderInfo {
        id: "anthropic",
        name: "Anthropic",
        env_var: "ANTHROPIC_API_KEY",
        backend: Backend::Anthropic,
        base_url: None,
    },
    ProviderInfo {
        id: "deepseek",
        name: "DeepSeek",
        env_var: "DEEPSEEK_API_KEY",
        backend: Backend::OpenAICompatible,
        base_url: Some("https://api.deepseek.com/v1"),
    },
    ProviderInfo {
        id: "groq",
        name: "Groq",
        env_var: "GROQ_API_KEY",
        backend: Backend::OpenAICompatible,
        base_url: Some("https://api.groq.com/openai/v1"),
    },
    ProviderInfo {
        id: "local",
        name: "Local / Ollama",
        env_var: "",
        backend: Backend::OpenAICompatible,
        base_url: Some("http://localhost:11434/v1"),
    },
];

pub fn get_provider(id: &str) -> Option<&'static ProviderInfo> {
    let id = id.trim().to_lowercase();
    PROVIDERS.iter().find(|p| p.id == id)
}

/// Environment variable consulted when no API key is configured.
pub fn env_var_for(provider_id: &str) -> Option<&'static str> {
    get_provider(provider_id)
        .map(|p| p.env_var)
        .filter(|v| !v.is_empty())
}
