use serde::{Deserialize, Serialize};
use crate::agents::Tier;
use crate::errors::InputError;

/// Instruction flavour for the first-stage prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptVariant {
    /// Security, gas and code quality.
    #[default]
    Full,
    /// Security issues only; gas and quality sections stay empty.
    SecurityFocused,
}

impl PromptVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::SecurityFocused => "security_focused",
        }
    }
}

impl std::str::FromStr for PromptVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "full" => Ok(Self::Full),
            "security_focused" | "security" => Ok(Self::SecurityFocused),
            other => Err(format!("unknown prompt variant: {}", other)),
        }
    }
}

/// One audit invocation's input. Read-only once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub contract_name: String,
    pub source_text: String,
    pub tier: Tier,
    pub prompt_variant: PromptVariant,
}

impl AnalysisRequest {
    pub fn new(
        source_text: impl Into<String>,
        contract_name: impl Into<String>,
        tier: Tier,
        prompt_variant: PromptVariant,
    ) -> Result<Self, InputError> {
        let source_text = source_text.into();
        let contract_name = contract_name.into();
        if source_text.trim().is_empty() {
            return Err(InputError::EmptySource);
        }
        if contract_name.trim().is_empty() {
            return Err(InputError::EmptyContractName);
        }
        Ok(Self {
            contract_name: contract_name.trim().to_string(),
            source_text,
            tier,
            prompt_variant,
        })
    }
}
