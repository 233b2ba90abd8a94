use super::types::QuorumError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorClassification {
    pub error_type: &'static str,
    pub retryable: bool,
}

impl QuorumError {
    /// Stable name for logs and failure records.
    pub fn error_type(&self) -> &'static str {
        match self {
            QuorumError::Config(_) => "ConfigError",
            QuorumError::Authentication(_) => "AuthenticationError",
            QuorumError::LLMApi(_) => "LLMApiError",
            QuorumError::RateLimit(_) => "RateLimitError",
            QuorumError::Billing(_) => "BillingError",
            QuorumError::Timeout(_) => "TimeoutError",
            QuorumError::Network(_) => "NetworkError",
            QuorumError::EmptyResponse(_) => "EmptyResponseError",
            QuorumError::NotVerified(_) => "NotVerifiedError",
            QuorumError::Input(_) => "InputError",
            QuorumError::Io(_) => "IoError",
            QuorumError::Json(_) => "JsonError",
            QuorumError::Yaml(_) => "YamlError",
            QuorumError::Prompt(_) => "PromptError",
            QuorumError::Persist(_) => "PersistError",
            QuorumError::Internal(_) => "InternalError",
        }
    }

    /// Transient provider and transport conditions are worth another attempt;
    /// credential, quota and input problems are not.
    pub fn classify(&self) -> ErrorClassification {
        let retryable = matches!(
            self,
            QuorumError::RateLimit(_)
                | QuorumError::Network(_)
                | QuorumError::Timeout(_)
                | QuorumError::EmptyResponse(_)
                | QuorumError::LLMApi(_)
                | QuorumError::Io(_)
                | QuorumError::Persist(_)
        );
        ErrorClassification { error_type: self.error_type(), retryable }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::InputError;

    #[test]
    fn test_transient_errors_are_retryable() {
        for err in [
            QuorumError::RateLimit("too many requests".into()),
            QuorumError::Network("connection reset".into()),
            QuorumError::Timeout("timed out".into()),
            QuorumError::EmptyResponse("blank content".into()),
            QuorumError::LLMApi("502 bad gateway".into()),
        ] {
            assert!(err.classify().retryable, "{} should retry", err.error_type());
        }
    }

    #[test]
    fn test_permanent_errors_fail_fast() {
        for err in [
            QuorumError::Authentication("bad key".into()),
            QuorumError::Billing("quota exceeded".into()),
            QuorumError::NotVerified("0xabc".into()),
            QuorumError::from(InputError::EmptySource),
            QuorumError::Internal("join error".into()),
        ] {
            assert!(!err.classify().retryable, "{} should not retry", err.error_type());
        }
    }

    #[test]
    fn test_error_type_names() {
        assert_eq!(QuorumError::RateLimit("x".into()).classify().error_type, "RateLimitError");
        assert_eq!(QuorumError::from(InputError::EmptySource).error_type(), "InputError");
    }
}
