use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

static BEARER_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(bearer\s+)[A-Za-z0-9._\-]{8,}").unwrap());

static API_KEY_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bsk-[A-Za-z0-9_\-]{12,}").unwrap());

/// Resolve a credential value. If the value starts with '$', treat it as an
/// environment variable reference and resolve from the environment.
pub fn resolve_credential(value: &str) -> String {
    if let Some(var_name) = value.strip_prefix('$') {
        match std::env::var(var_name) {
            Ok(resolved) => {
                debug!(var = %var_name, "Resolved credential from environment");
                resolved
            }
            Err(_) => {
                debug!(var = %var_name, "Environment variable not set, no credential");
                String::new()
            }
        }
    } else {
        value.to_string()
    }
}

/// Redact sensitive values in a string. Replaces the given secrets and anything
/// shaped like a bearer token or API key with [REDACTED].
pub fn redact_credentials(text: &str, secrets: &[&str]) -> String {
    let mut result = text.to_string();
    for secret in secrets {
        if !secret.is_empty() && secret.len() >= 4 {
            result = result.replace(secret, "[REDACTED]");
        }
    }
    let result = BEARER_TOKEN.replace_all(&result, "${1}[REDACTED]");
    API_KEY_SHAPE.replace_all(&result, "[REDACTED]").into_owned()
}
