use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use crate::config::ExplorerConfig;
use crate::errors::{InputError, QuorumError};
use super::{ContractSource, SourceProvider};
use tracing::{debug, info};

const DEFAULT_NETWORKS: &[(&str, &str)] = &[
    ("mainnet", "https://api.etherscan.io/api"),
    ("ethereum", "https://api.etherscan.io/api"),
    ("sepolia", "https://api-sepolia.etherscan.io/api"),
    ("polygon", "https://api.polygonscan.com/api"),
    ("arbitrum", "https://api.arbiscan.io/api"),
    ("optimism", "https://api-optimistic.etherscan.io/api"),
    ("base", "https://api.basescan.org/api"),
    ("bsc", "https://api.bscscan.com/api"),
];

/// Etherscan-compatible explorer client for verified contract source.
pub struct ExplorerSourceProvider {
    client: Client,
    api_key: String,
    networks: HashMap<String, String>,
}

impl ExplorerSourceProvider {
    pub fn new(config: &ExplorerConfig) -> Self {
        let mut networks: HashMap<String, String> = DEFAULT_NETWORKS
            .iter()
            .map(|(name, url)| (name.to_string(), url.to_string()))
            .collect();
        if let Some(custom) = &config.networks {
            for (name, url) in custom {
                networks.insert(name.to_lowercase(), url.clone());
            }
        }
        let api_key = config
            .api_key
            .as_deref()
            .map(crate::config::credentials::resolve_credential)
            .or_else(|| std::env::var("ETHERSCAN_API_KEY").ok())
            .unwrap_or_default();
        Self { client: Client::new(), api_key, networks }
    }

    fn endpoint(&self, network: &str) -> Result<&str, QuorumError> {
        self.networks
            .get(&network.to_lowercase())
            .map(String::as_str)
            .ok_or_else(|| QuorumError::Config(format!("Unknown network: {}", network)))
    }
}

pub fn validate_address(address: &str) -> Result<(), InputError> {
    let hex = address.strip_prefix("0x").or_else(|| address.strip_prefix("0X"));
    match hex {
        Some(h) if h.len() == 40 && h.chars().all(|c| c.is_ascii_hexdigit()) => Ok(()),
        _ => Err(InputError::InvalidAddress(address.to_string())),
    }
}

#[async_trait]
impl SourceProvider for ExplorerSourceProvider {
    async fn fetch_source(&self, address: &str, network: &str) -> Result<ContractSource, QuorumError> {
        validate_address(address)?;
        let url = self.endpoint(network)?;
        debug!(address, network, "Fetching verified source");

        let resp = self.client
            .get(url)
            .query(&[
                ("module", "contract"),
                ("action", "getsourcecode"),
                ("address", address),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| QuorumError::Network(format!("Explorer request failed: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(QuorumError::Network(format!("Explorer returned HTTP {}", status)));
        }
        let data: Value = resp.json().await
            .map_err(|e| QuorumError::LLMApi(format!("Explorer response parse error: {}", e)))?;

        let source = parse_explorer_response(address, &data)?;
        info!(address, network, contract = %source.name, chars = source.text.len(), "Verified source fetched");
        Ok(source)
    }
}

/// Extract source from a `getsourcecode` response, flattening multi-file
/// sources with `// File:` markers.
pub fn parse_explorer_response(address: &str, data: &Value) -> Result<ContractSource, QuorumError> {
    if data["status"].as_str() == Some("0") {
        let message = data["result"].as_str().or(data["message"].as_str()).unwrap_or("request rejected");
        if message.to_lowercase().contains("rate limit") {
            return Err(QuorumError::RateLimit(message.to_string()));
        }
        if message.to_lowercase().contains("api key") {
            return Err(QuorumError::Authentication(message.to_string()));
        }
        return Err(QuorumError::NotVerified(format!("{}: {}", address, message)));
    }

    let entry = &data["result"][0];
    let raw = entry["SourceCode"].as_str().unwrap_or_default().trim();
    if raw.is_empty() {
        return Err(QuorumError::NotVerified(address.to_string()));
    }
    let name = entry["ContractName"]
        .as_str()
        .filter(|n| !n.is_empty())
        .unwrap_or("Contract")
        .to_string();

    Ok(ContractSource { text: flatten_source(raw), name })
}

/// Single-file sources pass through; standard-JSON inputs (optionally wrapped
/// in an extra pair of braces) become one `// File:` section per source.
fn flatten_source(raw: &str) -> String {
    let unwrapped = raw
        .strip_prefix("{{")
        .and_then(|r| r.strip_suffix("}}"))
        .map(|inner| format!("{{{}}}", inner));
    let candidate = unwrapped.as_deref().unwrap_or(raw);

    let Ok(parsed) = serde_json::from_str::<Value>(candidate) else {
        return raw.to_string();
    };
    let sources = parsed.get("sources").unwrap_or(&parsed);
    let Some(files) = sources.as_object() else {
        return raw.to_string();
    };

    let mut out = String::new();
    for (path, file) in files {
        if let Some(content) = file["content"].as_str() {
            out.push_str(&format!("// File: {}\n{}\n", path, content.trim_end()));
        }
    }
    if out.is_empty() { raw.to_string() } else { out }
}
