pub mod explorer;
pub mod file;

use async_trait::async_trait;
use crate::errors::QuorumError;

pub use explorer::ExplorerSourceProvider;
pub use file::FileSourceProvider;

/// Contract source text and the name of the contract to audit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractSource {
    pub text: String,
    pub name: String,
}

/// Where contract source comes from. Unverified contracts yield
/// [`QuorumError::NotVerified`].
#[async_trait]
pub trait SourceProvider: Send + Sync {
    async fn fetch_source(&self, address: &str, network: &str) -> Result<ContractSource, QuorumError>;
}
