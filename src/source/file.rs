use std::path::{Path, PathBuf};

use async_trait::async_trait;
use crate::errors::{InputError, QuorumError};
use crate::prompts::sections::{split_sections, SectionKind};
use super::{ContractSource, SourceProvider};

/// Reads contract source from local files. The address is a path relative to
/// the provider's root; the network is ignored.
pub struct FileSourceProvider {
    root: PathBuf,
}

impl FileSourceProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub async fn load(path: &Path) -> Result<ContractSource, QuorumError> {
        let text = tokio::fs::read_to_string(path).await?;
        if text.trim().is_empty() {
            return Err(InputError::EmptySource.into());
        }
        let name = guess_contract_name(&text)
            .or_else(|| path.file_stem().and_then(|s| s.to_str()).map(str::to_string))
            .unwrap_or_else(|| "Contract".to_string());
        Ok(ContractSource { text, name })
    }
}

/// The last deployable contract in the source, which in flattened files is
/// conventionally the one that inherits the rest.
pub fn guess_contract_name(source: &str) -> Option<String> {
    split_sections(source)
        .iter()
        .rev()
        .filter(|s| s.kind == SectionKind::Primary)
        .find_map(|s| s.declarations.last().cloned())
}

#[async_trait]
impl SourceProvider for FileSourceProvider {
    async fn fetch_source(&self, address: &str, _network: &str) -> Result<ContractSource, QuorumError> {
        Self::load(&self.root.join(address)).await
    }
}
