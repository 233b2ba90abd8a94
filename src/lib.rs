pub mod agents;
pub mod config;
pub mod consensus;
pub mod errors;
pub mod llm;
pub mod models;
pub mod normalizer;
pub mod pipeline;
pub mod prompts;
pub mod reporting;
pub mod sink;
pub mod source;
pub mod utils;

#[cfg(feature = "cli")]
pub mod cli;

pub use agents::{AgentRegistry, Tier};
pub use errors::{InputError, QuorumError};
pub use models::ConsolidatedReport;
pub use pipeline::AuditPipeline;
