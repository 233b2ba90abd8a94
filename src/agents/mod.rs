pub mod registry;

pub use registry::{AgentRegistry, AgentSpec, Specialty, Tier, TierPolicy};
