pub mod builder;
pub mod loader;
pub mod sections;

pub use builder::{BuiltPrompt, PromptBuilder, MIN_SOURCE_TOKENS};
pub use loader::PromptLoader;
