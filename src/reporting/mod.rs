pub mod consolidator;
pub mod formatter;

pub use consolidator::{consolidate, ConsolidationContext};
pub use formatter::render_markdown;
