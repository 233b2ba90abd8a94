pub mod dedup;
pub mod local;
pub mod scoring;
pub mod supervisor;

pub use dedup::deduplicate_findings;
pub use local::local_consensus;
pub use scoring::ScoringPolicy;
pub use supervisor::{heuristic_verdict, Supervisor, VerificationOutcome};
