pub mod dispatcher;
pub mod events;
pub mod orchestrator;
pub mod state;
pub mod transport;

pub use dispatcher::{AgentCall, DispatchSettings, Dispatcher};
pub use events::{AuditEvent, EventSender};
pub use orchestrator::{AuditPipeline, PipelineSettings};
pub use state::{AuditStage, AuditState};
pub use transport::{AnalysisTransport, ProviderTransport};
