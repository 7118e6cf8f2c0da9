pub mod orchestrator;
pub mod poller;
pub mod session;
pub mod submitter;
pub mod traits;

pub use orchestrator::IntakeOrchestrator;
pub use poller::{JobPoller, PollAttempt, PollHandle, PollOptions};
pub use session::{IntakeSnapshot, IntakeStage};
pub use submitter::JobSubmitter;
pub use traits::{IntakeService, TranscriptionService};
