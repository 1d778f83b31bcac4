pub mod error;
pub mod orchestrator;
pub mod progress;
pub mod report;

pub use error::{BatchError, PipelineError};
pub use orchestrator::{BatchOrchestrator, IntakeSubmission, SubmittedFile};
pub use progress::{BatchPhase, NoopProgress, ProgressEvent, ProgressReporter, TaskProgress};
pub use report::{BatchOutcome, BatchReport, IntakeReport, RejectedFile};
