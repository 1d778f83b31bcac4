use crate::scheduler::TaskHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchPhase {
    Extracting,
    Evaluating,
    Saving,
    Waiting,
    Finished,
}

/// Emitted by the orchestrator as it moves through each batch.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    Phase {
        batch: usize,
        total: usize,
        phase: BatchPhase,
        message: String,
    },
    FileRejected {
        filename: String,
        reason: String,
    },
    BatchFailed {
        batch: usize,
        error: String,
    },
}

impl ProgressEvent {
    pub fn message(&self) -> String {
        match self {
            ProgressEvent::Phase {
                batch,
                total,
                message,
                ..
            } => format!("Batch {}/{}: {}", batch, total, message),
            ProgressEvent::FileRejected { filename, reason } => {
                format!("Skipped '{}': {}", filename, reason)
            }
            ProgressEvent::BatchFailed { batch, error } => {
                format!("Batch {} failed: {}", batch, error)
            }
        }
    }
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// No-op reporter for unit tests.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Mirrors progress into the status message of a scheduler task.
pub struct TaskProgress {
    handle: TaskHandle,
}

impl TaskProgress {
    pub fn new(handle: TaskHandle) -> Self {
        Self { handle }
    }
}

impl ProgressReporter for TaskProgress {
    fn report(&self, event: ProgressEvent) {
        self.handle.set_message(event.message());
    }
}
