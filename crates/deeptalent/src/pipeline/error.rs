use thiserror::Error;

use crate::error::{StorageError, WorkerError};
use crate::evaluation::EvaluationError;
use crate::materializer::MaterializeError;

/// Why a whole batch was abandoned.
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Upload failed for '{filename}': {source}")]
    Upload {
        filename: String,
        #[source]
        source: StorageError,
    },

    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    #[error(transparent)]
    Materialize(#[from] MaterializeError),

    #[error("Worker pool unavailable: {0}")]
    Worker(#[from] WorkerError),
}

#[derive(Error, Debug)]
pub enum PipelineError {
    /// One entry per failed batch, already formatted as `batch N: reason`.
    #[error("Intake finished with failures: {}", .0.join("; "))]
    BatchesFailed(Vec<String>),
}
