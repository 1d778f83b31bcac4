//! Background-check launch and result reconciliation.

pub mod client;
pub mod poller;
pub mod service;

pub use client::{BackgroundCheckApi, CheckResult, LaunchRequest, TusDatosClient};
pub use poller::{BackgroundCheckPoller, PollOutcome};
pub use service::BackgroundCheckService;

use thiserror::Error;

use crate::db::DatabaseError;
use crate::error::WorkerError;
use crate::secrets::SecretError;

#[derive(Error, Debug)]
pub enum BackgroundCheckError {
    /// Network failure or non-success HTTP status from the check service.
    #[error("Background check service unavailable: {0}")]
    Unavailable(String),

    #[error("Unexpected background check response: {0}")]
    InvalidResponse(String),

    #[error("Background check credentials: {0}")]
    Credentials(#[from] SecretError),

    #[error("Candidate document {0} not found")]
    CandidateNotFound(i64),

    #[error("Candidate document {0} has no national ID to check")]
    MissingDocumentNumber(i64),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),
}
