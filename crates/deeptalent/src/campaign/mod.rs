//! Outreach to shortlisted candidates through the messaging campaign API.

pub mod client;
pub mod service;
pub mod token;

pub use client::{CampaignApi, CampaignClient, CampaignMessage};
pub use service::CampaignService;
pub use token::{ClientCredentials, IssuedToken, TokenCache, TokenSource};

use thiserror::Error;

use crate::db::DatabaseError;
use crate::error::WorkerError;
use crate::secrets::SecretError;

#[derive(Error, Debug)]
pub enum CampaignError {
    #[error("Campaign service is not configured")]
    NotConfigured,

    /// Network failure or non-success HTTP status.
    #[error("Campaign service unavailable: {0}")]
    Unavailable(String),

    #[error("Unexpected campaign service response: {0}")]
    InvalidResponse(String),

    #[error("Campaign credentials: {0}")]
    Credentials(#[from] SecretError),

    #[error("Phone number '{0}' cannot receive messages")]
    InvalidReceiver(String),

    #[error("Candidate link {0} not found")]
    LinkNotFound(i64),

    #[error("Candidate link {0} has no usable phone number")]
    MissingPhone(i64),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),
}
