pub mod background_check;
pub mod campaign;
pub mod config;
pub mod db;
pub mod error;
pub mod evaluation;
pub mod http;
pub mod materializer;
pub mod pipeline;
pub mod processor;
pub mod prompt;
pub mod sanitize;
pub mod scheduler;
pub mod secrets;
pub mod service;
pub mod storage;
pub mod telemetry;
pub mod worker;

pub use background_check::{BackgroundCheckPoller, BackgroundCheckService, PollOutcome};
pub use campaign::{CampaignClient, CampaignService, TokenCache};
pub use config::{load_config, Config};
pub use db::{Database, DatabaseError};
pub use error::{ConfigError, DeepTalentError, ProcessError, Result, StorageError, WorkerError};
pub use evaluation::{CandidateEvaluation, EvaluationClient, EvaluationError};
pub use materializer::{MaterializeError, Materializer};
pub use pipeline::{BatchOrchestrator, IntakeReport, IntakeSubmission, PipelineError, SubmittedFile};
pub use processor::TextExtractor;
pub use prompt::{build_evaluation_prompt, RequisitionCriteria};
pub use scheduler::{TaskId, TaskScheduler, TaskStatus, TaskStatusResponse};
pub use secrets::{resolve_secret, SecretError};
pub use service::IntakeService;
pub use storage::{BlobStore, FilesystemBlobStore};
pub use worker::WorkerPool;
