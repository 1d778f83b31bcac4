//! LLM scoring of candidate batches.

pub mod client;
pub mod completion;
pub mod response;

pub use client::EvaluationClient;
pub use completion::{
    ChatMessage, CompletionError, CompletionRequest, CompletionService, OpenAiCompletionService,
};
pub use response::{parse_evaluations, CandidateEvaluation};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EvaluationError {
    /// Rate limited again after the single allowed retry.
    #[error("Completion service rate limit persisted after retry")]
    RateLimited,

    /// Unparseable output again after the single allowed retry.
    #[error("Malformed evaluation response after retry: {0}")]
    MalformedResponse(String),

    #[error("Evaluation failed: {0}")]
    Completion(#[from] CompletionError),
}
