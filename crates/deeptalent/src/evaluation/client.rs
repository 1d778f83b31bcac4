use std::sync::Arc;
use std::time::Duration;

use super::completion::{CompletionError, CompletionRequest, CompletionService};
use super::response::{parse_evaluations, CandidateEvaluation};
use super::EvaluationError;
use crate::prompt::SYSTEM_PROMPT;

/// Issues the single batched evaluation call for a prompt.
///
/// Rate limiting and malformed output each get one retry of their own.
/// A second occurrence of either class fails the call, so at most three
/// requests are made. Any other error propagates immediately.
#[derive(Clone)]
pub struct EvaluationClient {
    service: Arc<dyn CompletionService>,
    model: String,
    rate_limit_backoff: Duration,
}

impl EvaluationClient {
    pub fn new(service: Arc<dyn CompletionService>, model: &str, rate_limit_backoff: Duration) -> Self {
        Self {
            service,
            model: model.to_string(),
            rate_limit_backoff,
        }
    }

    pub async fn evaluate(&self, prompt: &str) -> Result<Vec<CandidateEvaluation>, EvaluationError> {
        let request = CompletionRequest::deterministic(&self.model, SYSTEM_PROMPT, prompt);
        let mut rate_limit_retried = false;
        let mut parse_retried = false;

        loop {
            match self.service.complete(&request).await {
                Ok(content) => match parse_evaluations(&content) {
                    Ok(evaluations) => return Ok(evaluations),
                    Err(reason) if !parse_retried => {
                        log::warn!("Malformed evaluation response ({}), retrying once", reason);
                        parse_retried = true;
                    }
                    Err(reason) => return Err(EvaluationError::MalformedResponse(reason)),
                },
                Err(CompletionError::RateLimited) if !rate_limit_retried => {
                    log::warn!(
                        "Completion service rate limited, retrying in {:?}",
                        self.rate_limit_backoff
                    );
                    rate_limit_retried = true;
                    tokio::time::sleep(self.rate_limit_backoff).await;
                }
                Err(CompletionError::RateLimited) => return Err(EvaluationError::RateLimited),
                Err(e) => return Err(e.into()),
            }
        }
    }
}
