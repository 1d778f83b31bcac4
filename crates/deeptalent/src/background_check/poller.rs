use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::Instrument;

use super::client::{BackgroundCheckApi, CheckResult};
use super::BackgroundCheckError;
use crate::config::BackgroundCheckConfig;
use crate::db::{cvitae_repo, now_timestamp, Database};
use crate::worker::WorkerPool;

/// Verdict stored while the check is still running.
pub const VERDICT_PROCESSING: &str = "processing";
/// Verdict for a finished check that reported no finding.
pub const VERDICT_ERROR: &str = "error";
pub const VERDICT_MAX_RETRIES: &str = "max retries reached";

/// Status values the check service uses for a running job.
const RUNNING_STATES: [&str; 2] = ["procesando", "processing"];

#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// A finding was stored on the given attempt (1-based).
    Resolved { attempt: u32 },
    /// The service stopped without a finding; `estado` is what it reported.
    Error { estado: Option<String> },
    MaxRetriesReached,
    /// A call failed; the last stored verdict stands.
    ServiceUnavailable(String),
    CandidateNotFound,
}

impl PollOutcome {
    pub fn describe(&self) -> String {
        match self {
            PollOutcome::Resolved { attempt } => format!("resolved on attempt {}", attempt),
            PollOutcome::Error { estado } => format!(
                "check ended without finding (estado: {})",
                estado.as_deref().unwrap_or("none")
            ),
            PollOutcome::MaxRetriesReached => VERDICT_MAX_RETRIES.to_string(),
            PollOutcome::ServiceUnavailable(reason) => format!("service unavailable: {}", reason),
            PollOutcome::CandidateNotFound => "candidate not found".to_string(),
        }
    }
}

fn is_running(estado: Option<&str>) -> bool {
    estado.is_some_and(|s| RUNNING_STATES.iter().any(|r| s.trim().eq_ignore_ascii_case(r)))
}

/// Finding text as stored: strings unquoted, anything else as JSON.
fn finding_text(finding: &Value) -> String {
    match finding {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Polls one job until it resolves, errors or runs out of attempts.
///
/// Every observation is written in its own transaction on the worker pool,
/// so the last one stays durable even if polling stops early.
pub struct BackgroundCheckPoller {
    api: Arc<dyn BackgroundCheckApi>,
    db: Database,
    pool: Arc<WorkerPool>,
    interval: Duration,
    max_attempts: u32,
}

impl BackgroundCheckPoller {
    pub fn new(
        api: Arc<dyn BackgroundCheckApi>,
        db: Database,
        pool: Arc<WorkerPool>,
        config: &BackgroundCheckConfig,
    ) -> Self {
        Self {
            api,
            db,
            pool,
            interval: config.poll_interval(),
            max_attempts: config.max_attempts.max(1),
        }
    }

    pub async fn poll(&self, job_id: &str, cvitae_id: i64) -> PollOutcome {
        let span = tracing::info_span!("background_check.poll", cvitae_id);
        self.poll_job(job_id, cvitae_id).instrument(span).await
    }

    async fn poll_job(&self, job_id: &str, cvitae_id: i64) -> PollOutcome {
        match self.candidate_exists(cvitae_id).await {
            Ok(true) => {}
            Ok(false) => {
                log::warn!("Candidate document {} not found, not polling", cvitae_id);
                return PollOutcome::CandidateNotFound;
            }
            Err(e) => return PollOutcome::ServiceUnavailable(e.to_string()),
        }

        for attempt in 1..=self.max_attempts {
            let result = match self.api.fetch_result(job_id).await {
                Ok(result) => result,
                Err(e) => {
                    log::warn!(
                        "Background check poll for document {} stopped on attempt {}: {}",
                        cvitae_id,
                        attempt,
                        e
                    );
                    return PollOutcome::ServiceUnavailable(e.to_string());
                }
            };

            let CheckResult { estado, hallazgo } = result;
            let (verdict, outcome) = match hallazgo {
                Some(finding) => (finding_text(&finding), Some(PollOutcome::Resolved { attempt })),
                None if is_running(estado.as_deref()) => (VERDICT_PROCESSING.to_string(), None),
                None => (
                    VERDICT_ERROR.to_string(),
                    Some(PollOutcome::Error { estado }),
                ),
            };

            if let Some(stop) = self.record(cvitae_id, verdict).await {
                return stop;
            }
            log::debug!("Document {} attempt {}/{}", cvitae_id, attempt, self.max_attempts);

            if let Some(outcome) = outcome {
                log::info!("Background check for document {}: {}", cvitae_id, outcome.describe());
                return outcome;
            }

            if attempt < self.max_attempts {
                tokio::time::sleep(self.interval).await;
            }
        }

        if let Some(stop) = self.record(cvitae_id, VERDICT_MAX_RETRIES.to_string()).await {
            return stop;
        }
        log::warn!(
            "Background check job {} still processing after {} attempts",
            job_id,
            self.max_attempts
        );
        PollOutcome::MaxRetriesReached
    }

    async fn candidate_exists(&self, cvitae_id: i64) -> Result<bool, BackgroundCheckError> {
        let db = self.db.clone();
        let found = self
            .pool
            .execute(move || db.with_conn(|conn| cvitae_repo::find(conn, cvitae_id)))
            .await??;
        Ok(found.is_some())
    }

    /// Writes one verdict. Returns the outcome that ends polling when the
    /// write could not be made.
    async fn record(&self, cvitae_id: i64, verdict: String) -> Option<PollOutcome> {
        let db = self.db.clone();
        let written = self
            .pool
            .execute(move || {
                db.with_transaction(|tx| {
                    cvitae_repo::set_background_check(tx, cvitae_id, &verdict, &now_timestamp())
                })
            })
            .await;

        match written {
            Ok(Ok(true)) => None,
            Ok(Ok(false)) => Some(PollOutcome::CandidateNotFound),
            Ok(Err(e)) => {
                log::error!("Failed to store verdict for document {}: {}", cvitae_id, e);
                Some(PollOutcome::ServiceUnavailable(e.to_string()))
            }
            Err(e) => Some(PollOutcome::ServiceUnavailable(e.to_string())),
        }
    }
}
