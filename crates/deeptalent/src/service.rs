//! Entry points for callers: résumé intake submission and task status.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;

use crate::config::Config;
use crate::db::{company_repo, default_database_path, offer_repo, Database};
use crate::error::{ConfigError, DeepTalentError, Result};
use crate::evaluation::{CompletionService, EvaluationClient, OpenAiCompletionService};
use crate::materializer::Materializer;
use crate::pipeline::{BatchOrchestrator, IntakeSubmission, SubmittedFile, TaskProgress};
use crate::processor::TextExtractor;
use crate::scheduler::{TaskId, TaskScheduler, TaskStatusResponse};
use crate::secrets::{expand_home, resolve_secret};
use crate::storage::{BlobStore, FilesystemBlobStore};
use crate::worker::WorkerPool;

pub struct IntakeService {
    db: Database,
    scheduler: Arc<TaskScheduler>,
    orchestrator: Arc<BatchOrchestrator>,
}

impl IntakeService {
    pub fn new(db: Database, scheduler: Arc<TaskScheduler>, orchestrator: Arc<BatchOrchestrator>) -> Self {
        Self {
            db,
            scheduler,
            orchestrator,
        }
    }

    /// Wires the full stack from config: database, worker pool, scheduler,
    /// extractor, blob store and the OpenAI-compatible completion service.
    pub fn from_config(config: &Config, runtime: Handle) -> Result<Self> {
        let api_key = resolve_secret(
            None,
            config.llm.api_key_file.as_deref(),
            Some(&config.llm.api_key_env),
        )?;
        let completion = OpenAiCompletionService::from_config(&config.llm, api_key)
            .map_err(crate::evaluation::EvaluationError::from)?;
        Self::with_completion_service(config, runtime, Arc::new(completion))
    }

    pub fn with_completion_service(
        config: &Config,
        runtime: Handle,
        completion: Arc<dyn CompletionService>,
    ) -> Result<Self> {
        let db = match &config.database.path {
            Some(path) => Database::open(Path::new(&expand_home(path)))?,
            None => {
                let path = default_database_path().ok_or_else(|| ConfigError::Validation {
                    message: "Cannot determine home directory for the database".to_string(),
                })?;
                Database::open(&path)?
            }
        };

        let pool = Arc::new(WorkerPool::new(config.worker_count)?);
        let scheduler = Arc::new(TaskScheduler::new(runtime, Arc::clone(&pool), config.tasks.clone()));
        scheduler.spawn_cleanup();

        let blobs: Arc<dyn BlobStore> = Arc::new(FilesystemBlobStore::new(
            expand_home(&config.storage.root_directory),
            &config.storage.bucket,
        ));
        let evaluator = EvaluationClient::new(
            completion,
            &config.llm.model,
            Duration::from_millis(config.llm.rate_limit_backoff_ms),
        );
        let materializer = Arc::new(Materializer::new(db.clone(), Arc::clone(&blobs)));
        let orchestrator = BatchOrchestrator::new(
            pool,
            TextExtractor::from_config(&config.ocr),
            blobs,
            evaluator,
            materializer,
        )
        .with_batching(&config.batch)
        .with_category(&config.storage.category);

        Ok(Self::new(db, scheduler, Arc::new(orchestrator)))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn scheduler(&self) -> &Arc<TaskScheduler> {
        &self.scheduler
    }

    /// Queues the files for intake and returns at once.
    ///
    /// Unknown company or offer, and any failed batch, show up as a failed
    /// task rather than an error here.
    pub fn submit_cvs(&self, company_id: i64, offer_id: i64, files: Vec<SubmittedFile>) -> TaskId {
        let db = self.db.clone();
        let pool = Arc::clone(self.scheduler.pool());
        let orchestrator = Arc::clone(&self.orchestrator);

        log::info!(
            "Received {} files for company {} offer {}",
            files.len(),
            company_id,
            offer_id
        );

        self.scheduler.submit_async(Some(offer_id), move |handle| async move {
            let (company, offer) = pool
                .execute(move || {
                    db.with_conn(|conn| {
                        Ok((company_repo::find(conn, company_id)?, offer_repo::find(conn, offer_id)?))
                    })
                })
                .await??;

            let company = company.ok_or(DeepTalentError::CompanyNotFound(company_id))?;
            let offer = offer
                .filter(|o| o.company_id == company_id)
                .ok_or(DeepTalentError::OfferNotFound(offer_id))?;

            let submission = IntakeSubmission {
                company_id,
                company_name: company.name,
                offer_id,
                criteria: offer.criteria(),
                files,
            };
            let progress = TaskProgress::new(handle);
            let report = orchestrator.run(submission, &progress).await;
            let summary = report.into_result()?;
            Ok::<_, DeepTalentError>(Some(summary))
        })
    }

    pub fn task_status(&self, task_id: &TaskId) -> TaskStatusResponse {
        self.scheduler.status_response(task_id)
    }
}
