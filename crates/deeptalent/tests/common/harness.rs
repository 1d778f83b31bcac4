//! Test harness for isolated intake runs.
//!
//! The `TestHarness` owns a temporary blob directory, an in-memory database
//! seeded with one company and one offer, a worker pool and a task scheduler
//! bound to the current tokio runtime.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::runtime::Handle;

use deeptalent::config::{BatchConfig, TaskConfig};
use deeptalent::db::offer_repo::NewOffer;
use deeptalent::db::{company_repo, cvitae_repo, offer_repo, vitae_offer_repo};
use deeptalent::evaluation::{CompletionError, CompletionService};
use deeptalent::{
    BatchOrchestrator, BlobStore, Database, EvaluationClient, FilesystemBlobStore, IntakeService,
    Materializer, TaskId, TaskScheduler, TaskStatusResponse, TextExtractor, WorkerPool,
};

use super::builders::ScriptedCompletion;

pub const BUCKET: &str = "cvs.example.com";
pub const COMPANY_NAME: &str = "Acme";

pub struct TestHarness {
    temp_dir: TempDir,
    pub db: Database,
    pub pool: Arc<WorkerPool>,
    pub scheduler: Arc<TaskScheduler>,
    pub company_id: i64,
    pub offer_id: i64,
}

impl TestHarness {
    /// Must be called from inside a multi-threaded tokio runtime.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db = Database::open_in_memory().expect("Failed to open database");
        let (company_id, offer_id) = db
            .with_conn(|conn| {
                let company_id = company_repo::insert(conn, COMPANY_NAME)?;
                let offer_id = offer_repo::insert(
                    conn,
                    &NewOffer {
                        company_id,
                        name: "Analista de datos".to_string(),
                        city: "Bogota".to_string(),
                        age: "18-40".to_string(),
                        gender: "Indiferente".to_string(),
                        experience_years: 2,
                        skills: vec!["Python".to_string(), "SQL".to_string()],
                        ..NewOffer::default()
                    },
                )?;
                Ok((company_id, offer_id))
            })
            .expect("Failed to seed database");

        let pool = Arc::new(WorkerPool::new(4).expect("Failed to start worker pool"));
        let scheduler = Arc::new(TaskScheduler::new(
            Handle::current(),
            Arc::clone(&pool),
            TaskConfig::default(),
        ));

        Self {
            temp_dir,
            db,
            pool,
            scheduler,
            company_id,
            offer_id,
        }
    }

    pub fn blob_root(&self) -> PathBuf {
        self.temp_dir.path().to_path_buf()
    }

    /// Blobs stored for the seeded company under the default category.
    pub fn stored_blobs(&self) -> usize {
        let dir = self.blob_root().join("acme").join("cv");
        match std::fs::read_dir(dir) {
            Ok(entries) => entries.count(),
            Err(_) => 0,
        }
    }

    /// An intake service whose completion calls are answered by `replies`.
    pub fn intake_service(
        &self,
        replies: Vec<Result<String, CompletionError>>,
    ) -> (IntakeService, Arc<ScriptedCompletion>) {
        let completion = Arc::new(ScriptedCompletion::new(replies));
        let service: Arc<dyn CompletionService> = completion.clone();

        let blobs: Arc<dyn BlobStore> = Arc::new(FilesystemBlobStore::new(self.blob_root(), BUCKET));
        let evaluator = EvaluationClient::new(service, "gpt-4o", Duration::ZERO);
        let materializer = Arc::new(Materializer::new(self.db.clone(), Arc::clone(&blobs)));
        let extractor = TextExtractor::from_config(&deeptalent::config::OcrConfig {
            enabled: false,
            ..Default::default()
        });
        let orchestrator = BatchOrchestrator::new(
            Arc::clone(&self.pool),
            extractor,
            blobs,
            evaluator,
            materializer,
        )
        .with_batching(&BatchConfig {
            size: 10,
            delay_ms: 0,
        });

        let intake = IntakeService::new(
            self.db.clone(),
            Arc::clone(&self.scheduler),
            Arc::new(orchestrator),
        );
        (intake, completion)
    }

    /// Polls the task until it leaves the queued/processing states.
    pub async fn wait_for_task(&self, intake: &IntakeService, task_id: &TaskId) -> TaskStatusResponse {
        for _ in 0..500 {
            let response = intake.task_status(task_id);
            if response.status != "queued" && response.status != "processing" {
                return response;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("Task {} did not finish in time", task_id);
    }

    pub fn candidate_count(&self) -> u64 {
        self.db
            .with_conn(|conn| cvitae_repo::count(conn))
            .expect("Failed to count candidates")
    }

    pub fn link_count(&self) -> u64 {
        self.db
            .with_conn(|conn| vitae_offer_repo::count(conn))
            .expect("Failed to count links")
    }

    pub fn links(&self) -> Vec<vitae_offer_repo::VitaeOfferRow> {
        self.db
            .with_conn(|conn| vitae_offer_repo::list_for_offer(conn, self.offer_id))
            .expect("Failed to list links")
    }
}
