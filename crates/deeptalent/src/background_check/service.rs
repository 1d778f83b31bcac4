use std::convert::Infallible;
use std::sync::Arc;

use super::client::{BackgroundCheckApi, LaunchRequest};
use super::poller::BackgroundCheckPoller;
use super::BackgroundCheckError;
use crate::db::{cvitae_repo, Database};
use crate::materializer::{ID_NOT_FOUND, ID_TYPE_NOT_FOUND};
use crate::sanitize::redact_digits;
use crate::scheduler::{TaskId, TaskScheduler};

/// Document type sent when the résumé did not state one.
const DEFAULT_DOCUMENT_TYPE: &str = "CC";

/// Launches checks synchronously and hands the polling to the scheduler.
pub struct BackgroundCheckService {
    api: Arc<dyn BackgroundCheckApi>,
    db: Database,
    scheduler: Arc<TaskScheduler>,
    poller: Arc<BackgroundCheckPoller>,
}

impl BackgroundCheckService {
    pub fn new(
        api: Arc<dyn BackgroundCheckApi>,
        db: Database,
        scheduler: Arc<TaskScheduler>,
        poller: Arc<BackgroundCheckPoller>,
    ) -> Self {
        Self {
            api,
            db,
            scheduler,
            poller,
        }
    }

    /// Starts a check for a stored candidate and returns the polling task.
    ///
    /// Launch failures are returned to the caller. Anything after that is
    /// only visible through the task status and the stored verdict.
    pub async fn start(&self, cvitae_id: i64, force: bool) -> Result<TaskId, BackgroundCheckError> {
        let db = self.db.clone();
        let doc = self
            .scheduler
            .pool()
            .execute(move || db.with_conn(|conn| cvitae_repo::find(conn, cvitae_id)))
            .await??
            .ok_or(BackgroundCheckError::CandidateNotFound(cvitae_id))?;

        let doc_number = doc
            .candidate_dni
            .filter(|dni| !dni.trim().is_empty() && dni != ID_NOT_FOUND)
            .ok_or(BackgroundCheckError::MissingDocumentNumber(cvitae_id))?;
        let doc_type = doc
            .candidate_dni_type
            .filter(|t| !t.trim().is_empty() && t != ID_TYPE_NOT_FOUND)
            .unwrap_or_else(|| DEFAULT_DOCUMENT_TYPE.to_string());

        log::debug!(
            "Launching background check for document {} ({} {})",
            cvitae_id,
            doc_type,
            redact_digits(&doc_number)
        );
        let job_id = self
            .api
            .launch(&LaunchRequest {
                doc: doc_number,
                typedoc: doc_type,
                force,
            })
            .await?;
        log::info!("Launched background check {} for document {}", job_id, cvitae_id);

        let db = self.db.clone();
        let stored_job = job_id.clone();
        self.scheduler
            .pool()
            .execute(move || {
                db.with_transaction(|tx| cvitae_repo::set_tusdatos_id(tx, cvitae_id, &stored_job))
            })
            .await??;

        let poller = Arc::clone(&self.poller);
        let task_id = self.scheduler.submit_async(None, move |_| async move {
            let outcome = poller.poll(&job_id, cvitae_id).await;
            // every poll outcome is a valid terminal result for the task
            Ok::<_, Infallible>(Some(outcome.describe()))
        });

        Ok(task_id)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use tokio::runtime::Handle;

    use super::*;
    use crate::background_check::poller::test_support::{found, ScriptedChecks};
    use crate::config::{BackgroundCheckConfig, TaskConfig};
    use crate::db::company_repo;
    use crate::db::cvitae_repo::CandidateDocument;
    use crate::scheduler::TaskStatus;
    use crate::worker::WorkerPool;

    fn service(api: Arc<ScriptedChecks>, db: &Database) -> (BackgroundCheckService, Arc<TaskScheduler>) {
        let pool = Arc::new(WorkerPool::new(2).unwrap());
        let scheduler = Arc::new(TaskScheduler::new(
            Handle::current(),
            Arc::clone(&pool),
            TaskConfig::default(),
        ));
        let config = BackgroundCheckConfig {
            poll_interval_ms: 1,
            ..BackgroundCheckConfig::default()
        };
        let poller = Arc::new(BackgroundCheckPoller::new(api.clone(), db.clone(), pool, &config));
        (
            BackgroundCheckService::new(api, db.clone(), Arc::clone(&scheduler), poller),
            scheduler,
        )
    }

    fn insert_candidate(db: &Database, dni: Option<&str>, dni_type: Option<&str>) -> i64 {
        db.with_conn(|conn| {
            let company = company_repo::insert(conn, "Acme")?;
            let mut doc = CandidateDocument {
                candidate_dni: dni.map(String::from),
                candidate_dni_type: dni_type.map(String::from),
                ..CandidateDocument::provisional(
                    company,
                    "https://cvs.example.com/acme/cv/ana.pdf".to_string(),
                    "pdf",
                    10,
                    "text".to_string(),
                )
            };
            cvitae_repo::save(conn, &mut doc)
        })
        .unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_start_launches_and_polls() {
        let db = Database::open_in_memory().unwrap();
        let id = insert_candidate(&db, Some("1020304050"), Some(ID_TYPE_NOT_FOUND));
        let api = Arc::new(ScriptedChecks::new(vec![found(json!("Sin hallazgos"))]));
        let (service, scheduler) = service(api.clone(), &db);

        let task = service.start(id, true).await.unwrap();

        let launches = api.launches.lock().unwrap().clone();
        assert_eq!(
            launches,
            vec![LaunchRequest {
                doc: "1020304050".to_string(),
                typedoc: "CC".to_string(),
                force: true,
            }]
        );

        for _ in 0..200 {
            if scheduler.get_status(&task).is_terminal() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(scheduler.get_status(&task), TaskStatus::Completed);

        let doc = db.with_conn(|conn| cvitae_repo::find(conn, id)).unwrap().unwrap();
        assert_eq!(doc.tusdatos_id.as_deref(), Some("job-42"));
        assert_eq!(doc.background_check.as_deref(), Some("Sin hallazgos"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_start_requires_document_number() {
        let db = Database::open_in_memory().unwrap();
        let id = insert_candidate(&db, Some(ID_NOT_FOUND), None);
        let api = Arc::new(ScriptedChecks::new(Vec::new()));
        let (service, scheduler) = service(api.clone(), &db);

        let err = service.start(id, false).await.unwrap_err();
        assert!(matches!(err, BackgroundCheckError::MissingDocumentNumber(_)));
        assert!(api.launches.lock().unwrap().is_empty());
        assert!(scheduler.is_empty());

        let err = service.start(id + 100, false).await.unwrap_err();
        assert!(matches!(err, BackgroundCheckError::CandidateNotFound(_)));
    }
}
