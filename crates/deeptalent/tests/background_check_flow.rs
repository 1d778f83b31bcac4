//! Background checks on candidates created by an intake run.

mod common;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use common::{evaluation_reply, resumes, TestHarness};
use deeptalent::background_check::{BackgroundCheckApi, CheckResult, LaunchRequest};
use deeptalent::background_check::BackgroundCheckError;
use deeptalent::config::BackgroundCheckConfig;
use deeptalent::db::cvitae_repo;
use deeptalent::{BackgroundCheckPoller, BackgroundCheckService, PollOutcome};

/// Check service fake: replays results, then repeats the last one.
struct FakeChecks {
    results: Mutex<VecDeque<CheckResult>>,
    launches: Mutex<Vec<LaunchRequest>>,
    fetches: Mutex<usize>,
}

impl FakeChecks {
    fn new(results: Vec<CheckResult>) -> Self {
        Self {
            results: Mutex::new(results.into()),
            launches: Mutex::new(Vec::new()),
            fetches: Mutex::new(0),
        }
    }

    fn fetch_count(&self) -> usize {
        *self.fetches.lock().unwrap()
    }
}

#[async_trait]
impl BackgroundCheckApi for FakeChecks {
    async fn launch(&self, request: &LaunchRequest) -> Result<String, BackgroundCheckError> {
        self.launches.lock().unwrap().push(request.clone());
        Ok("job-7".to_string())
    }

    async fn fetch_result(&self, _job_id: &str) -> Result<CheckResult, BackgroundCheckError> {
        *self.fetches.lock().unwrap() += 1;
        let mut results = self.results.lock().unwrap();
        let next = if results.len() > 1 {
            results.pop_front()
        } else {
            results.front().cloned()
        };
        Ok(next.unwrap_or_default())
    }
}

fn running() -> CheckResult {
    CheckResult {
        estado: Some("procesando".to_string()),
        hallazgo: None,
    }
}

fn fast_config(max_attempts: u32) -> BackgroundCheckConfig {
    BackgroundCheckConfig {
        poll_interval_ms: 0,
        max_attempts,
        ..BackgroundCheckConfig::default()
    }
}

/// Runs a one-file intake and returns the stored candidate's id.
async fn intake_one(harness: &TestHarness) -> i64 {
    let (intake, _completion) = harness.intake_service(vec![Ok(evaluation_reply(0, 1))]);
    let task_id = intake.submit_cvs(harness.company_id, harness.offer_id, resumes(0, 1));
    let status = harness.wait_for_task(&intake, &task_id).await;
    assert_eq!(status.status, "completed", "message: {:?}", status.message);
    harness.links()[0].cvitae_id
}

#[tokio::test(flavor = "multi_thread")]
async fn test_check_launched_with_extracted_identity() {
    let harness = TestHarness::new();
    let cvitae_id = intake_one(&harness).await;

    let api = Arc::new(FakeChecks::new(vec![
        running(),
        CheckResult {
            estado: Some("finalizado".to_string()),
            hallazgo: Some(json!({"antecedentes": []})),
        },
    ]));
    let poller = Arc::new(BackgroundCheckPoller::new(
        api.clone(),
        harness.db.clone(),
        Arc::clone(&harness.pool),
        &fast_config(5),
    ));
    let service = BackgroundCheckService::new(
        api.clone(),
        harness.db.clone(),
        Arc::clone(&harness.scheduler),
        poller,
    );

    let task_id = service.start(cvitae_id, false).await.unwrap();

    let launches = api.launches.lock().unwrap().clone();
    assert_eq!(
        launches,
        vec![LaunchRequest {
            doc: "1000000000".to_string(),
            typedoc: "CC".to_string(),
            force: false,
        }]
    );

    let mut status = harness.scheduler.status_response(&task_id);
    for _ in 0..500 {
        if status.status == "completed" {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        status = harness.scheduler.status_response(&task_id);
    }
    assert_eq!(status.status, "completed");
    assert_eq!(status.message.as_deref(), Some("resolved on attempt 2"));
    assert_eq!(api.fetch_count(), 2);

    let doc = harness
        .db
        .with_conn(|conn| cvitae_repo::find(conn, cvitae_id))
        .unwrap()
        .unwrap();
    assert_eq!(doc.tusdatos_id.as_deref(), Some("job-7"));
    assert_eq!(doc.background_check.as_deref(), Some(r#"{"antecedentes":[]}"#));
    assert!(doc.background_date.is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_poll_gives_up_after_max_attempts() {
    let harness = TestHarness::new();
    let cvitae_id = intake_one(&harness).await;

    let api = Arc::new(FakeChecks::new(vec![running()]));
    let poller = BackgroundCheckPoller::new(
        api.clone(),
        harness.db.clone(),
        Arc::clone(&harness.pool),
        &fast_config(3),
    );

    let outcome = poller.poll("job-7", cvitae_id).await;

    assert_eq!(outcome, PollOutcome::MaxRetriesReached);
    assert_eq!(api.fetch_count(), 3);
    let doc = harness
        .db
        .with_conn(|conn| cvitae_repo::find(conn, cvitae_id))
        .unwrap()
        .unwrap();
    assert_eq!(doc.background_check.as_deref(), Some("max retries reached"));
}
