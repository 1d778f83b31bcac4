//! In-memory task table bridging the event loop and the worker pool.
//!
//! Blocking work goes to the [`WorkerPool`]; cooperative work is spawned on
//! the tokio runtime. Either way the caller gets a [`TaskId`] immediately and
//! observes progress only through [`TaskScheduler::get_status`].

pub mod task;

pub use task::{TaskId, TaskRecord, TaskStatus, TaskStatusResponse};

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::config::TaskConfig;
use crate::worker::pool::{panic_message, Job, WorkerPool};

/// `Ok(message)` completes the task, `Err(reason)` fails it.
pub type TaskOutcome = std::result::Result<Option<String>, String>;

pub type BlockingWork = Box<dyn FnOnce(TaskHandle) -> TaskOutcome + Send + 'static>;
pub type CooperativeWork =
    Box<dyn FnOnce(TaskHandle) -> BoxFuture<'static, TaskOutcome> + Send + 'static>;

pub enum WorkUnit {
    /// Runs on a pool worker.
    Blocking(BlockingWork),
    /// Runs on the event loop; must not block.
    Cooperative(CooperativeWork),
}

type TaskTable = Arc<RwLock<HashMap<TaskId, TaskRecord>>>;

fn read_table(tasks: &TaskTable) -> RwLockReadGuard<'_, HashMap<TaskId, TaskRecord>> {
    match tasks.read() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log::warn!("Task table lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

fn write_table(tasks: &TaskTable) -> RwLockWriteGuard<'_, HashMap<TaskId, TaskRecord>> {
    match tasks.write() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log::warn!("Task table lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

/// Applies `status` only if it moves the task forward. Evicted tasks are
/// not resurrected.
fn transition(tasks: &TaskTable, id: &TaskId, status: TaskStatus, message: Option<String>) -> bool {
    let mut table = write_table(tasks);
    let Some(record) = table.get_mut(id) else {
        return false;
    };
    if status.rank() <= record.status.rank() {
        log::debug!(
            "Ignoring transition of task {} from {} to {}",
            id,
            record.status,
            status
        );
        return false;
    }
    if status.is_terminal() {
        record.finished_at = Some(Utc::now());
    }
    record.status = status;
    if message.is_some() {
        record.message = message;
    }
    true
}

fn finish(tasks: &TaskTable, id: &TaskId, outcome: TaskOutcome) {
    match outcome {
        Ok(message) => {
            log::info!("Task {} completed", id);
            transition(tasks, id, TaskStatus::Completed, message);
        }
        Err(reason) => {
            log::error!("Task {} failed: {}", id, reason);
            transition(tasks, id, TaskStatus::Failed(reason), None);
        }
    }
}

fn age_secs(now: DateTime<Utc>, since: DateTime<Utc>) -> u64 {
    u64::try_from((now - since).num_seconds()).unwrap_or(0)
}

fn sweep(tasks: &TaskTable, config: &TaskConfig, now: DateTime<Utc>) -> usize {
    let mut table = write_table(tasks);
    let before = table.len();
    table.retain(|_, record| {
        let expired = record
            .finished_at
            .is_some_and(|finished| age_secs(now, finished) > config.retention_secs);
        let too_old = age_secs(now, record.created_at) > config.max_age_secs;
        !(expired || too_old)
    });
    before - table.len()
}

/// Given to running work so it can publish progress messages.
#[derive(Clone)]
pub struct TaskHandle {
    id: TaskId,
    tasks: TaskTable,
}

impl TaskHandle {
    pub fn id(&self) -> &TaskId {
        &self.id
    }

    pub fn set_message(&self, message: impl Into<String>) {
        if let Some(record) = write_table(&self.tasks).get_mut(&self.id) {
            if !record.status.is_terminal() {
                record.message = Some(message.into());
            }
        }
    }
}

pub struct TaskScheduler {
    runtime: Handle,
    pool: Arc<WorkerPool>,
    tasks: TaskTable,
    config: TaskConfig,
}

impl TaskScheduler {
    pub fn new(runtime: Handle, pool: Arc<WorkerPool>, config: TaskConfig) -> Self {
        Self {
            runtime,
            pool,
            tasks: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    pub fn runtime(&self) -> &Handle {
        &self.runtime
    }

    /// Registers the task as queued and dispatches it. Never waits for the
    /// work itself.
    pub fn submit(&self, work: WorkUnit, offer_id: Option<i64>) -> TaskId {
        let id = TaskId::generate();
        write_table(&self.tasks).insert(id.clone(), TaskRecord::queued(offer_id, Utc::now()));

        let handle = TaskHandle {
            id: id.clone(),
            tasks: Arc::clone(&self.tasks),
        };
        let tasks = Arc::clone(&self.tasks);
        let task_id = id.clone();

        match work {
            WorkUnit::Blocking(f) => {
                let job: Job = Box::new(move || {
                    transition(&tasks, &task_id, TaskStatus::Processing, None);
                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| f(handle)))
                        .unwrap_or_else(|payload| {
                            Err(format!("task panicked: {}", panic_message(payload.as_ref())))
                        });
                    finish(&tasks, &task_id, outcome);
                });
                if let Err(e) = self.pool.submit(job) {
                    finish(&self.tasks, &id, Err(e.to_string()));
                }
            }
            WorkUnit::Cooperative(f) => {
                self.runtime.spawn(async move {
                    transition(&tasks, &task_id, TaskStatus::Processing, None);
                    let outcome = AssertUnwindSafe(f(handle))
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|payload| {
                            Err(format!("task panicked: {}", panic_message(payload.as_ref())))
                        });
                    finish(&tasks, &task_id, outcome);
                });
            }
        }

        log::debug!("Submitted task {}", id);
        id
    }

    pub fn submit_blocking<F, E>(&self, offer_id: Option<i64>, f: F) -> TaskId
    where
        F: FnOnce(TaskHandle) -> Result<Option<String>, E> + Send + 'static,
        E: fmt::Display,
    {
        self.submit(
            WorkUnit::Blocking(Box::new(move |handle| f(handle).map_err(|e| e.to_string()))),
            offer_id,
        )
    }

    pub fn submit_async<F, Fut, E>(&self, offer_id: Option<i64>, f: F) -> TaskId
    where
        F: FnOnce(TaskHandle) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Option<String>, E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        self.submit(
            WorkUnit::Cooperative(Box::new(move |handle| {
                async move { f(handle).await.map_err(|e| e.to_string()) }.boxed()
            })),
            offer_id,
        )
    }

    /// Unknown and evicted ids both report [`TaskStatus::NotFound`].
    pub fn get_status(&self, id: &TaskId) -> TaskStatus {
        read_table(&self.tasks)
            .get(id)
            .map(|record| record.status.clone())
            .unwrap_or(TaskStatus::NotFound)
    }

    pub fn record(&self, id: &TaskId) -> Option<TaskRecord> {
        read_table(&self.tasks).get(id).cloned()
    }

    pub fn status_response(&self, id: &TaskId) -> TaskStatusResponse {
        match read_table(&self.tasks).get(id) {
            Some(record) => TaskStatusResponse::from_record(id.clone(), record),
            None => TaskStatusResponse::not_found(id.clone()),
        }
    }

    pub fn len(&self) -> usize {
        read_table(&self.tasks).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Evicts terminal tasks past the retention window and any task past the
    /// absolute age ceiling. Returns how many were removed.
    pub fn cleanup_at(&self, now: DateTime<Utc>) -> usize {
        sweep(&self.tasks, &self.config, now)
    }

    /// Periodic [`cleanup_at`](Self::cleanup_at) on the runtime.
    pub fn spawn_cleanup(&self) -> JoinHandle<()> {
        let tasks = Arc::clone(&self.tasks);
        let config = self.config.clone();
        let interval = Duration::from_secs(config.cleanup_interval_secs.max(1));

        self.runtime.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // first tick fires immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let evicted = sweep(&tasks, &config, Utc::now());
                if evicted > 0 {
                    log::debug!("Evicted {} expired tasks", evicted);
                }
            }
        })
    }
}
