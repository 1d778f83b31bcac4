use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tracing::{info_span, Instrument};

use crate::config::{BatchConfig, MAX_BATCH_SIZE};
use crate::db::cvitae_repo::CandidateDocument;
use crate::error::ProcessError;
use crate::evaluation::EvaluationClient;
use crate::materializer::Materializer;
use crate::processor::TextExtractor;
use crate::prompt::{build_evaluation_prompt, RequisitionCriteria};
use crate::storage::{blob_key, BlobStore};
use crate::worker::WorkerPool;

use super::error::BatchError;
use super::progress::{BatchPhase, ProgressEvent, ProgressReporter};
use super::report::{BatchOutcome, BatchReport, IntakeReport, RejectedFile};

#[derive(Debug, Clone)]
pub struct SubmittedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl SubmittedFile {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }

    fn extension(&self) -> &str {
        match self.filename.rsplit_once('.') {
            Some((_, ext)) => ext,
            None => "",
        }
    }
}

/// Everything one intake run needs; owned so it can move into a task.
#[derive(Debug, Clone)]
pub struct IntakeSubmission {
    pub company_id: i64,
    /// Owner segment of the blob keys.
    pub company_name: String,
    pub offer_id: i64,
    pub criteria: RequisitionCriteria,
    pub files: Vec<SubmittedFile>,
}

enum Prepared {
    Ready(CandidateDocument),
    Rejected(RejectedFile),
    UploadFailed(BatchError),
}

/// Runs submissions batch by batch, strictly in order.
pub struct BatchOrchestrator {
    pool: Arc<WorkerPool>,
    extractor: TextExtractor,
    blobs: Arc<dyn BlobStore>,
    evaluator: EvaluationClient,
    materializer: Arc<Materializer>,
    batch_size: usize,
    batch_delay: Duration,
    category: String,
}

impl BatchOrchestrator {
    pub fn new(
        pool: Arc<WorkerPool>,
        extractor: TextExtractor,
        blobs: Arc<dyn BlobStore>,
        evaluator: EvaluationClient,
        materializer: Arc<Materializer>,
    ) -> Self {
        let defaults = BatchConfig::default();
        Self {
            pool,
            extractor,
            blobs,
            evaluator,
            materializer,
            batch_size: defaults.size,
            batch_delay: defaults.delay(),
            category: "cv".to_string(),
        }
    }

    /// Batch size is clamped to `1..=MAX_BATCH_SIZE`.
    pub fn with_batching(mut self, config: &BatchConfig) -> Self {
        self.batch_size = config.size.clamp(1, MAX_BATCH_SIZE);
        self.batch_delay = config.delay();
        self
    }

    pub fn with_category(mut self, category: &str) -> Self {
        self.category = category.to_string();
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Processes every batch. A failed batch is recorded and the run moves on.
    pub async fn run(
        &self,
        submission: IntakeSubmission,
        progress: &dyn ProgressReporter,
    ) -> IntakeReport {
        let IntakeSubmission {
            company_id,
            company_name,
            offer_id,
            criteria,
            files,
        } = submission;

        let mut batches: Vec<Vec<SubmittedFile>> = Vec::new();
        let mut files = files.into_iter().peekable();
        while files.peek().is_some() {
            batches.push(files.by_ref().take(self.batch_size).collect());
        }
        let total = batches.len();
        log::info!(
            "Intake for offer {}: {} batches of up to {}",
            offer_id,
            total,
            self.batch_size
        );

        let mut report = IntakeReport::default();
        let context = BatchContext {
            company_id,
            company_name: &company_name,
            offer_id,
            criteria: &criteria,
            total,
        };

        for (i, batch) in batches.into_iter().enumerate() {
            let index = i + 1;
            let files = batch.len();
            let span = info_span!("batch", offer_id, index, total, files);

            let (outcome, persisted, unmatched, rejected) = self
                .run_batch(&context, index, batch, progress)
                .instrument(span)
                .await;

            if let BatchOutcome::Failed(error) = &outcome {
                log::error!("Batch {}/{} of offer {} failed: {}", index, total, offer_id, error);
                progress.report(ProgressEvent::BatchFailed {
                    batch: index,
                    error: error.clone(),
                });
            }

            report.rejected.extend(rejected);
            report.batches.push(BatchReport {
                index,
                files,
                persisted,
                unmatched,
                outcome,
            });

            if index < total && !self.batch_delay.is_zero() {
                progress.report(ProgressEvent::Phase {
                    batch: index,
                    total,
                    phase: BatchPhase::Waiting,
                    message: format!("waiting {:?} before the next batch", self.batch_delay),
                });
                tokio::time::sleep(self.batch_delay).await;
            }
        }

        progress.report(ProgressEvent::Phase {
            batch: total,
            total,
            phase: BatchPhase::Finished,
            message: report.summary(),
        });
        report
    }

    async fn run_batch(
        &self,
        context: &BatchContext<'_>,
        index: usize,
        files: Vec<SubmittedFile>,
        progress: &dyn ProgressReporter,
    ) -> (BatchOutcome, usize, usize, Vec<RejectedFile>) {
        let phase = |phase: BatchPhase, message: String| {
            progress.report(ProgressEvent::Phase {
                batch: index,
                total: context.total,
                phase,
                message,
            })
        };

        phase(BatchPhase::Extracting, format!("extracting {} files", files.len()));
        let prepared = join_all(files.into_iter().map(|file| self.prepare(context, file))).await;

        let mut documents = Vec::new();
        let mut rejected = Vec::new();
        let mut failure: Option<BatchError> = None;
        for item in prepared {
            match item {
                Ok(Prepared::Ready(doc)) => documents.push(doc),
                Ok(Prepared::Rejected(file)) => {
                    log::warn!("Rejected '{}': {}", file.filename, file.reason);
                    progress.report(ProgressEvent::FileRejected {
                        filename: file.filename.clone(),
                        reason: file.reason.clone(),
                    });
                    rejected.push(file);
                }
                Ok(Prepared::UploadFailed(e)) => {
                    if failure.is_none() {
                        failure = Some(e);
                    }
                }
                Err(e) => {
                    if failure.is_none() {
                        failure = Some(BatchError::Worker(e));
                    }
                }
            }
        }

        if let Some(e) = failure {
            self.discard(&documents);
            return (BatchOutcome::Failed(e.to_string()), 0, 0, rejected);
        }
        if documents.is_empty() {
            return (BatchOutcome::Empty, 0, 0, rejected);
        }

        phase(
            BatchPhase::Evaluating,
            format!("evaluating {} candidates", documents.len()),
        );
        let prompt = {
            let texts: Vec<&str> = documents.iter().map(|d| d.cv_text.as_str()).collect();
            build_evaluation_prompt(&texts, context.criteria)
        };
        let evaluations = match self.evaluator.evaluate(&prompt).await {
            Ok(evaluations) => evaluations,
            Err(e) => {
                self.discard(&documents);
                return (BatchOutcome::Failed(BatchError::from(e).to_string()), 0, 0, rejected);
            }
        };

        phase(BatchPhase::Saving, "saving results".to_string());
        let urls: Vec<String> = documents.iter().map(|d| d.url.clone()).collect();
        let materializer = Arc::clone(&self.materializer);
        let offer_id = context.offer_id;
        let saved = self
            .pool
            .execute(move || materializer.materialize(offer_id, documents, &evaluations))
            .await;

        match saved {
            Ok(Ok(outcome)) => (
                BatchOutcome::Committed,
                outcome.persisted.len(),
                outcome.unmatched.len(),
                rejected,
            ),
            // blobs were already deleted by the materializer
            Ok(Err(e)) => (BatchOutcome::Failed(BatchError::from(e).to_string()), 0, 0, rejected),
            Err(e) => {
                for url in &urls {
                    self.blobs.delete(url);
                }
                (BatchOutcome::Failed(BatchError::from(e).to_string()), 0, 0, rejected)
            }
        }
    }

    /// Extracts then uploads one file on the pool. Extraction rejections are
    /// per file; upload failures fail the batch.
    async fn prepare(
        &self,
        context: &BatchContext<'_>,
        file: SubmittedFile,
    ) -> Result<Prepared, crate::error::WorkerError> {
        let extractor = self.extractor.clone();
        let blobs = Arc::clone(&self.blobs);
        let key = blob_key(context.company_name, &self.category, &file.filename);
        let company_id = context.company_id;

        self.pool
            .execute(move || {
                let extension = file.extension().to_ascii_lowercase();
                let text = match extractor.extract(&file.bytes, &extension) {
                    Ok(text) => text,
                    Err(e) => return Prepared::Rejected(rejection(&file, e)),
                };

                match blobs.put(&file.bytes, &key) {
                    Ok(url) => Prepared::Ready(CandidateDocument::provisional(
                        company_id,
                        url,
                        &extension,
                        file.bytes.len(),
                        text,
                    )),
                    Err(e) => Prepared::UploadFailed(BatchError::Upload {
                        filename: file.filename,
                        source: e,
                    }),
                }
            })
            .await
    }

    fn discard(&self, documents: &[CandidateDocument]) {
        for doc in documents {
            self.blobs.delete(&doc.url);
        }
    }
}

struct BatchContext<'a> {
    company_id: i64,
    company_name: &'a str,
    offer_id: i64,
    criteria: &'a RequisitionCriteria,
    total: usize,
}

fn rejection(file: &SubmittedFile, error: ProcessError) -> RejectedFile {
    RejectedFile {
        filename: file.filename.clone(),
        reason: error.to_string(),
    }
}
