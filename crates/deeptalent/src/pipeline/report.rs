use super::error::PipelineError;

#[derive(Debug, Clone, PartialEq)]
pub struct RejectedFile {
    pub filename: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome {
    Committed,
    /// Every file of the batch was rejected before evaluation.
    Empty,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    /// 1-based position in submission order.
    pub index: usize,
    pub files: usize,
    pub persisted: usize,
    pub unmatched: usize,
    pub outcome: BatchOutcome,
}

/// Result of one intake run across all of its batches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntakeReport {
    pub batches: Vec<BatchReport>,
    pub rejected: Vec<RejectedFile>,
}

impl IntakeReport {
    pub fn persisted(&self) -> usize {
        self.batches.iter().map(|b| b.persisted).sum()
    }

    pub fn failed_batches(&self) -> impl Iterator<Item = &BatchReport> {
        self.batches
            .iter()
            .filter(|b| matches!(b.outcome, BatchOutcome::Failed(_)))
    }

    pub fn summary(&self) -> String {
        let mut summary = format!(
            "{} candidates saved from {} batches",
            self.persisted(),
            self.batches.len()
        );
        if !self.rejected.is_empty() {
            summary.push_str(&format!(", {} files rejected", self.rejected.len()));
        }
        let unmatched: usize = self.batches.iter().map(|b| b.unmatched).sum();
        if unmatched > 0 {
            summary.push_str(&format!(", {} candidates without evaluation", unmatched));
        }
        summary
    }

    /// `Ok` with the summary when every batch committed or was empty.
    pub fn into_result(self) -> Result<String, PipelineError> {
        let failures: Vec<String> = self
            .failed_batches()
            .filter_map(|b| match &b.outcome {
                BatchOutcome::Failed(reason) => Some(format!("batch {}: {}", b.index, reason)),
                _ => None,
            })
            .collect();

        if failures.is_empty() {
            Ok(self.summary())
        } else {
            Err(PipelineError::BatchesFailed(failures))
        }
    }
}
