//! Turns provisional candidate documents plus their evaluations into durable
//! records, one transaction per batch.

use std::sync::Arc;

use rusqlite::Connection;
use thiserror::Error;

use crate::db::cvitae_repo::{self, CandidateDocument};
use crate::db::vitae_offer_repo::{self, UpsertOutcome};
use crate::db::{Database, DatabaseError};
use crate::evaluation::CandidateEvaluation;
use crate::storage::BlobStore;

pub const NAME_NOT_FOUND: &str = "name not found";
pub const ID_NOT_FOUND: &str = "id not found";
pub const ID_TYPE_NOT_FOUND: &str = "id type not found";
pub const CITY_NOT_FOUND: &str = "city not found";
pub const PHONE_NOT_FOUND: &str = "phone not found";
pub const EMAIL_NOT_FOUND: &str = "email not found";

#[derive(Error, Debug)]
pub enum MaterializeError {
    #[error("Failed to persist batch: {0}")]
    Database(#[from] DatabaseError),
}

/// A candidate that made it into the database.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterializedCandidate {
    pub cvitae_id: i64,
    pub link: UpsertOutcome,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaterializeOutcome {
    pub persisted: Vec<MaterializedCandidate>,
    /// Blob URLs of trailing candidates the model returned no entry for.
    pub unmatched: Vec<String>,
}

/// Copies the evaluated personal fields onto the document.
///
/// Each field is set from its evaluation counterpart or from its sentinel.
/// Nothing else on the document is touched.
pub fn apply_evaluation(doc: &mut CandidateDocument, evaluation: &CandidateEvaluation) {
    doc.candidate_name = Some(or_sentinel(&evaluation.nombre, NAME_NOT_FOUND));
    doc.candidate_dni = Some(or_sentinel(&evaluation.cedula, ID_NOT_FOUND));
    doc.candidate_dni_type = Some(or_sentinel(&evaluation.tipo_documento, ID_TYPE_NOT_FOUND));
    doc.candidate_city = Some(or_sentinel(&evaluation.ciudad, CITY_NOT_FOUND));
    doc.candidate_phone = Some(or_sentinel(&evaluation.movil, PHONE_NOT_FOUND));
    doc.candidate_mail = Some(or_sentinel(&evaluation.correo, EMAIL_NOT_FOUND));
}

fn or_sentinel(value: &Option<String>, sentinel: &str) -> String {
    value.clone().unwrap_or_else(|| sentinel.to_string())
}

pub struct Materializer {
    db: Database,
    blobs: Arc<dyn BlobStore>,
}

impl Materializer {
    pub fn new(db: Database, blobs: Arc<dyn BlobStore>) -> Self {
        Self { db, blobs }
    }

    /// Persists a batch. Blocking; run it on the worker pool.
    ///
    /// Candidates and evaluations are paired by position. If any write fails
    /// the transaction rolls back and every blob of the batch is deleted.
    pub fn materialize(
        &self,
        offer_id: i64,
        candidates: Vec<CandidateDocument>,
        evaluations: &[CandidateEvaluation],
    ) -> Result<MaterializeOutcome, MaterializeError> {
        let _span = tracing::info_span!("materialize", offer_id, batch = candidates.len()).entered();

        let urls: Vec<String> = candidates.iter().map(|c| c.url.clone()).collect();
        let aligned = candidates.len().min(evaluations.len());
        let mut candidates = candidates;
        let unmatched: Vec<CandidateDocument> = candidates.split_off(aligned);

        let result = self.db.with_transaction(|tx| -> Result<_, MaterializeError> {
            candidates
                .into_iter()
                .zip(evaluations)
                .map(|(doc, evaluation)| persist_one(tx, offer_id, doc, evaluation))
                .collect::<Result<Vec<_>, _>>()
        });

        let persisted = match result {
            Ok(persisted) => persisted,
            Err(e) => {
                log::error!(
                    "Batch for offer {} rolled back, deleting {} blobs: {}",
                    offer_id,
                    urls.len(),
                    e
                );
                for url in &urls {
                    self.blobs.delete(url);
                }
                return Err(e);
            }
        };

        if !unmatched.is_empty() {
            log::warn!(
                "Model returned {} evaluations for {} candidates, dropping {} unmatched",
                evaluations.len(),
                urls.len(),
                unmatched.len()
            );
        }
        let unmatched: Vec<String> = unmatched.into_iter().map(|doc| doc.url).collect();
        for url in &unmatched {
            self.blobs.delete(url);
        }

        log::info!("Persisted {} candidates for offer {}", persisted.len(), offer_id);
        Ok(MaterializeOutcome {
            persisted,
            unmatched,
        })
    }
}

fn persist_one(
    conn: &Connection,
    offer_id: i64,
    mut doc: CandidateDocument,
    evaluation: &CandidateEvaluation,
) -> Result<MaterializedCandidate, MaterializeError> {
    apply_evaluation(&mut doc, evaluation);
    let cvitae_id = cvitae_repo::save(conn, &mut doc)?;
    let link = vitae_offer_repo::upsert_evaluation(
        conn,
        cvitae_id,
        offer_id,
        &evaluation.rationale(),
        evaluation.score.unwrap_or(0.0),
    )?;
    Ok(MaterializedCandidate {
        cvitae_id,
        link,
        url: doc.url,
    })
}
