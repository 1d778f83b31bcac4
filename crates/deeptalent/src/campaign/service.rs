use std::sync::Arc;

use rusqlite::Connection;

use super::client::{CampaignApi, CampaignMessage};
use super::CampaignError;
use crate::db::vitae_offer_repo::{self, OutreachStatus};
use crate::db::{cvitae_repo, offer_repo, Database, DatabaseError};
use crate::materializer::PHONE_NOT_FOUND;
use crate::sanitize::redact_digits;
use crate::worker::WorkerPool;

/// Sends outreach for candidate links and keeps the offer counters in step.
pub struct CampaignService {
    api: Arc<dyn CampaignApi>,
    db: Database,
    pool: Arc<WorkerPool>,
}

impl CampaignService {
    pub fn new(api: Arc<dyn CampaignApi>, db: Database, pool: Arc<WorkerPool>) -> Self {
        Self { api, db, pool }
    }

    /// Messages the candidate of a link and returns the provider message id.
    ///
    /// The offer's `contacted` counter only moves when the link leaves
    /// `notsent`, so contacting the same candidate twice counts once.
    pub async fn contact_candidate(
        &self,
        vitae_offer_id: i64,
        tags: Vec<String>,
    ) -> Result<String, CampaignError> {
        let db = self.db.clone();
        let phone = self
            .pool
            .execute(move || db.with_conn(|conn| candidate_phone(conn, vitae_offer_id)))
            .await??
            .ok_or(CampaignError::LinkNotFound(vitae_offer_id))?
            .filter(|phone| phone != PHONE_NOT_FOUND && !phone.trim().is_empty())
            .ok_or(CampaignError::MissingPhone(vitae_offer_id))?;

        let message = CampaignMessage { phone, tags };
        log::debug!(
            "Sending campaign message for link {} to {}",
            vitae_offer_id,
            redact_digits(&message.phone)
        );
        let message_id = self.api.send(&message).await?;
        log::info!("Campaign message {} sent for link {}", message_id, vitae_offer_id);

        let db = self.db.clone();
        let stored_id = message_id.clone();
        self.pool
            .execute(move || {
                db.with_transaction(|tx| -> Result<(), CampaignError> {
                    let link = vitae_offer_repo::find(tx, vitae_offer_id)?
                        .ok_or(CampaignError::LinkNotFound(vitae_offer_id))?;
                    if link.whatsapp_status == OutreachStatus::NotSent {
                        offer_repo::increment_contacted(tx, link.offer_id)?;
                    }
                    vitae_offer_repo::record_campaign_send(tx, vitae_offer_id, &stored_id)?;
                    Ok(())
                })
            })
            .await??;

        Ok(message_id)
    }

    /// Records the candidate's answer to an outreach message.
    ///
    /// `interested` is counted once per link, however often it is reported.
    pub async fn record_reply(&self, vitae_offer_id: i64, interested: bool) -> Result<(), CampaignError> {
        let db = self.db.clone();
        self.pool
            .execute(move || {
                db.with_transaction(|tx| -> Result<(), CampaignError> {
                    let link = vitae_offer_repo::find(tx, vitae_offer_id)?
                        .ok_or(CampaignError::LinkNotFound(vitae_offer_id))?;
                    let status = if interested {
                        OutreachStatus::Interested
                    } else {
                        OutreachStatus::NotInterested
                    };
                    if status == link.whatsapp_status {
                        return Ok(());
                    }
                    if interested {
                        offer_repo::increment_interested(tx, link.offer_id)?;
                    }
                    vitae_offer_repo::set_outreach_status(tx, vitae_offer_id, status)?;
                    Ok(())
                })
            })
            .await?
    }
}

/// `None` when the link does not exist; `Some(None)` when it has no phone.
fn candidate_phone(conn: &Connection, vitae_offer_id: i64) -> Result<Option<Option<String>>, DatabaseError> {
    let Some(link) = vitae_offer_repo::find(conn, vitae_offer_id)? else {
        return Ok(None);
    };
    let doc = cvitae_repo::find(conn, link.cvitae_id)?;
    Ok(Some(doc.and_then(|d| d.candidate_phone)))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::db::company_repo;
    use crate::db::cvitae_repo::CandidateDocument;
    use crate::db::offer_repo::NewOffer;

    struct RecordingApi {
        sent: Mutex<Vec<CampaignMessage>>,
        fail: bool,
    }

    #[async_trait]
    impl CampaignApi for RecordingApi {
        async fn send(&self, message: &CampaignMessage) -> Result<String, CampaignError> {
            if self.fail {
                return Err(CampaignError::Unavailable("HTTP 503".to_string()));
            }
            let mut sent = self.sent.lock().unwrap();
            sent.push(message.clone());
            Ok(format!("msg-{}", sent.len()))
        }
    }

    struct Fixture {
        db: Database,
        offer_id: i64,
        link_id: i64,
    }

    fn fixture(phone: &str) -> Fixture {
        let db = Database::open_in_memory().unwrap();
        let (offer_id, link_id) = db
            .with_conn(|conn| {
                let company = company_repo::insert(conn, "Acme")?;
                let offer = offer_repo::insert(
                    conn,
                    &NewOffer {
                        company_id: company,
                        name: "Analista".to_string(),
                        ..NewOffer::default()
                    },
                )?;
                let mut doc = CandidateDocument {
                    candidate_phone: Some(phone.to_string()),
                    ..CandidateDocument::provisional(
                        company,
                        "https://cvs.example.com/acme/cv/ana.pdf".to_string(),
                        "pdf",
                        10,
                        "text".to_string(),
                    )
                };
                let cvitae = cvitae_repo::save(conn, &mut doc)?;
                let link = vitae_offer_repo::upsert_evaluation(conn, cvitae, offer, "{}", 7.0)?;
                Ok((offer, link.id()))
            })
            .unwrap();
        Fixture {
            db,
            offer_id,
            link_id,
        }
    }

    fn service(fx: &Fixture, fail: bool) -> (CampaignService, Arc<RecordingApi>) {
        let api = Arc::new(RecordingApi {
            sent: Mutex::new(Vec::new()),
            fail,
        });
        let pool = Arc::new(WorkerPool::new(1).unwrap());
        (CampaignService::new(api.clone(), fx.db.clone(), pool), api)
    }

    fn offer(fx: &Fixture) -> offer_repo::OfferRow {
        fx.db
            .with_conn(|conn| offer_repo::find(conn, fx.offer_id))
            .unwrap()
            .unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_contact_counts_once() {
        let fx = fixture("3001234567");
        let (service, api) = service(&fx, false);

        let first = service.contact_candidate(fx.link_id, vec!["Ana".to_string()]).await.unwrap();
        let second = service.contact_candidate(fx.link_id, vec!["Ana".to_string()]).await.unwrap();

        assert_eq!(first, "msg-1");
        assert_eq!(second, "msg-2");
        assert_eq!(api.sent.lock().unwrap().len(), 2);
        assert_eq!(offer(&fx).contacted, 1);

        let link = fx
            .db
            .with_conn(|conn| vitae_offer_repo::find(conn, fx.link_id))
            .unwrap()
            .unwrap();
        assert_eq!(link.whatsapp_status, OutreachStatus::PendingResponse);
        assert_eq!(link.smartdata_id.as_deref(), Some("msg-2"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_failed_send_records_nothing() {
        let fx = fixture("3001234567");
        let (service, _api) = service(&fx, true);

        let err = service.contact_candidate(fx.link_id, Vec::new()).await.unwrap_err();
        assert!(matches!(err, CampaignError::Unavailable(_)));
        assert_eq!(offer(&fx).contacted, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_missing_phone_and_link() {
        let fx = fixture(PHONE_NOT_FOUND);
        let (service, api) = service(&fx, false);

        assert!(matches!(
            service.contact_candidate(fx.link_id, Vec::new()).await,
            Err(CampaignError::MissingPhone(_))
        ));
        assert!(matches!(
            service.contact_candidate(fx.link_id + 50, Vec::new()).await,
            Err(CampaignError::LinkNotFound(_))
        ));
        assert!(api.sent.lock().unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_interested_reply_counted_once() {
        let fx = fixture("3001234567");
        let (service, _api) = service(&fx, false);
        service.contact_candidate(fx.link_id, Vec::new()).await.unwrap();

        service.record_reply(fx.link_id, true).await.unwrap();
        service.record_reply(fx.link_id, true).await.unwrap();

        assert_eq!(offer(&fx).interested, 1);
    }
}
