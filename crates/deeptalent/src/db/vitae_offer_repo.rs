//! Candidate-requisition links ("vitae_offer"): evaluation results and
//! outreach state per (document, offer) pair.

use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use super::{now_timestamp, DatabaseError};

/// Reviewer comments are capped at this many characters.
pub const MAX_COMMENT_LEN: usize = 160;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    Pending,
    Hired,
    ErrorProcessing,
    Rejected,
}

impl LinkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkStatus::Pending => "pending",
            LinkStatus::Hired => "hired",
            LinkStatus::ErrorProcessing => "error_processing",
            LinkStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for LinkStatus {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(LinkStatus::Pending),
            "hired" => Ok(LinkStatus::Hired),
            "error_processing" => Ok(LinkStatus::ErrorProcessing),
            "rejected" => Ok(LinkStatus::Rejected),
            other => Err(DatabaseError::InvalidColumn {
                column: "status",
                value: other.to_string(),
            }),
        }
    }
}

/// Messaging-campaign state of a link.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutreachStatus {
    #[serde(rename = "notsent")]
    NotSent,
    PendingResponse,
    Interested,
    NotInterested,
}

impl OutreachStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutreachStatus::NotSent => "notsent",
            OutreachStatus::PendingResponse => "pending_response",
            OutreachStatus::Interested => "interested",
            OutreachStatus::NotInterested => "not_interested",
        }
    }
}

impl FromStr for OutreachStatus {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "notsent" => Ok(OutreachStatus::NotSent),
            "pending_response" => Ok(OutreachStatus::PendingResponse),
            "interested" => Ok(OutreachStatus::Interested),
            "not_interested" => Ok(OutreachStatus::NotInterested),
            other => Err(DatabaseError::InvalidColumn {
                column: "whatsapp_status",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VitaeOfferRow {
    pub id: i64,
    pub cvitae_id: i64,
    pub offer_id: i64,
    pub status: LinkStatus,
    pub ai_response: Option<String>,
    pub response_score: f64,
    pub whatsapp_status: OutreachStatus,
    pub smartdata_id: Option<String>,
    pub comments: Option<String>,
    pub created_date: String,
    pub modified_date: String,
}

fn parse_column<T: FromStr<Err = DatabaseError>>(
    index: usize,
    value: String,
) -> Result<T, rusqlite::Error> {
    value.parse().map_err(|e: DatabaseError| {
        rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, Box::new(e))
    })
}

impl VitaeOfferRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            cvitae_id: row.get("cvitae_id")?,
            offer_id: row.get("offer_id")?,
            status: parse_column(3, row.get("status")?)?,
            ai_response: row.get("ai_response")?,
            response_score: row.get("response_score")?,
            whatsapp_status: parse_column(6, row.get("whatsapp_status")?)?,
            smartdata_id: row.get("smartdata_id")?,
            comments: row.get("comments")?,
            created_date: row.get("created_date")?,
            modified_date: row.get("modified_date")?,
        })
    }
}

const SELECT_COLUMNS: &str = "id, cvitae_id, offer_id, status, ai_response, response_score,
     whatsapp_status, smartdata_id, comments, created_date, modified_date";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created(i64),
    Updated(i64),
}

impl UpsertOutcome {
    pub fn id(&self) -> i64 {
        match self {
            UpsertOutcome::Created(id) | UpsertOutcome::Updated(id) => *id,
        }
    }
}

pub fn find(conn: &Connection, id: i64) -> Result<Option<VitaeOfferRow>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {} FROM vitae_offer WHERE id = ?1", SELECT_COLUMNS),
            params![id],
            VitaeOfferRow::from_row,
        )
        .optional()?;
    Ok(row)
}

pub fn find_by_pair(
    conn: &Connection,
    cvitae_id: i64,
    offer_id: i64,
) -> Result<Option<VitaeOfferRow>, DatabaseError> {
    let row = conn
        .query_row(
            &format!(
                "SELECT {} FROM vitae_offer WHERE cvitae_id = ?1 AND offer_id = ?2",
                SELECT_COLUMNS
            ),
            params![cvitae_id, offer_id],
            VitaeOfferRow::from_row,
        )
        .optional()?;
    Ok(row)
}

pub fn list_for_offer(conn: &Connection, offer_id: i64) -> Result<Vec<VitaeOfferRow>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM vitae_offer WHERE offer_id = ?1 ORDER BY id",
        SELECT_COLUMNS
    ))?;
    let rows = stmt
        .query_map(params![offer_id], VitaeOfferRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Records an evaluation for the pair.
///
/// A new link starts `pending`; an existing one gets its rationale and score
/// overwritten and its status reset to `pending`. Outreach state is kept.
pub fn upsert_evaluation(
    conn: &Connection,
    cvitae_id: i64,
    offer_id: i64,
    ai_response: &str,
    score: f64,
) -> Result<UpsertOutcome, DatabaseError> {
    let now = now_timestamp();

    if let Some(existing) = find_by_pair(conn, cvitae_id, offer_id)? {
        conn.execute(
            "UPDATE vitae_offer SET ai_response = ?2, response_score = ?3, status = ?4,
             modified_date = ?5 WHERE id = ?1",
            params![
                existing.id,
                ai_response,
                score,
                LinkStatus::Pending.as_str(),
                now
            ],
        )?;
        return Ok(UpsertOutcome::Updated(existing.id));
    }

    conn.execute(
        "INSERT INTO vitae_offer (cvitae_id, offer_id, status, ai_response, response_score,
         whatsapp_status, created_date, modified_date)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
        params![
            cvitae_id,
            offer_id,
            LinkStatus::Pending.as_str(),
            ai_response,
            score,
            OutreachStatus::NotSent.as_str(),
            now
        ],
    )?;
    Ok(UpsertOutcome::Created(conn.last_insert_rowid()))
}

/// Reviewer update. Absent fields leave the stored value untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LinkReview {
    #[serde(default)]
    pub status: Option<LinkStatus>,
    #[serde(default)]
    pub comments: Option<String>,
}

/// Field-by-field merge of a review onto a stored link.
pub fn merge_review(mut row: VitaeOfferRow, review: &LinkReview) -> VitaeOfferRow {
    if let Some(status) = review.status {
        row.status = status;
    }
    if let Some(comments) = &review.comments {
        row.comments = Some(comments.chars().take(MAX_COMMENT_LEN).collect());
    }
    row
}

pub fn apply_review(
    conn: &Connection,
    id: i64,
    review: &LinkReview,
) -> Result<Option<VitaeOfferRow>, DatabaseError> {
    let Some(existing) = find(conn, id)? else {
        return Ok(None);
    };
    let merged = merge_review(existing, review);
    conn.execute(
        "UPDATE vitae_offer SET status = ?2, comments = ?3, modified_date = ?4 WHERE id = ?1",
        params![merged.id, merged.status.as_str(), merged.comments, now_timestamp()],
    )?;
    find(conn, id)
}

/// Stores the campaign message id and marks the link as awaiting a reply.
pub fn record_campaign_send(
    conn: &Connection,
    id: i64,
    message_id: &str,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE vitae_offer SET smartdata_id = ?2, whatsapp_status = ?3, modified_date = ?4
         WHERE id = ?1",
        params![
            id,
            message_id,
            OutreachStatus::PendingResponse.as_str(),
            now_timestamp()
        ],
    )?;
    Ok(())
}

pub fn set_outreach_status(
    conn: &Connection,
    id: i64,
    status: OutreachStatus,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE vitae_offer SET whatsapp_status = ?2, modified_date = ?3 WHERE id = ?1",
        params![id, status.as_str(), now_timestamp()],
    )?;
    Ok(())
}

pub fn count(conn: &Connection) -> Result<u64, DatabaseError> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM vitae_offer", [], |r| r.get(0))?;
    Ok(count as u64)
}
