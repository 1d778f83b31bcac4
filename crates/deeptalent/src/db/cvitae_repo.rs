//! Candidate documents ("cvitae").

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{now_timestamp, to_bool, DatabaseError};

/// One submitted résumé file plus what was extracted from it.
///
/// `id` is `None` while the document is provisional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateDocument {
    pub id: Option<i64>,
    pub company_id: i64,
    pub url: String,
    pub size: i64,
    pub extension: String,
    pub cv_text: String,
    pub active: bool,
    pub candidate_dni: Option<String>,
    pub candidate_dni_type: Option<String>,
    pub candidate_name: Option<String>,
    pub candidate_phone: Option<String>,
    pub candidate_mail: Option<String>,
    pub candidate_city: Option<String>,
    pub background_check: Option<String>,
    pub background_date: Option<String>,
    pub tusdatos_id: Option<String>,
}

impl CandidateDocument {
    /// A provisional document: stored blob and text, no personal fields yet.
    pub fn provisional(company_id: i64, url: String, extension: &str, size: usize, text: String) -> Self {
        Self {
            company_id,
            url,
            size: size as i64,
            extension: extension.to_ascii_lowercase(),
            cv_text: text,
            active: true,
            ..Self::default()
        }
    }

    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: Some(row.get("id")?),
            company_id: row.get("company_id")?,
            url: row.get("url")?,
            size: row.get("size")?,
            extension: row.get("extension")?,
            cv_text: row.get("cv_text")?,
            active: to_bool(row.get("active")?),
            candidate_dni: row.get("candidate_dni")?,
            candidate_dni_type: row.get("candidate_dni_type")?,
            candidate_name: row.get("candidate_name")?,
            candidate_phone: row.get("candidate_phone")?,
            candidate_mail: row.get("candidate_mail")?,
            candidate_city: row.get("candidate_city")?,
            background_check: row.get("background_check")?,
            background_date: row.get("background_date")?,
            tusdatos_id: row.get("tusdatos_id")?,
        })
    }
}

const SELECT_COLUMNS: &str = "id, company_id, url, size, extension, cv_text, active,
     candidate_dni, candidate_dni_type, candidate_name, candidate_phone, candidate_mail,
     candidate_city, background_check, background_date, tusdatos_id";

pub fn insert(conn: &Connection, doc: &CandidateDocument) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO cvitae (company_id, url, size, extension, cv_text, active,
         candidate_dni, candidate_dni_type, candidate_name, candidate_phone, candidate_mail,
         candidate_city, background_check, background_date, tusdatos_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
        params![
            doc.company_id,
            doc.url,
            doc.size,
            doc.extension,
            doc.cv_text,
            doc.active,
            doc.candidate_dni,
            doc.candidate_dni_type,
            doc.candidate_name,
            doc.candidate_phone,
            doc.candidate_mail,
            doc.candidate_city,
            doc.background_check,
            doc.background_date,
            doc.tusdatos_id,
            now_timestamp(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Overwrites every column except `id`, `company_id` and `created_at`.
pub fn update(conn: &Connection, id: i64, doc: &CandidateDocument) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE cvitae SET url=?2, size=?3, extension=?4, cv_text=?5, active=?6,
         candidate_dni=?7, candidate_dni_type=?8, candidate_name=?9, candidate_phone=?10,
         candidate_mail=?11, candidate_city=?12, background_check=?13, background_date=?14,
         tusdatos_id=?15
         WHERE id=?1",
        params![
            id,
            doc.url,
            doc.size,
            doc.extension,
            doc.cv_text,
            doc.active,
            doc.candidate_dni,
            doc.candidate_dni_type,
            doc.candidate_name,
            doc.candidate_phone,
            doc.candidate_mail,
            doc.candidate_city,
            doc.background_check,
            doc.background_date,
            doc.tusdatos_id,
        ],
    )?;
    Ok(())
}

/// Inserts a provisional document or updates a stored one; fills in `id`.
pub fn save(conn: &Connection, doc: &mut CandidateDocument) -> Result<i64, DatabaseError> {
    match doc.id {
        Some(id) => {
            update(conn, id, doc)?;
            Ok(id)
        }
        None => {
            let id = insert(conn, doc)?;
            doc.id = Some(id);
            Ok(id)
        }
    }
}

pub fn find(conn: &Connection, id: i64) -> Result<Option<CandidateDocument>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {} FROM cvitae WHERE id = ?1", SELECT_COLUMNS),
            params![id],
            CandidateDocument::from_row,
        )
        .optional()?;
    Ok(row)
}

pub fn count(conn: &Connection) -> Result<u64, DatabaseError> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM cvitae", [], |r| r.get(0))?;
    Ok(count as u64)
}

/// Writes a background-check observation. Touches only the verdict columns.
pub fn set_background_check(
    conn: &Connection,
    id: i64,
    verdict: &str,
    checked_at: &str,
) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE cvitae SET background_check = ?2, background_date = ?3 WHERE id = ?1",
        params![id, verdict, checked_at],
    )?;
    Ok(changed > 0)
}

pub fn set_tusdatos_id(conn: &Connection, id: i64, job_id: &str) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE cvitae SET tusdatos_id = ?2 WHERE id = ?1",
        params![id, job_id],
    )?;
    Ok(changed > 0)
}
