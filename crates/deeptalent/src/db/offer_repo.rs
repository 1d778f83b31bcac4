//! Requisitions ("offers") and their lifecycle counters.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{company_repo, now_timestamp, to_bool, DatabaseError};
use crate::prompt::RequisitionCriteria;

#[derive(Debug, Clone, PartialEq)]
pub struct OfferRow {
    pub id: i64,
    pub company_id: i64,
    pub name: String,
    pub city: String,
    /// Accepted age range as entered, e.g. `"18-35"`.
    pub age: String,
    pub gender: String,
    pub experience_years: i64,
    pub skills: Vec<String>,
    pub zone: Option<String>,
    pub salary: Option<String>,
    pub contract: Option<String>,
    pub active: bool,
    pub contacted: i64,
    pub interested: i64,
}

impl OfferRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        let skills_json: String = row.get("skills")?;
        let skills = serde_json::from_str(&skills_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })?;

        Ok(Self {
            id: row.get("id")?,
            company_id: row.get("company_id")?,
            name: row.get("name")?,
            city: row.get("city")?,
            age: row.get("age")?,
            gender: row.get("gender")?,
            experience_years: row.get("experience_years")?,
            skills,
            zone: row.get("zone")?,
            salary: row.get("salary")?,
            contract: row.get("contract")?,
            active: to_bool(row.get("active")?),
            contacted: row.get("contacted")?,
            interested: row.get("interested")?,
        })
    }

    pub fn criteria(&self) -> RequisitionCriteria {
        RequisitionCriteria {
            city: self.city.clone(),
            age_range: self.age.clone(),
            gender: self.gender.clone(),
            min_experience_years: self.experience_years,
            skills: self.skills.clone(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewOffer {
    pub company_id: i64,
    pub name: String,
    pub city: String,
    pub age: String,
    pub gender: String,
    pub experience_years: i64,
    pub skills: Vec<String>,
    pub zone: Option<String>,
    pub salary: Option<String>,
    pub contract: Option<String>,
}

const SELECT_COLUMNS: &str = "id, company_id, name, city, age, gender, experience_years, skills,
     zone, salary, contract, active, contacted, interested";

/// Inserts an active offer and bumps the company's active-offer counter.
pub fn insert(conn: &Connection, offer: &NewOffer) -> Result<i64, DatabaseError> {
    let skills = serde_json::to_string(&offer.skills).map_err(|e| DatabaseError::InvalidColumn {
        column: "skills",
        value: e.to_string(),
    })?;
    let now = now_timestamp();

    conn.execute(
        "INSERT INTO offers (company_id, name, city, age, gender, experience_years, skills,
         zone, salary, contract, active, created_at, modified_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 1, ?11, ?11)",
        params![
            offer.company_id,
            offer.name,
            offer.city,
            offer.age,
            offer.gender,
            offer.experience_years,
            skills,
            offer.zone,
            offer.salary,
            offer.contract,
            now,
        ],
    )?;
    let id = conn.last_insert_rowid();
    company_repo::increment_active_offers(conn, offer.company_id)?;
    Ok(id)
}

pub fn find(conn: &Connection, id: i64) -> Result<Option<OfferRow>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {} FROM offers WHERE id = ?1", SELECT_COLUMNS),
            params![id],
            OfferRow::from_row,
        )
        .optional()?;
    Ok(row)
}

/// Flips an offer to inactive and decrements the company counter.
///
/// Only the actual active→inactive transition touches the counter, so a
/// retried deactivation is a no-op. Returns whether a transition happened.
pub fn deactivate(conn: &Connection, id: i64) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE offers SET active = 0, modified_at = ?2 WHERE id = ?1 AND active = 1",
        params![id, now_timestamp()],
    )?;
    if changed == 0 {
        return Ok(false);
    }

    let company_id: i64 = conn.query_row(
        "SELECT company_id FROM offers WHERE id = ?1",
        params![id],
        |r| r.get(0),
    )?;
    company_repo::decrement_active_offers(conn, company_id)?;
    Ok(true)
}

pub fn increment_contacted(conn: &Connection, id: i64) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE offers SET contacted = contacted + 1 WHERE id = ?1",
        params![id],
    )?;
    Ok(())
}

pub fn increment_interested(conn: &Connection, id: i64) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE offers SET interested = interested + 1 WHERE id = ?1",
        params![id],
    )?;
    Ok(())
}
