//! Company repository: owners of requisitions and candidate documents.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{now_timestamp, DatabaseError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanyRow {
    pub id: i64,
    pub name: String,
    pub active_offers: i64,
    pub available_offers: i64,
}

impl CompanyRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            active_offers: row.get("active_offers")?,
            available_offers: row.get("available_offers")?,
        })
    }
}

pub fn insert(conn: &Connection, name: &str) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO company (name, created_at) VALUES (?1, ?2)",
        params![name, now_timestamp()],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn find(conn: &Connection, id: i64) -> Result<Option<CompanyRow>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, name, active_offers, available_offers FROM company WHERE id = ?1",
            params![id],
            CompanyRow::from_row,
        )
        .optional()?;
    Ok(row)
}

pub fn increment_active_offers(conn: &Connection, id: i64) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE company SET active_offers = active_offers + 1 WHERE id = ?1",
        params![id],
    )?;
    Ok(())
}

/// Decrements the active-offer counter, never below zero.
pub fn decrement_active_offers(conn: &Connection, id: i64) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE company SET active_offers = MAX(0, active_offers - 1) WHERE id = ?1",
        params![id],
    )?;
    Ok(())
}
