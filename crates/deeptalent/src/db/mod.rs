//! Relational persistence for companies, requisitions, candidate documents
//! and their links.
//!
//! A single rusqlite connection sits behind a `Mutex`. Repository functions
//! take a plain `&Connection` so they run the same inside or outside of
//! [`Database::with_transaction`].

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::{Connection, Transaction};

pub mod company_repo;
pub mod cvitae_repo;
pub mod error;
pub mod migrations;
pub mod offer_repo;
pub mod vitae_offer_repo;

pub use error::DatabaseError;

/// Thread-safe database handle. Cloning shares the connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens (or creates) the database at `path` and runs pending migrations.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DatabaseError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;

        migrations::run_all(&conn)?;

        log::info!("Database opened at {}", path.display());

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        migrations::run_all(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// A panic while the lock was held leaves the connection usable: any open
    /// transaction was rolled back when it dropped during unwinding.
    fn lock(&self) -> MutexGuard<'_, Connection> {
        match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Database lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Locked access to the connection; each statement autocommits.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&Connection) -> Result<T, DatabaseError>,
    {
        let conn = self.lock();
        f(&conn)
    }

    /// Runs `f` in one transaction: committed on `Ok`, rolled back on `Err`.
    ///
    /// The error type is the caller's so domain errors can abort the
    /// transaction too.
    pub fn with_transaction<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, E>,
        E: From<DatabaseError>,
    {
        let mut conn = self.lock();
        let tx = conn.transaction().map_err(DatabaseError::from)?;

        match f(&tx) {
            Ok(value) => {
                tx.commit().map_err(DatabaseError::from)?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback() {
                    log::error!("Rollback failed: {}", rollback_err);
                }
                Err(e)
            }
        }
    }
}

/// Returns the canonical database path: `~/.deeptalent/data/deeptalent.db`.
pub fn default_database_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".deeptalent").join("data").join("deeptalent.db"))
}

pub(crate) fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

pub(crate) fn to_bool(value: i64) -> bool {
    value != 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count_companies(db: &Database) -> u32 {
        db.with_conn(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM company", [], |r| r.get(0))?)
        })
        .unwrap()
    }

    #[test]
    fn test_open_file_db() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("test.db");
        let db = Database::open(&path).unwrap();
        db.with_conn(|conn| {
            let count: u32 =
                conn.query_row("SELECT COUNT(*) FROM _migrations", [], |r| r.get(0))?;
            assert!(count > 0);
            Ok(())
        })
        .unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_default_database_path() {
        let path = default_database_path().unwrap();
        assert!(path.ends_with("deeptalent.db"));
        assert!(path.to_string_lossy().contains(".deeptalent"));
    }

    #[test]
    fn test_transaction_commits_on_ok() {
        let db = Database::open_in_memory().unwrap();
        db.with_transaction(|tx| -> Result<(), DatabaseError> {
            company_repo::insert(tx, "Acme")?;
            Ok(())
        })
        .unwrap();
        assert_eq!(count_companies(&db), 1);
    }

    #[test]
    fn test_transaction_rolls_back_on_err() {
        let db = Database::open_in_memory().unwrap();
        let result = db.with_transaction(|tx| -> Result<(), DatabaseError> {
            company_repo::insert(tx, "Acme")?;
            Err(DatabaseError::InvalidColumn {
                column: "name",
                value: "forced".to_string(),
            })
        });
        assert!(result.is_err());
        assert_eq!(count_companies(&db), 0);
    }

    #[test]
    fn test_panic_in_transaction_does_not_poison_later_calls() {
        let db = Database::open_in_memory().unwrap();
        let panicked = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = db.with_transaction(|tx| -> Result<(), DatabaseError> {
                company_repo::insert(tx, "Acme")?;
                panic!("materializer bug");
            });
        }));
        assert!(panicked.is_err());

        assert_eq!(count_companies(&db), 0);
        db.with_transaction(|tx| -> Result<(), DatabaseError> {
            company_repo::insert(tx, "Globex")?;
            Ok(())
        })
        .unwrap();
        assert_eq!(count_companies(&db), 1);
    }

    #[test]
    fn test_database_is_clone() {
        let db = Database::open_in_memory().unwrap();
        let db2 = db.clone();
        db.with_conn(|conn| company_repo::insert(conn, "Acme").map(|_| ()))
            .unwrap();
        assert_eq!(count_companies(&db2), 1);
    }
}
