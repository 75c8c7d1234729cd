pub mod rest;

use crate::error::StoreError;
use crate::models::{NewRaceRow, RaceKey, RaceRecord};
use async_trait::async_trait;
use duckdb::{params, Connection};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::info;

pub use rest::RestStore;

// ── Store trait ───────────────────────────────────────────────────────────────

/// The `races` relation as the crawler sees it: look up by (name, date),
/// insert new rows. Existing rows are never updated.
#[async_trait]
pub trait RaceStore: Send + Sync {
    async fn exists(&self, key: &RaceKey) -> Result<bool, StoreError>;
    async fn insert(&self, race: &RaceRecord) -> Result<(), StoreError>;
}

// ── Schema ────────────────────────────────────────────────────────────────────

// No unique constraint on (name, date): the crawler checks before inserting.
const DDL: &str = r#"
CREATE SEQUENCE IF NOT EXISTS races_id_seq START 1;

CREATE TABLE IF NOT EXISTS races (
    id                INTEGER PRIMARY KEY DEFAULT nextval('races_id_seq'),
    name              VARCHAR NOT NULL,
    date              DATE    NOT NULL,
    location          VARCHAR NOT NULL DEFAULT '',
    distance          VARCHAR NOT NULL DEFAULT '',
    registration_url  VARCHAR,
    organizer         VARCHAR,
    created_at        TIMESTAMP NOT NULL DEFAULT current_timestamp
);
"#;

const INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_races_name_date ON races (name, date);
"#;

// ── Repository (local DuckDB store) ───────────────────────────────────────────

pub struct Repository {
    conn: Mutex<Connection>,
}

impl Repository {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let repo = Self { conn: Mutex::new(Connection::open(path)?) };
        repo.run_migrations()?;
        Ok(repo)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let repo = Self { conn: Mutex::new(Connection::open_in_memory()?) };
        repo.run_migrations()?;
        Ok(repo)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    pub fn run_migrations(&self) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute_batch(DDL)?;
        conn.execute_batch(INDEXES)?;
        info!("races schema ready");
        Ok(())
    }

    pub fn race_count(&self) -> Result<i64, StoreError> {
        let conn = self.conn()?;
        Ok(conn.query_row("SELECT COUNT(*) FROM races", [], |r| r.get(0))?)
    }
}

#[async_trait]
impl RaceStore for Repository {
    async fn exists(&self, key: &RaceKey) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM races WHERE name = ? AND date = ?",
            params![key.name, key.date],
            |r| r.get(0),
        )?;
        Ok(n > 0)
    }

    async fn insert(&self, race: &RaceRecord) -> Result<(), StoreError> {
        let row = NewRaceRow::from(race);
        let conn = self.conn()?;
        conn.execute(
            r#"INSERT INTO races (name, date, location, distance, registration_url, organizer)
               VALUES (?, ?, ?, ?, ?, ?)"#,
            params![
                row.name,
                row.date,
                row.location,
                row.distance,
                row.registration_url,
                row.organizer,
            ],
        )?;
        Ok(())
    }
}
