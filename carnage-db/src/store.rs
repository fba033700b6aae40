//! Shared handle over one SQLite connection.
//!
//! The pipeline, the persistence destination and the control surface all
//! hold the same [`MatchStore`] behind an `Arc`; the connection itself is
//! serialized with a mutex.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use carnage_core::{MatchRecord, PlayerRecord};
use rusqlite::Connection;
use thiserror::Error;

use crate::operations::{self, OperationError};
use crate::queries::{self, GameRow, MatchStats, ProcessingRecord};
use crate::schema::{self, SchemaError};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Operation(#[from] OperationError),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Operation(e) => e.is_transient(),
            StoreError::Schema(SchemaError::Sqlite(e)) => operations::sqlite_is_transient(e),
            StoreError::Schema(_) => false,
        }
    }
}

/// The processed-match ledger the pipeline consults before doing any work.
///
/// `exists` answers false for never-seen ids; `mark_processed` is idempotent.
pub trait DedupeStore: Send + Sync {
    fn exists(&self, match_id: &str) -> Result<bool, StoreError>;
    fn mark_processed(&self, match_id: &str, source_file: Option<&str>) -> Result<(), StoreError>;
}

pub struct MatchStore {
    conn: Mutex<Connection>,
}

impl MatchStore {
    /// Open (creating or migrating as needed) the database at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = schema::open_database(path)?;
        log::debug!("Opened match database at {}", path.display());
        Ok(Self::from_connection(conn))
    }

    /// In-memory database with the full schema.
    pub fn in_memory() -> Result<Self, StoreError> {
        Ok(Self::from_connection(schema::open_memory()?))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // A panic while holding the lock cannot leave a half-applied write
        // behind: every multi-statement write is a transaction.
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn upsert_game(&self, record: &MatchRecord) -> Result<(), StoreError> {
        operations::upsert_game(&self.conn(), record)?;
        Ok(())
    }

    pub fn upsert_players(&self, match_id: &str, players: &[PlayerRecord]) -> Result<usize, StoreError> {
        Ok(operations::upsert_players(&mut self.conn(), match_id, players)?)
    }

    pub fn game_exists(&self, match_id: &str) -> Result<bool, StoreError> {
        Ok(operations::game_exists(&self.conn(), match_id)?)
    }

    pub fn record_delivery(
        &self,
        match_id: &str,
        webhook_status: &str,
        session_status: &str,
        persisted: bool,
    ) -> Result<(), StoreError> {
        operations::record_delivery(&self.conn(), match_id, webhook_status, session_status, persisted)?;
        Ok(())
    }

    pub fn stats(&self) -> Result<MatchStats, StoreError> {
        Ok(queries::catalog_stats(&self.conn())?)
    }

    pub fn recent_games(&self, limit: usize) -> Result<Vec<GameRow>, StoreError> {
        Ok(queries::recent_games(&self.conn(), limit)?)
    }

    pub fn players_for_game(&self, match_id: &str) -> Result<Vec<PlayerRecord>, StoreError> {
        Ok(queries::players_for_game(&self.conn(), match_id)?)
    }

    pub fn processing_record(&self, match_id: &str) -> Result<Option<ProcessingRecord>, StoreError> {
        Ok(queries::processing_record(&self.conn(), match_id)?)
    }
}

impl DedupeStore for MatchStore {
    fn exists(&self, match_id: &str) -> Result<bool, StoreError> {
        Ok(operations::is_processed(&self.conn(), match_id)?)
    }

    fn mark_processed(&self, match_id: &str, source_file: Option<&str>) -> Result<(), StoreError> {
        operations::mark_processed(&self.conn(), match_id, source_file)?;
        Ok(())
    }
}
