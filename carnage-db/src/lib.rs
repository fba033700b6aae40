//! SQLite persistence for played matches.
//!
//! Provides schema creation and migration, idempotent upserts for games and
//! player lines, the processed-match ledger used for dedupe, and a few read
//! queries for status reporting. Backed by SQLite (via rusqlite with the
//! bundled feature).

pub mod operations;
pub mod queries;
pub mod schema;
pub mod store;

pub use operations::{
    OperationError, PLAYED_AT_FORMAT, game_exists, is_processed, mark_processed,
    record_delivery, upsert_game, upsert_players,
};
pub use queries::{
    GameRow, MatchStats, ProcessingRecord, catalog_stats, players_for_game, processing_record,
    recent_games,
};
pub use schema::{SchemaError, open_database, open_memory};
pub use store::{DedupeStore, MatchStore, StoreError};
