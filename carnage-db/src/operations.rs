//! Write operations for matches, players and processing records.
//!
//! Every write is an upsert on the natural key, so replaying the same match
//! leaves the database in the same state as a single call.

use carnage_core::{MatchRecord, PlayerRecord};
use rusqlite::{Connection, ErrorCode, params};
use thiserror::Error;

/// Storage format for `played_at`. Sorts lexically in time order.
pub const PLAYED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Error)]
pub enum OperationError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl OperationError {
    pub fn is_transient(&self) -> bool {
        match self {
            OperationError::Sqlite(e) => sqlite_is_transient(e),
        }
    }
}

/// Busy or locked database: another writer holds the file, retrying later may succeed.
pub fn sqlite_is_transient(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(f, _)
            if matches!(f.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    )
}

// ── Game Operations ─────────────────────────────────────────────────────────

/// Insert or update the game row of a match. Last writer wins on every
/// non-key column.
pub fn upsert_game(conn: &Connection, record: &MatchRecord) -> Result<(), OperationError> {
    conn.execute(
        "INSERT INTO games (match_id, game_enum, is_ranked, teams_enabled, hopper_name,
             mode_name, map_name, played_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(match_id) DO UPDATE SET
             game_enum = excluded.game_enum,
             is_ranked = excluded.is_ranked,
             teams_enabled = excluded.teams_enabled,
             hopper_name = excluded.hopper_name,
             mode_name = excluded.mode_name,
             map_name = excluded.map_name,
             played_at = excluded.played_at,
             updated_at = datetime('now')",
        params![
            record.match_id,
            record.game_enum,
            record.is_ranked,
            record.teams_enabled,
            record.hopper_name,
            record.mode_name,
            record.map_name,
            record.played_at.format(PLAYED_AT_FORMAT).to_string(),
        ],
    )?;
    Ok(())
}

/// Whether a game row exists for `match_id`.
pub fn game_exists(conn: &Connection, match_id: &str) -> Result<bool, OperationError> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM games WHERE match_id = ?1)",
        params![match_id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

// ── Player Operations ───────────────────────────────────────────────────────

/// Replace the player lines of a match.
///
/// Players are keyed by their position in the report. Runs in one
/// transaction; slots beyond the new player count are removed so a shorter
/// replay does not leave stale rows behind.
pub fn upsert_players(
    conn: &mut Connection,
    match_id: &str,
    players: &[PlayerRecord],
) -> Result<usize, OperationError> {
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO players (match_id, slot, xbox_user_id, display_name, clan_tag,
                 service_id, team_id, score, standing, kills, deaths, assists,
                 betrayals, suicides, best_streak)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
             ON CONFLICT(match_id, slot) DO UPDATE SET
                 xbox_user_id = excluded.xbox_user_id,
                 display_name = excluded.display_name,
                 clan_tag = excluded.clan_tag,
                 service_id = excluded.service_id,
                 team_id = excluded.team_id,
                 score = excluded.score,
                 standing = excluded.standing,
                 kills = excluded.kills,
                 deaths = excluded.deaths,
                 assists = excluded.assists,
                 betrayals = excluded.betrayals,
                 suicides = excluded.suicides,
                 best_streak = excluded.best_streak",
        )?;
        for (slot, p) in players.iter().enumerate() {
            stmt.execute(params![
                match_id,
                slot as i64,
                p.xbox_user_id,
                p.display_name,
                p.clan_tag,
                p.service_id,
                p.team_id,
                p.score,
                p.standing,
                p.kills,
                p.deaths,
                p.assists,
                p.betrayals,
                p.suicides,
                p.best_streak,
            ])?;
        }
    }
    tx.execute(
        "DELETE FROM players WHERE match_id = ?1 AND slot >= ?2",
        params![match_id, players.len() as i64],
    )?;
    tx.commit()?;
    Ok(players.len())
}

// ── Processing Records ──────────────────────────────────────────────────────

/// Whether the pipeline has already recorded `match_id` as processed.
pub fn is_processed(conn: &Connection, match_id: &str) -> Result<bool, OperationError> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM processing WHERE match_id = ?1)",
        params![match_id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// Record `match_id` as processed. Calling it again for the same id is not
/// an error; only the source file and timestamp are refreshed.
pub fn mark_processed(
    conn: &Connection,
    match_id: &str,
    source_file: Option<&str>,
) -> Result<(), OperationError> {
    conn.execute(
        "INSERT INTO processing (match_id, source_file)
         VALUES (?1, ?2)
         ON CONFLICT(match_id) DO UPDATE SET
             source_file = COALESCE(excluded.source_file, processing.source_file),
             updated_at = datetime('now')",
        params![match_id, source_file],
    )?;
    Ok(())
}

/// Store the per-destination outcome of a delivery.
///
/// Creates the processing row when it does not exist yet.
pub fn record_delivery(
    conn: &Connection,
    match_id: &str,
    webhook_status: &str,
    session_status: &str,
    persisted: bool,
) -> Result<(), OperationError> {
    conn.execute(
        "INSERT INTO processing (match_id, webhook_status, session_status, persisted)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(match_id) DO UPDATE SET
             webhook_status = excluded.webhook_status,
             session_status = excluded.session_status,
             persisted = excluded.persisted,
             updated_at = datetime('now')",
        params![match_id, webhook_status, session_status, persisted],
    )?;
    Ok(())
}

