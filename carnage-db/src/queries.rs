//! Read queries for the match database.

use carnage_core::PlayerRecord;
use rusqlite::{Connection, Row, params};

use crate::operations::OperationError;

/// Summary statistics for the match database.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchStats {
    pub games: i64,
    pub players: i64,
    pub processed: i64,
    /// Processing records whose game and player rows were written.
    pub persisted: i64,
}

pub fn catalog_stats(conn: &Connection) -> Result<MatchStats, OperationError> {
    let games: i64 = conn.query_row("SELECT COUNT(*) FROM games", [], |r| r.get(0))?;
    let players: i64 = conn.query_row("SELECT COUNT(*) FROM players", [], |r| r.get(0))?;
    let processed: i64 = conn.query_row("SELECT COUNT(*) FROM processing", [], |r| r.get(0))?;
    let persisted: i64 = conn.query_row(
        "SELECT COUNT(*) FROM processing WHERE persisted = 1",
        [],
        |r| r.get(0),
    )?;

    Ok(MatchStats {
        games,
        players,
        processed,
        persisted,
    })
}

/// A `games` row with its player count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameRow {
    pub match_id: String,
    pub map_name: String,
    pub mode_name: String,
    pub hopper_name: String,
    pub is_ranked: bool,
    pub teams_enabled: bool,
    /// Stored as `YYYY-MM-DD HH:MM:SS`.
    pub played_at: String,
    pub player_count: i64,
}

fn row_to_game(row: &Row<'_>) -> rusqlite::Result<GameRow> {
    Ok(GameRow {
        match_id: row.get(0)?,
        map_name: row.get(1)?,
        mode_name: row.get(2)?,
        hopper_name: row.get(3)?,
        is_ranked: row.get(4)?,
        teams_enabled: row.get(5)?,
        played_at: row.get(6)?,
        player_count: row.get(7)?,
    })
}

/// Most recently played matches first.
pub fn recent_games(conn: &Connection, limit: usize) -> Result<Vec<GameRow>, OperationError> {
    let mut stmt = conn.prepare(
        "SELECT g.match_id, g.map_name, g.mode_name, g.hopper_name, g.is_ranked,
                g.teams_enabled, g.played_at,
                (SELECT COUNT(*) FROM players p WHERE p.match_id = g.match_id)
         FROM games g
         ORDER BY g.played_at DESC, g.match_id
         LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![limit as i64], row_to_game)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
}

/// Player lines of a match in slot order.
pub fn players_for_game(
    conn: &Connection,
    match_id: &str,
) -> Result<Vec<PlayerRecord>, OperationError> {
    let mut stmt = conn.prepare(
        "SELECT display_name, xbox_user_id, clan_tag, service_id, team_id, score,
                standing, kills, deaths, assists, betrayals, suicides, best_streak
         FROM players WHERE match_id = ?1 ORDER BY slot",
    )?;
    let rows = stmt.query_map(params![match_id], |row| {
        Ok(PlayerRecord {
            display_name: row.get(0)?,
            xbox_user_id: row.get(1)?,
            clan_tag: row.get(2)?,
            service_id: row.get(3)?,
            team_id: row.get(4)?,
            score: row.get(5)?,
            standing: row.get(6)?,
            kills: row.get(7)?,
            deaths: row.get(8)?,
            assists: row.get(9)?,
            betrayals: row.get(10)?,
            suicides: row.get(11)?,
            best_streak: row.get(12)?,
        })
    })?;
    rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
}

/// A `processing` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingRecord {
    pub match_id: String,
    pub source_file: Option<String>,
    pub webhook_status: String,
    pub session_status: String,
    pub persisted: bool,
    pub first_processed_at: String,
    pub updated_at: String,
}

pub fn processing_record(
    conn: &Connection,
    match_id: &str,
) -> Result<Option<ProcessingRecord>, OperationError> {
    let mut stmt = conn.prepare(
        "SELECT match_id, source_file, webhook_status, session_status, persisted,
                first_processed_at, updated_at
         FROM processing WHERE match_id = ?1",
    )?;
    let result = stmt.query_row(params![match_id], |row| {
        Ok(ProcessingRecord {
            match_id: row.get(0)?,
            source_file: row.get(1)?,
            webhook_status: row.get(2)?,
            session_status: row.get(3)?,
            persisted: row.get(4)?,
            first_processed_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    });
    match result {
        Ok(r) => Ok(Some(r)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}
