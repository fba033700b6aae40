//! Canonical match data shared by every stage of the relay.
//!
//! A [`MatchRecord`] is what the report parser produces and what the
//! renderer, the delivery destinations and the persistence layer consume.
//! Nothing downstream of the parser ever sees the raw report shape.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

pub mod team;
pub mod util;

pub use team::{Team, TeamOutcome, TeamTotals, team_totals, winner};

/// Match id used when the report carries no `GameUniqueId`.
pub const UNKNOWN_MATCH_ID: &str = "unknown";

/// Display name sentinel for players without a gamertag.
pub const UNKNOWN_PLAYER: &str = "Unknown";

/// One played match, normalized from a carnage report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    /// Globally unique id of the match; the dedupe key.
    pub match_id: String,
    /// Resolved display name of the arena.
    pub map_name: String,
    /// Game mode label (e.g. "Slayer").
    pub mode_name: String,
    /// Matchmaking game (as opposed to a custom game).
    pub is_ranked: bool,
    pub teams_enabled: bool,
    /// When the match was played, in the game client's local time.
    pub played_at: NaiveDateTime,
    /// Internal game enum from the report header.
    pub game_enum: u32,
    /// Playlist name, or "Unknown".
    pub hopper_name: String,
    pub players: Vec<PlayerRecord>,
}

impl MatchRecord {
    /// True when the report did not carry its own unique id.
    pub fn has_unknown_id(&self) -> bool {
        self.match_id == UNKNOWN_MATCH_ID
    }

    /// Players ordered by score, highest first. Ties keep report order.
    pub fn players_by_score(&self) -> Vec<&PlayerRecord> {
        let mut sorted: Vec<&PlayerRecord> = self.players.iter().collect();
        sorted.sort_by(|a, b| b.score.cmp(&a.score));
        sorted
    }

    /// Players on the given team id, in report order.
    pub fn players_on_team(&self, team_id: u32) -> Vec<&PlayerRecord> {
        self.players.iter().filter(|p| p.team_id == team_id).collect()
    }
}

/// Per-player line of a carnage report.
///
/// `score` is the ranking value; `kills`/`deaths` are only used for K/D
/// display and are not related to score.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub display_name: String,
    pub xbox_user_id: String,
    pub clan_tag: String,
    pub service_id: String,
    pub team_id: u32,
    pub score: u32,
    pub standing: u32,
    pub kills: u32,
    pub deaths: u32,
    pub assists: u32,
    pub betrayals: u32,
    pub suicides: u32,
    pub best_streak: u32,
}

impl PlayerRecord {
    /// A player with the "Unknown" name and all stats zeroed.
    pub fn unknown() -> Self {
        Self {
            display_name: UNKNOWN_PLAYER.to_string(),
            ..Self::default()
        }
    }

    /// K/D ratio for display. With no deaths the ratio is the kill count.
    pub fn kd_ratio(&self) -> f64 {
        util::kd_ratio(self.kills.into(), self.deaths.into())
    }

    /// Service tag shown under the player name: service id, else clan tag, else "N/A".
    pub fn service_tag(&self) -> &str {
        if !self.service_id.is_empty() {
            &self.service_id
        } else if !self.clan_tag.is_empty() {
            &self.clan_tag
        } else {
            "N/A"
        }
    }
}
