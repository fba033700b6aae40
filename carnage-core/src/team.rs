//! Team split and per-team aggregation.

use serde::Serialize;

use crate::{MatchRecord, PlayerRecord};

/// Team a player belongs to, derived from the report's team id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Team {
    Blue,
    Red,
    /// Any team id beyond the two standard sides (free-for-all slots, etc.).
    Other(u32),
}

impl Team {
    pub fn from_id(team_id: u32) -> Self {
        match team_id {
            0 => Team::Blue,
            1 => Team::Red,
            n => Team::Other(n),
        }
    }

    pub fn id(self) -> u32 {
        match self {
            Team::Blue => 0,
            Team::Red => 1,
            Team::Other(n) => n,
        }
    }

    pub fn label(self) -> String {
        match self {
            Team::Blue => "Blue".to_string(),
            Team::Red => "Red".to_string(),
            Team::Other(n) => format!("Team {}", n),
        }
    }
}

impl std::fmt::Display for Team {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Summed stats for one team.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TeamTotals {
    pub players: usize,
    pub kills: u64,
    pub deaths: u64,
    pub assists: u64,
    pub score: u64,
}

impl TeamTotals {
    pub fn add(&mut self, player: &PlayerRecord) {
        self.players += 1;
        self.kills += u64::from(player.kills);
        self.deaths += u64::from(player.deaths);
        self.assists += u64::from(player.assists);
        self.score += u64::from(player.score);
    }

    pub fn kd_ratio(&self) -> f64 {
        crate::util::kd_ratio(self.kills, self.deaths)
    }
}

/// Sum the stats of every player on `team`.
pub fn team_totals(record: &MatchRecord, team: Team) -> TeamTotals {
    let mut totals = TeamTotals::default();
    for player in record.players.iter().filter(|p| p.team_id == team.id()) {
        totals.add(player);
    }
    totals
}

/// Result of comparing the Blue and Red total scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TeamOutcome {
    Winner(Team),
    Draw,
}

/// Decide the winning side by total score. Only Blue and Red compete.
pub fn winner(record: &MatchRecord) -> TeamOutcome {
    let blue = team_totals(record, Team::Blue).score;
    let red = team_totals(record, Team::Red).score;
    match blue.cmp(&red) {
        std::cmp::Ordering::Greater => TeamOutcome::Winner(Team::Blue),
        std::cmp::Ordering::Less => TeamOutcome::Winner(Team::Red),
        std::cmp::Ordering::Equal => TeamOutcome::Draw,
    }
}

/// Distinct teams present in the record, Blue and Red first, others by id.
pub fn teams_present(record: &MatchRecord) -> Vec<Team> {
    let mut ids: Vec<u32> = record.players.iter().map(|p| p.team_id).collect();
    ids.sort_unstable();
    ids.dedup();
    ids.into_iter().map(Team::from_id).collect()
}

#[cfg(test)]
#[path = "tests/team_tests.rs"]
mod tests;
