use std::path::Path;

use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

use carnage_core::util::pad_truncate;
use carnage_core::{Team, TeamOutcome, team_totals, winner};
use carnage_report::{lookup_token, parse_report_file};

use crate::CliError;

pub(crate) fn run_parse(file: &Path, json: bool) -> Result<(), CliError> {
    let record = parse_report_file(file)?;

    if json {
        let text = serde_json::to_string_pretty(&record).map_err(|e| CliError::other(e.to_string()))?;
        println!("{}", text);
        return Ok(());
    }

    let filename = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let map_origin = if lookup_token(&filename).is_some() {
        "(from filename)"
    } else {
        "(from report)"
    };

    log::info!(
        "{}",
        format!("Match {}", record.match_id).if_supports_color(Stdout, |t| t.bold())
    );
    log::info!(
        "  Map:        {} {}",
        record.map_name.if_supports_color(Stdout, |t| t.cyan()),
        map_origin.if_supports_color(Stdout, |t| t.dimmed())
    );
    log::info!("  Game type:  {}", record.mode_name);
    log::info!("  Playlist:   {}", record.hopper_name);
    log::info!("  Ranked:     {}", if record.is_ranked { "yes" } else { "no" });
    log::info!("  Played at:  {}", record.played_at.format("%Y-%m-%d %H:%M:%S"));
    if record.teams_enabled {
        let blue = team_totals(&record, Team::Blue);
        let red = team_totals(&record, Team::Red);
        log::info!("  Score:      Blue {} - Red {}", blue.score, red.score);
        let result = match winner(&record) {
            TeamOutcome::Winner(team) => format!("{} wins", team.label()),
            TeamOutcome::Draw => "Draw".to_string(),
        };
        log::info!("  Result:     {}", result.if_supports_color(Stdout, |t| t.bold()));
    }
    crate::log_blank();

    log::info!(
        "  {} {:>5} {:>5} {:>5} {:>5} {:>6}",
        pad_truncate("Player", 16),
        "Score",
        "K",
        "D",
        "A",
        "Team"
    );
    for player in record.players_by_score() {
        log::info!(
            "  {} {:>5} {:>5} {:>5} {:>5} {:>6}",
            pad_truncate(&player.display_name, 16),
            player.score,
            player.kills,
            player.deaths,
            player.assists,
            Team::from_id(player.team_id).label()
        );
    }
    if record.players.is_empty() {
        log::info!("  {}", "(no players)".if_supports_color(Stdout, |t| t.dimmed()));
    }
    Ok(())
}
