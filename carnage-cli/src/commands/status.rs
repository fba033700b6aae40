use std::path::Path;

use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

use carnage_db::MatchStore;
use carnage_lib::Overrides;

use crate::CliError;

use super::{load_settings, truncate};

pub(crate) fn run_status(config: Option<&Path>, limit: usize) -> Result<(), CliError> {
    let settings = load_settings(config, &Overrides::default())?;
    let db_path = &settings.database_path;

    if !db_path.exists() {
        log::warn!("No match database found at {}", db_path.display());
        log::info!("Run 'carnage-relay watch' to start recording matches.");
        return Ok(());
    }

    let store = MatchStore::open(db_path)
        .map_err(|e| CliError::database(format!("Failed to open match database: {}", e)))?;
    let stats = store
        .stats()
        .map_err(|e| CliError::database(format!("Failed to query match stats: {}", e)))?;

    log::info!(
        "{}",
        "Match Database Statistics".if_supports_color(Stdout, |t| t.bold()),
    );
    log::info!("  Database: {}", db_path.display());
    crate::log_blank();
    log::info!("  Games:          {:>8}", stats.games);
    log::info!("  Player rows:    {:>8}", stats.players);
    log::info!("  Processed:      {:>8}", stats.processed);
    log::info!("  Persisted:      {:>8}", stats.persisted);

    if limit == 0 {
        return Ok(());
    }
    let recent = store
        .recent_games(limit)
        .map_err(|e| CliError::database(format!("Failed to query recent matches: {}", e)))?;
    crate::log_blank();
    log::info!("{}", "Recent Matches".if_supports_color(Stdout, |t| t.bold()));
    if recent.is_empty() {
        log::info!("  {}", "(none yet)".if_supports_color(Stdout, |t| t.dimmed()));
    }
    for game in recent {
        let delivery = store
            .processing_record(&game.match_id)
            .map_err(|e| CliError::database(e.to_string()))?
            .map(|p| format!("webhook: {}, session: {}", p.webhook_status, p.session_status))
            .unwrap_or_else(|| "not in ledger".to_string());
        log::info!(
            "  {}  {:<12} {:<20} {:<14} {:>2} players  {}",
            game.played_at.if_supports_color(Stdout, |t| t.dimmed()),
            truncate(&game.match_id, 12),
            truncate(&game.map_name, 20),
            truncate(&game.mode_name, 14),
            game.player_count,
            delivery.if_supports_color(Stdout, |t| t.dimmed()),
        );
    }
    Ok(())
}
