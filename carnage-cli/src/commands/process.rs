use std::path::{Path, PathBuf};

use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

use carnage_lib::{Overrides, ProcessOutcome, Relay};

use crate::CliError;

use super::{load_settings, runtime, start_session_and_wait};

pub(crate) fn run_process(config: Option<&Path>, files: Vec<PathBuf>, no_session: bool) -> Result<(), CliError> {
    let overrides = Overrides {
        no_session,
        ..Overrides::default()
    };
    let settings = load_settings(config, &overrides)?;
    let rt = runtime()?;

    let failed = rt.block_on(async {
        let relay = Relay::build(settings)?;
        start_session_and_wait(&relay).await;
        let results = relay.process_files(&files).await;
        relay.shutdown().await;

        let mut failed = 0usize;
        for (path, result) in &results {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            match result {
                Ok(ProcessOutcome::Processed(summary)) => {
                    let destinations: Vec<String> = summary
                        .delivery
                        .destinations
                        .iter()
                        .map(|(dest, outcome)| format!("{}: {}", dest, outcome.status_str()))
                        .collect();
                    log::info!(
                        "  {} {} match {} on {} ({}{})",
                        "\u{2714}".if_supports_color(Stdout, |t| t.green()),
                        name,
                        summary.match_id.if_supports_color(Stdout, |t| t.bold()),
                        summary.map_name,
                        destinations.join(", "),
                        if summary.delivery.persistence.is_persisted() {
                            ", saved"
                        } else {
                            ""
                        }
                    );
                }
                Ok(ProcessOutcome::Duplicate { match_id, .. }) => {
                    log::info!(
                        "  {} {} match {} already relayed",
                        "-".if_supports_color(Stdout, |t| t.dimmed()),
                        name,
                        match_id
                    );
                }
                Err(e) => {
                    failed += 1;
                    log::info!(
                        "  {} {} {}",
                        "\u{2718}".if_supports_color(Stdout, |t| t.red()),
                        name,
                        e.if_supports_color(Stdout, |t| t.red())
                    );
                }
            }
        }
        Ok::<_, CliError>(failed)
    })?;

    if failed > 0 {
        return Err(CliError::other(format!("{} of {} report(s) failed", failed, files.len())));
    }
    Ok(())
}
