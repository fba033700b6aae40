use std::path::Path;

use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

use carnage_delivery::webhook::redact;
use carnage_lib::{Overrides, config_path};

use crate::CliError;

use super::load_settings;

fn mask_value(s: &str) -> String {
    if s.len() <= 2 {
        "****".to_string()
    } else {
        format!("{}****", &s[..2])
    }
}

/// Show the effective settings and the source of each overridable value.
pub(crate) fn run_config_show(config: Option<&Path>) -> Result<(), CliError> {
    let settings = load_settings(config, &Overrides::default())?;

    log::info!(
        "{}",
        "Carnage Relay Configuration".if_supports_color(Stdout, |t| t.bold()),
    );
    crate::log_blank();

    match &settings.file {
        Some(p) => log::info!(
            "  Config file: {} {}",
            p.display().if_supports_color(Stdout, |t| t.cyan()),
            "(loaded)".if_supports_color(Stdout, |t| t.green()),
        ),
        None => log::info!(
            "  Config file: {} {}",
            config_path().display().if_supports_color(Stdout, |t| t.cyan()),
            "(not found, using defaults)".if_supports_color(Stdout, |t| t.dimmed()),
        ),
    }
    crate::log_blank();

    let fields: Vec<(&str, Option<String>)> = vec![
        ("watch.dir", Some(settings.watch.dir.display().to_string())),
        ("webhook.url", settings.webhook.url.as_deref().map(redact)),
        ("session.chat_id", settings.session.chat_id.clone()),
        ("database.path", Some(settings.database_path.display().to_string())),
        (
            "render.browser",
            settings.render.browser.as_ref().map(|p| p.display().to_string()),
        ),
        ("control.addr", settings.control.addr.map(|a| a.to_string())),
        ("control.api_key", settings.control.api_key.as_deref().map(mask_value)),
    ];

    for (name, value) in fields {
        let source_str = format!("({})", settings.source(name));
        match value {
            Some(v) => {
                log::info!(
                    "  {} {} {}",
                    format!("{}:", name).if_supports_color(Stdout, |t| t.cyan()),
                    v,
                    source_str.if_supports_color(Stdout, |t| t.dimmed()),
                );
            }
            None => {
                log::info!(
                    "  {} {} {}",
                    format!("{}:", name).if_supports_color(Stdout, |t| t.cyan()),
                    "not set".if_supports_color(Stdout, |t| t.yellow()),
                    source_str.if_supports_color(Stdout, |t| t.dimmed()),
                );
            }
        }
    }

    crate::log_blank();
    log::info!("  Report extension:   .{}", settings.watch.extension);
    log::info!(
        "  Settle window:      {} ms (poll {} ms)",
        settings.watch.quiet_period.as_millis(),
        settings.watch.poll_interval.as_millis()
    );
    log::info!(
        "  Delay between:      {} ms",
        settings.watch.inter_match_delay.as_millis()
    );
    log::info!(
        "  Delivery retries:   {} attempts, {} ms base, {} ms cap",
        settings.retry.max_attempts,
        settings.retry.base_delay.as_millis(),
        settings.retry.max_delay.as_millis()
    );
    log::info!(
        "  Chat session:       {}",
        if settings.session.enabled {
            format!("enabled via {}", settings.session.bridge_url)
        } else {
            "disabled".to_string()
        }
    );
    log::info!("  Session profile:    {}", settings.session.profile_dir.display());
    log::info!("  Render sandboxes:   {}", settings.render.sandbox_root.display());
    if let Some(dir) = &settings.render.output_dir {
        log::info!("  Render copies:      {}", dir.display());
    }
    Ok(())
}

/// Print the config file path.
pub(crate) fn run_config_path(config: Option<&Path>) {
    let path = config.map(Path::to_path_buf).unwrap_or_else(config_path);
    println!("{}", path.display());
}
