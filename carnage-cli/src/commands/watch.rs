use std::path::Path;

use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

use carnage_lib::{Overrides, Relay};

use crate::CliError;
use crate::cli_types::WatchArgs;

use super::{load_settings, runtime, shutdown_signal};

pub(crate) fn run_watch(config: Option<&Path>, args: WatchArgs) -> Result<(), CliError> {
    let overrides = Overrides {
        watch_dir: args.dir,
        process_existing: args.process_existing,
        no_session: args.no_session,
        control_addr: args.control_addr,
    };
    let settings = load_settings(config, &overrides)?;
    let rt = runtime()?;

    rt.block_on(async {
        let relay = Relay::build(settings)?;
        let s = relay.settings();

        log::info!("{}", "Carnage Relay".if_supports_color(Stdout, |t| t.bold()));
        log::info!(
            "  Watching:  {}",
            s.watch.dir.display().if_supports_color(Stdout, |t| t.cyan())
        );
        log::info!(
            "  Webhook:   {}",
            if relay.webhook().is_configured() {
                "configured".if_supports_color(Stdout, |t| t.green()).to_string()
            } else {
                "not set".if_supports_color(Stdout, |t| t.yellow()).to_string()
            }
        );
        log::info!(
            "  Session:   {}",
            if s.session.enabled {
                s.session
                    .chat_id
                    .clone()
                    .unwrap_or_else(|| "no target chat".to_string())
            } else {
                "disabled".to_string()
            }
        );
        log::info!("  Database:  {}", s.database_path.display());
        if let Some(addr) = s.control.addr {
            log::info!("  Control:   http://{}", addr);
        }
        crate::log_blank();

        relay.start_session().await;
        let result = relay.watch(shutdown_signal()).await;
        relay.shutdown().await;
        result?;
        Ok::<_, CliError>(())
    })
}
