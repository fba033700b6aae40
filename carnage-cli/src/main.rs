//! carnage-relay CLI
//!
//! Command-line interface for relaying Halo 3 carnage reports to chat.

mod cli_types;
mod commands;
mod error;
mod spinner;

use std::io::Write;

use clap::Parser;

use cli_types::{Cli, Commands, ConfigAction};
pub(crate) use error::CliError;

/// Log an empty line (keeps output spacing consistent under any logger format).
pub(crate) fn log_blank() {
    log::info!("");
}

/// Plain messages for info output; level tags for warnings and errors; timestamps
/// and targets when verbose.
fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "info,carnage_relay=debug,carnage_lib=debug,carnage_delivery=debug,carnage_render=debug,carnage_report=debug,carnage_db=debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format(move |buf, record| {
            if verbose {
                writeln!(
                    buf,
                    "{} {:<5} [{}] {}",
                    chrono::Local::now().format("%H:%M:%S%.3f"),
                    record.level(),
                    record.target(),
                    record.args()
                )
            } else if record.level() == log::Level::Info {
                writeln!(buf, "{}", record.args())
            } else {
                writeln!(buf, "{}: {}", record.level(), record.args())
            }
        })
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config = cli.config.as_deref();

    let result = match cli.command {
        Commands::Watch { args } => commands::watch::run_watch(config, args),
        Commands::Process { files, no_session } => commands::process::run_process(config, files, no_session),
        Commands::Parse { file, json } => commands::parse::run_parse(&file, json),
        Commands::Render { file, out } => commands::render::run_render(config, &file, &out, cli.verbose),
        Commands::Status { limit } => commands::status::run_status(config, limit),
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config::run_config_show(config),
            ConfigAction::Path => {
                commands::config::run_config_path(config);
                Ok(())
            }
        },
    };

    if let Err(e) = result {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
